//! Archive options, loadable from TOML
//!
//! ```toml
//! verify_checksums = true
//! sync_on_finish = false
//! preserve_permissions = false
//! directory = "."
//! ```

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveOptions {
    /// Recompute every header checksum while reading
    pub verify_checksums: bool,

    /// `fsync` the archive at the end of create, append and update
    pub sync_on_finish: bool,

    /// Apply archived permission bits to extracted files
    pub preserve_permissions: bool,

    /// Directory member names are resolved against, for reading members
    /// and for writing extracted files
    pub directory: PathBuf,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            verify_checksums: true,
            sync_on_finish: false,
            preserve_permissions: false,
            directory: PathBuf::from("."),
        }
    }
}

impl ArchiveOptions {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArchiveError::file("read config", path, e))?;
        Self::from_toml_str(&text)
    }
}
