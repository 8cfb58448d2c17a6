//! Update: re-append members that are already archived

use crate::error::{ArchiveError, Result};
use crate::members::MemberNameSet;
use crate::metadata::OwnerLookup;
use crate::reader::ArchiveReader;
use crate::writer::{ArchiveWriter, WriteSummary};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Appends fresh copies of members the archive already holds
///
/// Older occurrences stay in the archive; listing shows both and extraction
/// keeps the newest.
pub struct UpdateCoordinator<'a> {
    archive: PathBuf,
    owners: &'a dyn OwnerLookup,
    base_dir: Option<PathBuf>,
    verify_checksums: bool,
    sync_on_finish: bool,
}

impl<'a> UpdateCoordinator<'a> {
    pub fn new<P: AsRef<Path>>(archive: P, owners: &'a dyn OwnerLookup) -> Self {
        UpdateCoordinator {
            archive: archive.as_ref().to_path_buf(),
            owners,
            base_dir: None,
            verify_checksums: true,
            sync_on_finish: false,
        }
    }

    /// Directory member names are resolved against
    pub fn base_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.base_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn sync_on_finish(mut self, sync: bool) -> Self {
        self.sync_on_finish = sync;
        self
    }

    /// Append `requested` if every name is already a member
    ///
    /// Fails with `UnknownMember` before touching the archive otherwise.
    pub fn update(&self, requested: &MemberNameSet) -> Result<WriteSummary> {
        let current = ArchiveReader::open(&self.archive)?
            .verify_checksums(self.verify_checksums)
            .list()?;

        if let Some(missing) = requested.first_missing_from(&current) {
            warn!("Update of {:?} rejected: {:?} is not archived", self.archive, missing);
            return Err(ArchiveError::UnknownMember(missing.to_string()));
        }

        info!(
            "Updating {} of {} members in {:?}",
            requested.len(),
            current.len(),
            self.archive
        );

        let mut writer =
            ArchiveWriter::append(&self.archive, self.owners).sync_on_finish(self.sync_on_finish);
        if let Some(dir) = &self.base_dir {
            writer = writer.base_dir(dir);
        }
        writer.write_members(requested)
    }
}
