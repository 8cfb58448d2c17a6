//! # ustar-rs - Minimal ustar Archive Tool
//!
//! `ustar-rs` packs regular files into POSIX ustar archives and gets them
//! back out again:
//!
//! - **Create** an archive from a list of files
//! - **Append** files to an existing archive
//! - **List** members in archive order
//! - **Update** members that are already archived (re-appends them)
//! - **Extract** everything, with later duplicates winning
//!
//! Archives are `[512-byte header][content padded to 512]...` followed by two
//! zero blocks, readable by any POSIX `tar`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ustar_rs::{Archive, Result};
//!
//! # fn main() -> Result<()> {
//! let archive = Archive::new("backup.tar");
//!
//! archive.create(["notes.txt", "report.pdf"])?;
//! archive.append(["todo.txt"])?;
//!
//! for name in &archive.list()? {
//!     println!("{}", name);
//! }
//!
//! archive.extract()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust,no_run
//! use ustar_rs::{ArchiveBuilder, FixedOwners, Result};
//!
//! # fn main() -> Result<()> {
//! let archive = ArchiveBuilder::new()
//!     .path("release.tar")
//!     .directory("dist")
//!     .owner_lookup(FixedOwners::new("build", "build"))
//!     .sync_on_finish(true)
//!     .build()?;
//!
//! archive.create(["app", "README"])?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;

// Short crate:: paths for the engine modules
#[allow(unused_imports)]
pub(crate) use crate::core::{block, error, header, members, metadata, reader, update, writer};

pub use crate::config::ArchiveOptions;
pub use crate::core::{
    block::{block_count_for, BLOCK_SIZE, FOOTER_LEN},
    error::{ArchiveError, OwnerKind, Result},
    header::Header,
    members::MemberNameSet,
    metadata::{FileMetadata, FixedOwners, OwnerLookup, SystemOwners},
    ArchiveEntry, ArchiveReader, ArchiveWriter, EntrySink, UpdateCoordinator, WriteMode,
    WriteSummary,
};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// High-level handle on one archive file
///
/// Bundles the archive path, [`ArchiveOptions`] and the account-name lookup
/// used for new headers. Every call opens the archive, does its work and
/// closes it again; nothing is held between calls.
///
/// # Examples
///
/// ```rust,no_run
/// use ustar_rs::{Archive, Result};
///
/// # fn main() -> Result<()> {
/// let archive = Archive::new("data.tar");
/// archive.create(["a.txt"])?;
/// archive.update(["a.txt"])?;
/// assert_eq!(archive.list()?.as_slice(), ["a.txt", "a.txt"]);
/// # Ok(())
/// # }
/// ```
pub struct Archive {
    path: PathBuf,
    options: ArchiveOptions,
    owners: Box<dyn OwnerLookup>,
}

impl Archive {
    /// Archive at `path` with default options and system account names
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Archive {
            path: path.as_ref().to_path_buf(),
            options: ArchiveOptions::default(),
            owners: Box::new(SystemOwners),
        }
    }

    /// Archive at `path` with explicit options
    pub fn with_options<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Self {
        Archive {
            options,
            ..Archive::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Create (or overwrite) the archive with `files`, in order
    ///
    /// Fails with `NoMembers` if `files` is empty.
    pub fn create<I, S>(&self, files: I) -> Result<WriteSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = non_empty(files)?;
        info!("Creating archive {:?} with {} members", self.path, members.len());
        self.writer(WriteMode::Create).write_members(&members)
    }

    /// Append `files` after the archive's existing members
    ///
    /// Fails with `NoMembers` if `files` is empty and with `ArchiveTooSmall`
    /// if the archive cannot hold a footer.
    pub fn append<I, S>(&self, files: I) -> Result<WriteSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = non_empty(files)?;
        info!("Appending {} members to {:?}", members.len(), self.path);
        self.writer(WriteMode::Append).write_members(&members)
    }

    /// Re-append `files`, all of which must already be members
    ///
    /// Fails with `UnknownMember` (leaving the archive untouched) if any is not.
    pub fn update<I, S>(&self, files: I) -> Result<WriteSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requested: MemberNameSet = files.into_iter().collect();
        UpdateCoordinator::new(&self.path, self.owners.as_ref())
            .base_dir(&self.options.directory)
            .verify_checksums(self.options.verify_checksums)
            .sync_on_finish(self.options.sync_on_finish)
            .update(&requested)
    }

    /// Member names in archive order, one per occurrence
    pub fn list(&self) -> Result<MemberNameSet> {
        debug!("Listing {:?}", self.path);
        self.reader()?.list()
    }

    /// Full header and position of every member occurrence
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        self.reader()?.entries().collect()
    }

    /// Content of the last occurrence of `name`
    pub fn read_member(&self, name: &str) -> Result<Vec<u8>> {
        let mut reader = self.reader()?;
        let mut latest = None;
        while let Some(entry) = reader.next_entry()? {
            if entry.name() == name {
                latest = Some(entry);
            }
        }

        match latest {
            Some(entry) => reader.read_entry(&entry),
            None => Err(ArchiveError::UnknownMember(name.to_string())),
        }
    }

    /// Extract every member into the configured directory
    ///
    /// Returns the number of occurrences written.
    pub fn extract(&self) -> Result<usize> {
        info!(
            "Extracting {:?} into {:?}",
            self.path, self.options.directory
        );
        self.reader()?
            .extract_all(&self.options.directory, self.options.preserve_permissions)
    }

    fn reader(&self) -> Result<ArchiveReader<std::io::BufReader<std::fs::File>>> {
        Ok(ArchiveReader::open(&self.path)?.verify_checksums(self.options.verify_checksums))
    }

    fn writer(&self, mode: WriteMode) -> ArchiveWriter<'_> {
        ArchiveWriter::with_mode(&self.path, mode, self.owners.as_ref())
            .base_dir(&self.options.directory)
            .sync_on_finish(self.options.sync_on_finish)
    }
}

fn non_empty<I, S>(files: I) -> Result<MemberNameSet>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let members: MemberNameSet = files.into_iter().collect();
    if members.is_empty() {
        return Err(ArchiveError::NoMembers);
    }
    Ok(members)
}

/// Builder for [`Archive`] with custom options
pub struct ArchiveBuilder {
    path: Option<PathBuf>,
    options: ArchiveOptions,
    owners: Option<Box<dyn OwnerLookup>>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        ArchiveBuilder {
            path: None,
            options: ArchiveOptions::default(),
            owners: None,
        }
    }

    /// Set the archive path (required)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace all options at once
    pub fn options(mut self, options: ArchiveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.options.verify_checksums = verify;
        self
    }

    pub fn sync_on_finish(mut self, sync: bool) -> Self {
        self.options.sync_on_finish = sync;
        self
    }

    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.options.preserve_permissions = preserve;
        self
    }

    /// Directory member names are resolved against (default: working directory)
    pub fn directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.options.directory = dir.into();
        self
    }

    /// Use a custom account-name lookup instead of the system database
    pub fn owner_lookup<L: OwnerLookup + 'static>(mut self, owners: L) -> Self {
        self.owners = Some(Box::new(owners));
        self
    }

    pub fn build(self) -> Result<Archive> {
        let path = self.path.ok_or_else(|| {
            ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "archive path must be set",
            ))
        })?;

        debug!("Building archive handle for {:?}", path);

        Ok(Archive {
            path,
            options: self.options,
            owners: self.owners.unwrap_or_else(|| Box::new(SystemOwners)),
        })
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
