//! Sequential archive traversal (list and extract)

use crate::block::{
    self, content_offset, has_entry_at, next_header_offset, BLOCK_SIZE, FOOTER_LEN,
};
use crate::error::{ArchiveError, Result};
use crate::header::{self, Header};
use crate::members::{relative_member_path, MemberNameSet};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// One member as found in an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub header: Header,
    /// Offset of the header block
    pub header_offset: u64,
    /// Offset of the first content block
    pub content_offset: u64,
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn size(&self) -> u64 {
        self.header.size
    }
}

/// Walks the header/content sequence of an archive from offset 0
///
/// Every read seeks to an offset computed from the previous header, so the
/// reader never depends on where an earlier content copy left the cursor.
pub struct ArchiveReader<R> {
    inner: R,
    len: u64,
    offset: u64,
    verify_checksums: bool,
    done: bool,
}

impl ArchiveReader<BufReader<File>> {
    /// Open an archive file for traversal
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ArchiveError::file("open archive", path, e))?;
        ArchiveReader::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Wrap a seekable source holding a complete archive
    ///
    /// Fails with `Format` if the source is not a whole number of blocks or
    /// is too short to hold the footer.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        if len < FOOTER_LEN {
            return Err(ArchiveError::Format {
                offset: 0,
                reason: format!("{} bytes is shorter than the end-of-archive footer", len),
            });
        }
        if len % BLOCK_SIZE as u64 != 0 {
            return Err(ArchiveError::Format {
                offset: len,
                reason: format!("length {} is not a multiple of {}", len, BLOCK_SIZE),
            });
        }

        debug!("Archive is {} bytes", len);

        Ok(ArchiveReader {
            inner,
            len,
            offset: 0,
            verify_checksums: true,
            done: false,
        })
    }

    /// Enable or disable checksum verification of each header
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Total archive length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        !has_entry_at(0, self.len)
    }

    /// Decode the next header, or `None` once only the footer remains
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        if self.done || !has_entry_at(self.offset, self.len) {
            self.done = true;
            return Ok(None);
        }

        let header_offset = self.offset;
        let mut raw = [0u8; BLOCK_SIZE];
        self.inner.seek(SeekFrom::Start(header_offset))?;
        self.inner.read_exact(&mut raw)?;

        if header::is_end_marker(&raw) {
            warn!(
                "Zero block at offset {} before the footer at {}; treating as end of archive",
                header_offset,
                self.len - FOOTER_LEN
            );
            self.done = true;
            return Ok(None);
        }

        if self.verify_checksums {
            if let Err((stored, computed)) = header::verify_checksum(&raw) {
                return Err(ArchiveError::ChecksumMismatch {
                    offset: header_offset,
                    stored,
                    computed,
                });
            }
        }

        let header = Header::decode(&raw).map_err(|e| ArchiveError::Format {
            offset: header_offset,
            reason: e.to_string(),
        })?;

        if !header.is_regular() {
            return Err(ArchiveError::Format {
                offset: header_offset,
                reason: format!(
                    "member {:?} has unsupported type {:?}",
                    header.name, header.typeflag as char
                ),
            });
        }
        if header.name.is_empty() {
            return Err(ArchiveError::Format {
                offset: header_offset,
                reason: "member has an empty name".to_string(),
            });
        }

        let next = next_header_offset(header_offset, header.size);
        if next + FOOTER_LEN > self.len {
            return Err(ArchiveError::Format {
                offset: header_offset,
                reason: format!(
                    "content of {:?} ({} bytes) runs past the end of the archive",
                    header.name, header.size
                ),
            });
        }

        debug!(
            "Entry {:?} at offset {} ({} bytes)",
            header.name, header_offset, header.size
        );

        self.offset = next;
        Ok(Some(ArchiveEntry {
            header,
            header_offset,
            content_offset: content_offset(header_offset),
        }))
    }

    /// Iterate over the remaining entries
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries { reader: self }
    }

    /// Names of all remaining entries in archive order, duplicates included
    pub fn list(&mut self) -> Result<MemberNameSet> {
        let mut names = MemberNameSet::new();
        while let Some(entry) = self.next_entry()? {
            names.push(entry.header.name);
        }
        Ok(names)
    }

    /// Copy an entry's logical content to `sink`
    pub fn copy_entry<W: Write + ?Sized>(&mut self, entry: &ArchiveEntry, sink: &mut W) -> Result<()> {
        self.inner.seek(SeekFrom::Start(entry.content_offset))?;
        block::copy_content(&mut self.inner, entry.size(), sink)?;
        Ok(())
    }

    /// Read an entry's logical content into memory
    pub fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(entry.content_offset))?;
        Ok(block::read_content(&mut self.inner, entry.size())?)
    }

    /// Extract every remaining entry into `dir`
    ///
    /// Each occurrence re-creates its file, so when a name appears more than
    /// once only the last occurrence's bytes are left on disk.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dir: P, preserve_permissions: bool) -> Result<usize> {
        let dir = dir.as_ref();
        let mut count = 0;

        while let Some(entry) = self.next_entry()? {
            let target = member_path(dir, entry.name())?;

            if let Some(parent) = target.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .map_err(|e| ArchiveError::file("create directory", parent, e))?;
                }
            }

            let mut out =
                File::create(&target).map_err(|e| ArchiveError::file("create", &target, e))?;
            self.inner.seek(SeekFrom::Start(entry.content_offset))?;
            block::copy_content(&mut self.inner, entry.size(), &mut out)
                .map_err(|e| ArchiveError::file("extract", &target, e))?;
            drop(out);

            if preserve_permissions {
                set_mode(&target, entry.header.mode)?;
            }

            debug!("Extracted {:?} ({} bytes)", entry.name(), entry.size());
            count += 1;
        }

        info!("Extracted {} entries into {:?}", count, dir);
        Ok(count)
    }

    /// Return the underlying source
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Iterator over archive entries; stops after the first error
pub struct Entries<'a, R> {
    reader: &'a mut ArchiveReader<R>,
}

impl<R: Read + Seek> Iterator for Entries<'_, R> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.reader.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Resolve a member name under `dir`, refusing names that escape it
fn member_path(dir: &Path, name: &str) -> Result<std::path::PathBuf> {
    Ok(dir.join(relative_member_path(name)?))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| ArchiveError::file("set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
