//! Archive creation and appending

use crate::block::{self, footer_offset, is_zero_block, BLOCK_SIZE, FOOTER_LEN};
use crate::error::{ArchiveError, Result};
use crate::header::Header;
use crate::members::{relative_member_path, MemberNameSet};
use crate::metadata::{FileMetadata, OwnerLookup};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const COPY_BUFFER: usize = 64 * 1024;

/// Writes header + content pairs followed by a footer to any writer
pub struct EntrySink<W: Write> {
    inner: W,
    written: u64,
    entries: usize,
}

impl<W: Write> EntrySink<W> {
    pub fn new(inner: W) -> Self {
        EntrySink {
            inner,
            written: 0,
            entries: 0,
        }
    }

    /// Write one member: its encoded header, then `header.size` bytes of `content`
    ///
    /// Returns the number of archive bytes written for the member.
    pub fn append<R: Read + ?Sized>(&mut self, header: &Header, content: &mut R) -> Result<u64> {
        relative_member_path(&header.name)?;
        let record = header.encode()?;
        self.inner.write_all(&record)?;
        let content_len = block::write_content(content, header.size, &mut self.inner)?;

        let total = BLOCK_SIZE as u64 + content_len;
        self.written += total;
        self.entries += 1;
        Ok(total)
    }

    /// Bytes written so far, footer excluded
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Write the footer, flush, and hand back the writer
    pub fn finish(mut self) -> Result<W> {
        block::write_footer(&mut self.inner)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// How the archive file is opened before members are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate (or create) and write from offset 0
    Create,
    /// Strip the existing footer and write after the last member
    Append,
}

/// Result of a create or append call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    /// Members written by this call
    pub members: usize,
    /// Archive length afterwards, footer included
    pub archive_len: u64,
}

/// Writes member files into an archive on disk
///
/// Not atomic: if a member fails part way, everything written before it
/// stays in the file and the archive is left without a footer.
pub struct ArchiveWriter<'a> {
    path: PathBuf,
    mode: WriteMode,
    owners: &'a dyn OwnerLookup,
    base_dir: Option<PathBuf>,
    sync_on_finish: bool,
}

impl<'a> ArchiveWriter<'a> {
    pub fn create<P: AsRef<Path>>(path: P, owners: &'a dyn OwnerLookup) -> Self {
        Self::with_mode(path, WriteMode::Create, owners)
    }

    pub fn append<P: AsRef<Path>>(path: P, owners: &'a dyn OwnerLookup) -> Self {
        Self::with_mode(path, WriteMode::Append, owners)
    }

    pub fn with_mode<P: AsRef<Path>>(path: P, mode: WriteMode, owners: &'a dyn OwnerLookup) -> Self {
        ArchiveWriter {
            path: path.as_ref().to_path_buf(),
            mode,
            owners,
            base_dir: None,
            sync_on_finish: false,
        }
    }

    /// Resolve member names against `dir` instead of the working directory
    ///
    /// Headers still record the names as given.
    pub fn base_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.base_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// `fsync` the archive before returning
    pub fn sync_on_finish(mut self, sync: bool) -> Self {
        self.sync_on_finish = sync;
        self
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Write every member, in order, followed by a single footer
    ///
    /// Every name is checked, and every member file stat'ed, before the
    /// archive is opened, so a bad name or a missing file leaves an existing
    /// archive untouched.
    pub fn write_members(&self, members: &MemberNameSet) -> Result<WriteSummary> {
        for name in members {
            self.check_member(name)?;
        }

        let (file, start) = self.open_archive()?;
        info!(
            "Writing {} members to {:?} ({:?}, starting at offset {})",
            members.len(),
            self.path,
            self.mode,
            start
        );

        let mut sink = EntrySink::new(BufWriter::new(file));
        for name in members {
            self.write_member(&mut sink, name)?;
        }

        let written = sink.bytes_written();
        let count = sink.entries();
        let file = sink
            .finish()
            .map_err(|e| self.archive_error("write footer to", e))?
            .into_inner()
            .map_err(|e| ArchiveError::file("flush", &self.path, e.into_error()))?;

        if self.sync_on_finish {
            file.sync_all()
                .map_err(|e| ArchiveError::file("sync", &self.path, e))?;
        }

        let archive_len = start + written + FOOTER_LEN;
        debug!("Archive {:?} is now {} bytes", self.path, archive_len);

        Ok(WriteSummary {
            members: count,
            archive_len,
        })
    }

    fn source_path(&self, name: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Reject names extract would refuse, names the header cannot hold, and
    /// sources that are missing or not regular files
    fn check_member(&self, name: &str) -> Result<()> {
        relative_member_path(name)?;
        Header::check_name(name)?;

        let meta = fs::metadata(self.source_path(name))
            .map_err(|e| ArchiveError::file("stat member", name, e))?;
        if !meta.is_file() {
            return Err(ArchiveError::MetadataUnavailable {
                path: PathBuf::from(name),
                reason: "not a regular file".to_string(),
            });
        }
        Ok(())
    }

    fn write_member<W: Write>(&self, sink: &mut EntrySink<W>, name: &str) -> Result<()> {
        let source = self.source_path(name);
        let file = File::open(&source).map_err(|e| ArchiveError::file("open member", name, e))?;
        let meta = FileMetadata::from_file(&file, name)?;
        let header = Header::from_metadata(name, &meta, self.owners)?;

        let mut content = BufReader::with_capacity(COPY_BUFFER, file);
        let total = sink.append(&header, &mut content).map_err(|e| match e {
            ArchiveError::Io(io) => ArchiveError::file("archive member", name, io),
            other => other,
        })?;

        debug!("Archived {:?} ({} bytes, {} in archive)", name, meta.size, total);
        Ok(())
    }

    /// Open the archive positioned where new members go
    fn open_archive(&self) -> Result<(File, u64)> {
        match self.mode {
            WriteMode::Create => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&self.path)
                    .map_err(|e| ArchiveError::file("create archive", &self.path, e))?;
                Ok((file, 0))
            }
            WriteMode::Append => {
                let mut file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&self.path)
                    .map_err(|e| ArchiveError::file("open archive", &self.path, e))?;
                let start = strip_footer(&mut file).map_err(|e| self.archive_error("strip footer from", e))?;
                Ok((file, start))
            }
        }
    }

    fn archive_error(&self, op: &'static str, err: ArchiveError) -> ArchiveError {
        match err {
            ArchiveError::Io(io) => ArchiveError::file(op, &self.path, io),
            other => other,
        }
    }
}

/// Truncate the trailing footer and seek to where it began
///
/// Refuses to cut anything but zero bytes.
pub fn strip_footer<F: Read + Seek + SetLen>(file: &mut F) -> Result<u64> {
    let len = file.seek(SeekFrom::End(0))?;
    let start = footer_offset(len).ok_or(ArchiveError::ArchiveTooSmall(len))?;

    let mut footer = [0u8; FOOTER_LEN as usize];
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(&mut footer)?;
    if !is_zero_block(&footer) {
        return Err(ArchiveError::Format {
            offset: start,
            reason: "archive does not end with an empty footer".to_string(),
        });
    }

    file.set_len(start)?;
    file.seek(SeekFrom::Start(start))?;
    debug!("Removed footer, archive truncated to {} bytes", start);
    Ok(start)
}

/// Storage whose length can be cut back
pub trait SetLen {
    fn set_len(&mut self, len: u64) -> std::io::Result<()>;
}

impl SetLen for File {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        File::set_len(self, len)
    }
}

impl SetLen for std::io::Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "length too large"))?;
        self.get_mut().truncate(len);
        Ok(())
    }
}
