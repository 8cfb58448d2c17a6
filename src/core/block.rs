//! Fixed 512-byte block streaming
//!
//! Every region of an archive is a whole number of blocks: one block per
//! header, `ceil(size / 512)` blocks of content, and two zero blocks of
//! footer. The arithmetic for locating those regions lives here as pure
//! functions over `(offset, size)` so traversal can be reasoned about (and
//! tested) without touching a file.

use std::io::{self, Read, Write};

/// Size of one archive block in bytes
pub const BLOCK_SIZE: usize = 512;

/// Number of all-zero blocks terminating an archive
pub const FOOTER_BLOCKS: u64 = 2;

/// Length of the footer in bytes
pub const FOOTER_LEN: u64 = FOOTER_BLOCKS * BLOCK_SIZE as u64;

const ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Number of blocks needed to hold `size` content bytes
///
/// A zero-length member occupies no content blocks at all.
pub fn block_count_for(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}

/// On-disk length of `size` content bytes after padding
pub fn padded_len(size: u64) -> u64 {
    block_count_for(size) * BLOCK_SIZE as u64
}

/// Offset of the first content block of the entry whose header is at `header_offset`
pub fn content_offset(header_offset: u64) -> u64 {
    header_offset + BLOCK_SIZE as u64
}

/// Offset of the header following an entry of `size` bytes at `header_offset`
pub fn next_header_offset(header_offset: u64, size: u64) -> u64 {
    content_offset(header_offset) + padded_len(size)
}

/// Whether a header can start at `offset` in an archive of `archive_len` bytes
///
/// The archive ends with exactly one footer and nothing after it, so an entry
/// exists at `offset` only while there is more than a footer's worth of bytes
/// left.
pub fn has_entry_at(offset: u64, archive_len: u64) -> bool {
    offset + FOOTER_LEN < archive_len
}

/// Offset where the footer of an archive of `archive_len` bytes begins
pub fn footer_offset(archive_len: u64) -> Option<u64> {
    archive_len.checked_sub(FOOTER_LEN)
}

/// Whether a block is entirely zero bytes
pub fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Copy exactly `size` bytes from `source` to `sink`, padding the last block
///
/// Returns the number of bytes written to `sink`, always a multiple of
/// [`BLOCK_SIZE`]. A source that ends before `size` bytes fails with
/// `UnexpectedEof`.
pub fn write_content<R: Read + ?Sized, W: Write + ?Sized>(
    source: &mut R,
    size: u64,
    sink: &mut W,
) -> io::Result<u64> {
    let mut block = [0u8; BLOCK_SIZE];
    let mut remaining = size;

    while remaining > 0 {
        let chunk = remaining.min(BLOCK_SIZE as u64) as usize;
        source.read_exact(&mut block[..chunk])?;
        block[chunk..].fill(0);
        sink.write_all(&block)?;
        remaining -= chunk as u64;
    }

    Ok(padded_len(size))
}

/// Copy `size` logical bytes of block-padded content from `source` to `sink`
///
/// Consumes `padded_len(size)` bytes from `source`; the padding of the last
/// block is read and dropped.
pub fn copy_content<R: Read + ?Sized, W: Write + ?Sized>(
    source: &mut R,
    size: u64,
    sink: &mut W,
) -> io::Result<()> {
    let mut block = [0u8; BLOCK_SIZE];
    let mut remaining = size;

    for _ in 0..block_count_for(size) {
        source.read_exact(&mut block)?;
        let take = remaining.min(BLOCK_SIZE as u64) as usize;
        sink.write_all(&block[..take])?;
        remaining -= take as u64;
    }

    Ok(())
}

/// Upper bound on the up-front allocation of [`read_content`]
const MAX_PREALLOC: usize = BLOCK_SIZE * 64;

/// Read `size` logical bytes of block-padded content into memory
pub fn read_content<R: Read + ?Sized>(source: &mut R, size: u64) -> io::Result<Vec<u8>> {
    let capacity = usize::try_from(size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "content too large for memory"))?;
    // Sizes come from headers; grow past the cap only as bytes arrive
    let mut content = Vec::with_capacity(capacity.min(MAX_PREALLOC));
    copy_content(source, size, &mut content)?;
    Ok(content)
}

/// Write the two zero blocks that terminate an archive
pub fn write_footer<W: Write + ?Sized>(sink: &mut W) -> io::Result<()> {
    for _ in 0..FOOTER_BLOCKS {
        sink.write_all(&ZERO_BLOCK)?;
    }
    Ok(())
}
