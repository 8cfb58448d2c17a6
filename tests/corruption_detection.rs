//! Corruption detection tests
//!
//! Tests to verify that damaged or hostile archives are reported as errors
//! instead of being misread.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::TempDir;
use ustar_rs::{ArchiveBuilder, ArchiveError, EntrySink, Header, FOOTER_LEN};

/// Helper: write an archive of in-memory members to `path`
fn write_archive(path: &Path, members: &[(Header, &[u8])]) {
    let mut sink = EntrySink::new(Vec::new());
    for (header, data) in members {
        sink.append(header, &mut &data[..]).unwrap();
    }
    fs::write(path, sink.finish().unwrap()).unwrap();
}

fn regular(name: &str, data: &[u8]) -> Header {
    let mut header = Header::new(name);
    header.mode = 0o644;
    header.size = data.len() as u64;
    header
}

/// Helper: overwrite bytes at `offset`
fn corrupt_at(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
}

#[test]
fn test_corrupted_header_checksum() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.tar");
    write_archive(&path, &[(regular("a.txt", b"alpha"), &b"alpha"[..])]);

    // Damage the mode field
    corrupt_at(&path, 100, b"9");

    let archive = ArchiveBuilder::new().path(&path).build().unwrap();
    match archive.list() {
        Err(ArchiveError::ChecksumMismatch { offset, .. }) => assert_eq!(offset, 0),
        other => panic!("expected checksum mismatch, got {:?}", other),
    }
}

#[test]
fn test_checksum_verification_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("relaxed.tar");
    write_archive(&path, &[(regular("a.txt", b"alpha"), &b"alpha"[..])]);

    // Damage the uname field; the record still decodes
    corrupt_at(&path, 265, b"x");

    let strict = ArchiveBuilder::new().path(&path).build().unwrap();
    assert!(strict.list().is_err());

    let relaxed = ArchiveBuilder::new()
        .path(&path)
        .verify_checksums(false)
        .build()
        .unwrap();
    assert_eq!(relaxed.list().unwrap().as_slice(), ["a.txt"]);
}

#[test]
fn test_truncated_archive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.tar");
    write_archive(&path, &[(regular("big", &[1u8; 4096]), &[1u8; 4096][..])]);

    // Drop the footer and part of the content
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(2048).unwrap();
    drop(file);

    let archive = ArchiveBuilder::new().path(&path).build().unwrap();
    assert!(matches!(archive.list(), Err(ArchiveError::Format { .. })));
}

#[test]
fn test_partial_block_archive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ragged.tar");
    write_archive(&path, &[(regular("a", b"a"), &b"a"[..])]);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0u8; 100]).unwrap();
    drop(file);

    let archive = ArchiveBuilder::new().path(&path).build().unwrap();
    assert!(matches!(archive.list(), Err(ArchiveError::Format { .. })));
}

#[test]
fn test_archive_shorter_than_footer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiny.tar");
    fs::write(&path, [0u8; 512]).unwrap();

    let archive = ArchiveBuilder::new().path(&path).build().unwrap();
    assert!(matches!(archive.list(), Err(ArchiveError::Format { .. })));
}

#[test]
fn test_size_running_past_footer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("oversize.tar");

    // Header claims far more content than the file holds
    let mut header = regular("liar", b"");
    header.size = 1 << 20;
    let record = header.encode().unwrap();
    let mut bytes = record.to_vec();
    bytes.extend_from_slice(&[0u8; FOOTER_LEN as usize]);
    fs::write(&path, bytes).unwrap();

    let archive = ArchiveBuilder::new().path(&path).build().unwrap();
    assert!(matches!(archive.list(), Err(ArchiveError::Format { offset: 0, .. })));
}

#[test]
fn test_zero_block_ends_traversal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("early-end.tar");

    let mut sink = EntrySink::new(Vec::new());
    sink.append(&regular("a", b"a"), &mut &b"a"[..]).unwrap();
    let mut bytes = sink.finish().unwrap();
    // An extra zero block followed by the footer again
    bytes.extend_from_slice(&[0u8; 512]);
    bytes.extend_from_slice(&[0u8; FOOTER_LEN as usize]);
    fs::write(&path, bytes).unwrap();

    let archive = ArchiveBuilder::new().path(&path).build().unwrap();
    assert_eq!(archive.list().unwrap().as_slice(), ["a"]);
}

#[test]
fn test_unsupported_member_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dirs.tar");

    let mut header = Header::new("subdir/");
    header.mode = 0o755;
    header.typeflag = b'5';
    write_archive(&path, &[(header, &b""[..])]);

    let archive = ArchiveBuilder::new().path(&path).build().unwrap();
    assert!(matches!(archive.list(), Err(ArchiveError::Format { .. })));
}

#[test]
fn test_extract_rejects_parent_traversal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("evil.tar");
    write_archive(&path, &[(regular("../escape.txt", b"boom"), &b"boom"[..])]);

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let archive = ArchiveBuilder::new()
        .path(&path)
        .directory(&out)
        .build()
        .unwrap();

    assert!(matches!(archive.extract(), Err(ArchiveError::UnsafePath(_))));
    assert!(!dir.path().join("escape.txt").exists());
}

#[test]
fn test_extract_rejects_absolute_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abs.tar");
    let target = dir.path().join("absolute.txt");
    let name = target.to_str().unwrap();
    write_archive(&path, &[(regular(name, b"boom"), &b"boom"[..])]);

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let archive = ArchiveBuilder::new()
        .path(&path)
        .directory(&out)
        .build()
        .unwrap();

    assert!(matches!(archive.extract(), Err(ArchiveError::UnsafePath(_))));
    assert!(!target.exists());
}
