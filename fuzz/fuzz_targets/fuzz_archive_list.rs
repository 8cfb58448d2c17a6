#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use ustar_rs::ArchiveReader;

fuzz_target!(|data: &[u8]| {
    let reader = match ArchiveReader::new(Cursor::new(data)) {
        Ok(r) => r,
        Err(_) => return,
    };

    // Traversal must terminate without panicking, and every entry must
    // lie inside the input
    let mut reader = reader.verify_checksums(false);
    let len = reader.len();
    for entry in reader.entries() {
        match entry {
            Ok(entry) => assert!(entry.content_offset + entry.size() <= len),
            Err(_) => break,
        }
    }
});
