#![no_main]
use libfuzzer_sys::fuzz_target;
use ustar_rs::core::header;
use ustar_rs::{Header, BLOCK_SIZE};

// Any 512-byte record must decode or fail cleanly; whatever decodes and
// re-encodes must carry a valid checksum.
fuzz_target!(|data: &[u8]| {
    if data.len() < BLOCK_SIZE {
        return;
    }

    let mut record = [0u8; BLOCK_SIZE];
    record.copy_from_slice(&data[..BLOCK_SIZE]);

    let _ = header::verify_checksum(&record);

    if let Ok(decoded) = Header::decode(&record) {
        if let Ok(encoded) = decoded.encode() {
            assert!(header::verify_checksum(&encoded).is_ok());
        }
    }
});
