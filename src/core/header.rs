//! ustar header record (one 512-byte block per member)
//!
//! # Layout
//!
//! ```text
//! offset  len  field
//!      0  100  name       NUL-terminated unless full width
//!    100    8  mode       7 octal digits + NUL
//!    108    8  uid        7 octal digits + NUL
//!    116    8  gid        7 octal digits + NUL
//!    124   12  size       11 octal digits + NUL
//!    136   12  mtime      11 octal digits + NUL
//!    148    8  chksum     6 octal digits + NUL + space
//!    156    1  typeflag   '0' (regular file)
//!    157  100  linkname   unused
//!    257    6  magic      "ustar\0"
//!    263    2  version    "00", not terminated
//!    265   32  uname
//!    297   32  gname
//!    329    8  devmajor   7 octal digits + NUL
//!    337    8  devminor   7 octal digits + NUL
//!    345  155  prefix     unused
//!    500   12  padding
//! ```
//!
//! The checksum is the unsigned sum of all 512 bytes with the checksum field
//! itself counted as eight ASCII spaces.

use crate::block::{is_zero_block, BLOCK_SIZE};
use crate::error::{ArchiveError, Result};
use crate::metadata::{FileMetadata, OwnerLookup};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;

pub const MAGIC: [u8; 6] = *b"ustar\0";
pub const VERSION: [u8; 2] = *b"00";

/// Regular file
pub const REGTYPE: u8 = b'0';
/// Pre-POSIX regular file
pub const AREGTYPE: u8 = 0;

const NAME: Range<usize> = 0..100;
const MODE: Range<usize> = 100..108;
const UID: Range<usize> = 108..116;
const GID: Range<usize> = 116..124;
const SIZE: Range<usize> = 124..136;
const MTIME: Range<usize> = 136..148;
const CHKSUM: Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const LINKNAME: Range<usize> = 157..257;
const MAGIC_FIELD: Range<usize> = 257..263;
const VERSION_FIELD: Range<usize> = 263..265;
const UNAME: Range<usize> = 265..297;
const GNAME: Range<usize> = 297..329;
const DEVMAJOR: Range<usize> = 329..337;
const DEVMINOR: Range<usize> = 337..345;
const PREFIX: Range<usize> = 345..500;

/// Width of the checksum's octal digits
const CHKSUM_DIGITS: usize = 6;

/// Decoded (or to-be-encoded) header record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: u64,
    /// Stored checksum; filled in by `encode` and `decode`
    pub checksum: u32,
    pub typeflag: u8,
    pub linkname: String,
    pub magic: [u8; 6],
    pub version: [u8; 2],
    pub uname: String,
    pub gname: String,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub prefix: String,
}

impl Header {
    /// Create a regular-file header with zeroed metadata
    pub fn new<S: Into<String>>(name: S) -> Self {
        Header {
            name: name.into(),
            mode: 0,
            uid: 0,
            gid: 0,
            size: 0,
            mtime: 0,
            checksum: 0,
            typeflag: REGTYPE,
            linkname: String::new(),
            magic: MAGIC,
            version: VERSION,
            uname: String::new(),
            gname: String::new(),
            dev_major: 0,
            dev_minor: 0,
            prefix: String::new(),
        }
    }

    /// Build the header for member `name` from its stat data
    ///
    /// Owner and group names are resolved through `owners`; a failed lookup
    /// surfaces as `MetadataUnavailable`.
    pub fn from_metadata(
        name: &str,
        meta: &FileMetadata,
        owners: &dyn OwnerLookup,
    ) -> Result<Self> {
        let unavailable = |err: ArchiveError| ArchiveError::MetadataUnavailable {
            path: Path::new(name).to_path_buf(),
            reason: err.to_string(),
        };
        let uname = owners.user_name(meta.uid).map_err(unavailable)?;
        let gname = owners.group_name(meta.gid).map_err(unavailable)?;

        Ok(Header {
            mode: meta.mode,
            uid: meta.uid,
            gid: meta.gid,
            size: meta.size,
            mtime: meta.mtime,
            uname,
            gname,
            dev_major: meta.dev_major,
            dev_minor: meta.dev_minor,
            ..Header::new(name)
        })
    }

    /// Check that `name` can be stored in the name field
    ///
    /// Fails with `InvalidName` for empty names or names with NUL bytes and
    /// with `NameTooLong` past 100 bytes.
    pub fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains('\0') {
            return Err(ArchiveError::InvalidName(name.to_string()));
        }
        let max = NAME.end - NAME.start;
        if name.len() > max {
            return Err(ArchiveError::NameTooLong {
                field: "name",
                len: name.len(),
                max,
            });
        }
        Ok(())
    }

    /// Whether the typeflag denotes a regular file
    pub fn is_regular(&self) -> bool {
        self.typeflag == REGTYPE || self.typeflag == AREGTYPE
    }

    /// Encode into a 512-byte record, computing the checksum last
    ///
    /// Fails with `NameTooLong`, `InvalidName` or `FieldOverflow` rather
    /// than truncating a value that does not fit its field.
    pub fn encode(&self) -> Result<[u8; BLOCK_SIZE]> {
        Self::check_name(&self.name)?;

        let mut block = [0u8; BLOCK_SIZE];

        put_str(&mut block[NAME], "name", &self.name)?;
        put_octal(&mut block[MODE], "mode", self.mode.into())?;
        put_octal(&mut block[UID], "uid", self.uid.into())?;
        put_octal(&mut block[GID], "gid", self.gid.into())?;
        put_octal(&mut block[SIZE], "size", self.size)?;
        put_octal(&mut block[MTIME], "mtime", self.mtime)?;
        block[TYPEFLAG] = self.typeflag;
        put_str(&mut block[LINKNAME], "linkname", &self.linkname)?;
        block[MAGIC_FIELD].copy_from_slice(&self.magic);
        block[VERSION_FIELD].copy_from_slice(&self.version);
        put_str(&mut block[UNAME], "uname", &self.uname)?;
        put_str(&mut block[GNAME], "gname", &self.gname)?;
        put_octal(&mut block[DEVMAJOR], "devmajor", self.dev_major.into())?;
        put_octal(&mut block[DEVMINOR], "devminor", self.dev_minor.into())?;
        put_str(&mut block[PREFIX], "prefix", &self.prefix)?;

        let checksum = compute_checksum(&block);
        let digits = format!("{:0width$o}", checksum, width = CHKSUM_DIGITS);
        block[CHKSUM.start..CHKSUM.start + CHKSUM_DIGITS].copy_from_slice(digits.as_bytes());
        block[CHKSUM.start + CHKSUM_DIGITS] = 0;
        block[CHKSUM.start + CHKSUM_DIGITS + 1] = b' ';

        Ok(block)
    }

    /// Decode a 512-byte record
    ///
    /// Does not validate the checksum; see [`verify_checksum`].
    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Result<Self> {
        Ok(Header {
            name: get_str(&block[NAME], "name")?,
            mode: get_octal(&block[MODE], "mode")? as u32,
            uid: get_octal(&block[UID], "uid")? as u32,
            gid: get_octal(&block[GID], "gid")? as u32,
            size: get_octal(&block[SIZE], "size")?,
            mtime: get_octal(&block[MTIME], "mtime")?,
            checksum: get_octal(&block[CHKSUM], "chksum")? as u32,
            typeflag: block[TYPEFLAG],
            linkname: get_str(&block[LINKNAME], "linkname")?,
            magic: block[MAGIC_FIELD].try_into().unwrap_or(MAGIC),
            version: block[VERSION_FIELD].try_into().unwrap_or(VERSION),
            uname: get_str(&block[UNAME], "uname")?,
            gname: get_str(&block[GNAME], "gname")?,
            dev_major: get_octal(&block[DEVMAJOR], "devmajor")? as u32,
            dev_minor: get_octal(&block[DEVMINOR], "devminor")? as u32,
            prefix: get_str(&block[PREFIX], "prefix")?,
        })
    }
}

/// Unsigned byte sum of `block` with the checksum field read as spaces
pub fn compute_checksum(block: &[u8; BLOCK_SIZE]) -> u32 {
    let blanked = (CHKSUM.end - CHKSUM.start) as u32 * u32::from(b' ');
    block[..CHKSUM.start]
        .iter()
        .chain(&block[CHKSUM.end..])
        .map(|&b| u32::from(b))
        .sum::<u32>()
        + blanked
}

/// Compare the stored checksum of `block` against a fresh computation
///
/// Returns `(stored, computed)` on mismatch.
pub fn verify_checksum(block: &[u8; BLOCK_SIZE]) -> std::result::Result<(), (u32, u32)> {
    let computed = compute_checksum(block);
    let stored = get_octal(&block[CHKSUM], "chksum").map_or(u32::MAX, |v| v as u32);
    if stored == computed {
        Ok(())
    } else {
        Err((stored, computed))
    }
}

/// Whether `block` is an end-of-archive marker rather than a header
///
/// An all-zero block parses to an empty name with a zero checksum, which no
/// encoded header can produce.
pub fn is_end_marker(block: &[u8; BLOCK_SIZE]) -> bool {
    is_zero_block(block)
}

fn put_str(field: &mut [u8], name: &'static str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > field.len() {
        return Err(ArchiveError::NameTooLong {
            field: name,
            len: bytes.len(),
            max: field.len(),
        });
    }
    if bytes.contains(&0) {
        return Err(ArchiveError::InvalidField {
            field: name,
            reason: "contains a NUL byte".to_string(),
        });
    }
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Zero-padded octal filling all but the last byte, which stays NUL
fn put_octal(field: &mut [u8], name: &'static str, value: u64) -> Result<()> {
    let digits = field.len() - 1;
    let text = format!("{:0width$o}", value, width = digits);
    if text.len() > digits {
        return Err(ArchiveError::FieldOverflow { field: name, value });
    }
    field[..digits].copy_from_slice(text.as_bytes());
    field[digits] = 0;
    Ok(())
}

fn until_nul(field: &[u8]) -> &[u8] {
    match field.iter().position(|&b| b == 0) {
        Some(end) => &field[..end],
        None => field,
    }
}

fn get_str(field: &[u8], name: &'static str) -> Result<String> {
    String::from_utf8(until_nul(field).to_vec()).map_err(|_| ArchiveError::InvalidField {
        field: name,
        reason: "not valid UTF-8".to_string(),
    })
}

fn get_octal(field: &[u8], name: &'static str) -> Result<u64> {
    let text = std::str::from_utf8(until_nul(field)).map_err(|_| ArchiveError::InvalidField {
        field: name,
        reason: "not ASCII octal".to_string(),
    })?;
    let text = text.trim_matches(|c| c == ' ' || c == '\0');
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(text, 8).map_err(|_| ArchiveError::InvalidField {
        field: name,
        reason: format!("{:?} is not octal", text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FixedOwners;

    fn sample() -> Header {
        Header {
            mode: 0o644,
            uid: 1000,
            gid: 100,
            size: 600,
            mtime: 1_700_000_000,
            uname: "alice".to_string(),
            gname: "users".to_string(),
            dev_major: 8,
            dev_minor: 1,
            ..Header::new("notes.txt")
        }
    }

    #[test]
    fn test_encoded_field_layout() {
        let block = sample().encode().unwrap();

        assert_eq!(&block[0..10], b"notes.txt\0");
        assert_eq!(&block[100..108], b"0000644\0");
        assert_eq!(&block[108..116], b"0001750\0");
        assert_eq!(&block[116..124], b"0000144\0");
        assert_eq!(&block[124..136], b"00000001130\0");
        assert_eq!(&block[136..148], b"14524770400\0");
        assert_eq!(block[156], b'0');
        assert_eq!(&block[257..263], b"ustar\0");
        assert_eq!(&block[263..265], b"00");
        assert_eq!(&block[265..271], b"alice\0");
        assert_eq!(&block[297..303], b"users\0");
        assert_eq!(&block[329..337], b"0000010\0");
        assert_eq!(&block[337..345], b"0000001\0");
        assert!(block[345..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_checksum_field_format() {
        let block = sample().encode().unwrap();
        let field = &block[148..156];

        assert!(field[..6].iter().all(|b| (b'0'..=b'7').contains(b)));
        assert_eq!(field[6], 0);
        assert_eq!(field[7], b' ');
    }

    #[test]
    fn test_checksum_validates() {
        let block = sample().encode().unwrap();
        assert!(verify_checksum(&block).is_ok());

        let decoded = Header::decode(&block).unwrap();
        assert_eq!(decoded.checksum, compute_checksum(&block));
    }

    #[test]
    fn test_checksum_detects_flipped_byte() {
        let mut block = sample().encode().unwrap();
        block[3] ^= 0x20;
        let (stored, computed) = verify_checksum(&block).unwrap_err();
        assert_ne!(stored, computed);
    }

    #[test]
    fn test_checksum_uses_unsigned_bytes() {
        // Bytes >= 0x80 must add, not subtract
        let header = Header {
            uname: "\u{e9}".to_string(),
            ..sample()
        };
        let block = header.encode().unwrap();
        let manual: u32 = block
            .iter()
            .enumerate()
            .map(|(i, &b)| if (148..156).contains(&i) { 32 } else { b as u32 })
            .sum();
        assert_eq!(compute_checksum(&block), manual);
    }

    #[test]
    fn test_decode_fields() {
        let original = sample();
        let decoded = Header::decode(&original.encode().unwrap()).unwrap();

        assert_eq!(decoded.name, "notes.txt");
        assert_eq!(decoded.mode, 0o644);
        assert_eq!(decoded.uid, 1000);
        assert_eq!(decoded.gid, 100);
        assert_eq!(decoded.size, 600);
        assert_eq!(decoded.mtime, 1_700_000_000);
        assert_eq!(decoded.uname, "alice");
        assert_eq!(decoded.gname, "users");
        assert_eq!(decoded.magic, MAGIC);
        assert_eq!(decoded.version, VERSION);
        assert!(decoded.is_regular());
    }

    #[test]
    fn test_full_width_name_is_unterminated() {
        let name = "n".repeat(100);
        let block = Header::new(name.clone()).encode().unwrap();
        assert_eq!(block[99], b'n');
        assert_eq!(Header::decode(&block).unwrap().name, name);
    }

    #[test]
    fn test_name_too_long() {
        let result = Header::new("n".repeat(101)).encode();
        assert!(matches!(
            result,
            Err(ArchiveError::NameTooLong {
                field: "name",
                len: 101,
                max: 100
            })
        ));
    }

    #[test]
    fn test_uname_too_long() {
        let header = Header {
            uname: "u".repeat(33),
            ..sample()
        };
        assert!(matches!(
            header.encode(),
            Err(ArchiveError::NameTooLong { field: "uname", .. })
        ));
    }

    #[test]
    fn test_check_name() {
        assert!(Header::check_name("notes.txt").is_ok());
        assert!(Header::check_name(&"n".repeat(100)).is_ok());
        assert!(matches!(
            Header::check_name(&"n".repeat(101)),
            Err(ArchiveError::NameTooLong { len: 101, .. })
        ));
        assert!(matches!(
            Header::check_name("a\0b"),
            Err(ArchiveError::InvalidName(_))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            Header::new("").encode(),
            Err(ArchiveError::InvalidName(_))
        ));
    }

    #[test]
    fn test_size_overflow() {
        let header = Header {
            size: 0o100_000_000_000, // 12 octal digits
            ..sample()
        };
        assert!(matches!(
            header.encode(),
            Err(ArchiveError::FieldOverflow { field: "size", .. })
        ));

        let largest = Header {
            size: 0o77_777_777_777,
            ..sample()
        };
        assert!(largest.encode().is_ok());
    }

    #[test]
    fn test_mode_overflow() {
        let header = Header {
            mode: 0o10_000_000,
            ..sample()
        };
        assert!(matches!(
            header.encode(),
            Err(ArchiveError::FieldOverflow { field: "mode", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage_size() {
        let mut block = sample().encode().unwrap();
        block[124..136].copy_from_slice(b"00000009999\0");
        assert!(matches!(
            Header::decode(&block),
            Err(ArchiveError::InvalidField { field: "size", .. })
        ));
    }

    #[test]
    fn test_decode_accepts_space_terminated_octal() {
        let mut block = sample().encode().unwrap();
        block[100..108].copy_from_slice(b" 000644 ");
        assert_eq!(Header::decode(&block).unwrap().mode, 0o644);
    }

    #[test]
    fn test_zero_block_is_end_marker() {
        let zero = [0u8; BLOCK_SIZE];
        assert!(is_end_marker(&zero));

        let decoded = Header::decode(&zero).unwrap();
        assert!(decoded.name.is_empty());
        assert_eq!(decoded.checksum, 0);
        // An all-zero block never checks out as a header
        assert!(verify_checksum(&zero).is_err());

        assert!(!is_end_marker(&sample().encode().unwrap()));
    }

    #[test]
    fn test_from_metadata_resolves_owners() {
        let meta = FileMetadata {
            mode: 0o600,
            uid: 501,
            gid: 20,
            size: 5,
            mtime: 42,
            dev_major: 1,
            dev_minor: 4,
        };
        let header =
            Header::from_metadata("x", &meta, &FixedOwners::new("bob", "staff")).unwrap();

        assert_eq!(header.name, "x");
        assert_eq!(header.mode, 0o600);
        assert_eq!(header.uname, "bob");
        assert_eq!(header.gname, "staff");
        assert_eq!(header.typeflag, REGTYPE);
    }

    #[test]
    fn test_from_metadata_lookup_failure() {
        struct NoAccounts;
        impl OwnerLookup for NoAccounts {
            fn user_name(&self, uid: u32) -> Result<String> {
                Err(ArchiveError::NameNotFound {
                    kind: crate::error::OwnerKind::User,
                    id: uid,
                })
            }
            fn group_name(&self, gid: u32) -> Result<String> {
                Err(ArchiveError::NameNotFound {
                    kind: crate::error::OwnerKind::Group,
                    id: gid,
                })
            }
        }

        let result = Header::from_metadata("x", &FileMetadata::default(), &NoAccounts);
        assert!(matches!(
            result,
            Err(ArchiveError::MetadataUnavailable { .. })
        ));
    }
}
