//! Filesystem metadata and account-name resolution for member files

use crate::error::{ArchiveError, OwnerKind, Result};
use std::fs;
use std::path::Path;

/// The subset of `stat` data a header records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileMetadata {
    /// Permission bits (`st_mode & 0o7777`)
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Content length in bytes
    pub size: u64,
    /// Modification time, Unix epoch seconds
    pub mtime: u64,
    pub dev_major: u32,
    pub dev_minor: u32,
}

impl FileMetadata {
    /// Stat a member file
    ///
    /// Fails with `MetadataUnavailable` if the path cannot be stat'ed or is
    /// not a regular file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(|e| ArchiveError::MetadataUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::regular(&meta, path)
    }

    /// Stat an already opened member file
    pub fn from_file<P: AsRef<Path>>(file: &fs::File, path: P) -> Result<Self> {
        let path = path.as_ref();
        let meta = file.metadata().map_err(|e| ArchiveError::MetadataUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::regular(&meta, path)
    }

    fn regular(meta: &fs::Metadata, path: &Path) -> Result<Self> {
        if !meta.is_file() {
            return Err(ArchiveError::MetadataUnavailable {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        Ok(Self::from_std(meta))
    }

    #[cfg(unix)]
    pub fn from_std(meta: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        FileMetadata {
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len(),
            mtime: meta.mtime().max(0) as u64,
            dev_major: dev_major(meta.dev()),
            dev_minor: dev_minor(meta.dev()),
        }
    }

    #[cfg(not(unix))]
    pub fn from_std(meta: &fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mode = if meta.permissions().readonly() { 0o444 } else { 0o644 };

        FileMetadata {
            mode,
            size: meta.len(),
            mtime,
            ..Default::default()
        }
    }
}

/// Major number of a Linux `dev_t`
pub fn dev_major(dev: u64) -> u32 {
    (((dev >> 32) & 0xffff_f000) | ((dev >> 8) & 0x0000_0fff)) as u32
}

/// Minor number of a Linux `dev_t`
pub fn dev_minor(dev: u64) -> u32 {
    (((dev >> 12) & 0xffff_ff00) | (dev & 0x0000_00ff)) as u32
}

/// Maps numeric owner and group ids to display names
pub trait OwnerLookup {
    fn user_name(&self, uid: u32) -> Result<String>;
    fn group_name(&self, gid: u32) -> Result<String>;
}

/// Resolves names through the system account database (`getpwuid_r`/`getgrgid_r`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOwners;

impl OwnerLookup for SystemOwners {
    fn user_name(&self, uid: u32) -> Result<String> {
        sys::user_name(uid).ok_or(ArchiveError::NameNotFound {
            kind: OwnerKind::User,
            id: uid,
        })
    }

    fn group_name(&self, gid: u32) -> Result<String> {
        sys::group_name(gid).ok_or(ArchiveError::NameNotFound {
            kind: OwnerKind::Group,
            id: gid,
        })
    }
}

/// Reports the same user and group name for every id
///
/// Useful for reproducible archives and for environments without an
/// account database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedOwners {
    pub user: String,
    pub group: String,
}

impl FixedOwners {
    pub fn new<U: Into<String>, G: Into<String>>(user: U, group: G) -> Self {
        FixedOwners {
            user: user.into(),
            group: group.into(),
        }
    }
}

impl OwnerLookup for FixedOwners {
    fn user_name(&self, _uid: u32) -> Result<String> {
        Ok(self.user.clone())
    }

    fn group_name(&self, _gid: u32) -> Result<String> {
        Ok(self.group.clone())
    }
}

#[cfg(unix)]
mod sys {
    use std::ffi::CStr;

    const INITIAL_BUF: usize = 1024;
    const MAX_BUF: usize = 1 << 20;

    pub(super) fn user_name(uid: u32) -> Option<String> {
        let mut buf = vec![0 as libc::c_char; INITIAL_BUF];
        loop {
            // SAFETY: passwd is plain data; getpwuid_r fills it with pointers into `buf`.
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();
            let rc = unsafe {
                libc::getpwuid_r(
                    uid as libc::uid_t,
                    &mut pwd,
                    buf.as_mut_ptr(),
                    buf.len(),
                    &mut result,
                )
            };

            if rc == libc::ERANGE && buf.len() < MAX_BUF {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
                return None;
            }

            // SAFETY: pw_name points into `buf`, which is still alive and NUL-terminated.
            let name = unsafe { CStr::from_ptr(pwd.pw_name) };
            return Some(name.to_string_lossy().into_owned());
        }
    }

    pub(super) fn group_name(gid: u32) -> Option<String> {
        let mut buf = vec![0 as libc::c_char; INITIAL_BUF];
        loop {
            // SAFETY: group is plain data; getgrgid_r fills it with pointers into `buf`.
            let mut grp: libc::group = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::group = std::ptr::null_mut();
            let rc = unsafe {
                libc::getgrgid_r(
                    gid as libc::gid_t,
                    &mut grp,
                    buf.as_mut_ptr(),
                    buf.len(),
                    &mut result,
                )
            };

            if rc == libc::ERANGE && buf.len() < MAX_BUF {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() || grp.gr_name.is_null() {
                return None;
            }

            // SAFETY: gr_name points into `buf`, which is still alive and NUL-terminated.
            let name = unsafe { CStr::from_ptr(grp.gr_name) };
            return Some(name.to_string_lossy().into_owned());
        }
    }
}

#[cfg(not(unix))]
mod sys {
    pub(super) fn user_name(_uid: u32) -> Option<String> {
        None
    }

    pub(super) fn group_name(_gid: u32) -> Option<String> {
        None
    }
}
