use std::path::PathBuf;
use thiserror::Error;

/// Which account database a name lookup went to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    User,
    Group,
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerKind::User => f.write_str("user"),
            OwnerKind::Group => f.write_str("group"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to {op} {}: {source}", path.display())]
    File {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata unavailable for {}: {reason}", path.display())]
    MetadataUnavailable { path: PathBuf, reason: String },

    #[error("no {kind} name found for id {id}")]
    NameNotFound { kind: OwnerKind, id: u32 },

    #[error("{field} is {len} bytes, field holds at most {max}")]
    NameTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid member name {0:?}: must be non-empty UTF-8 without NUL bytes")]
    InvalidName(String),

    #[error("value {value} does not fit in the {field} field")]
    FieldOverflow { field: &'static str, value: u64 },

    #[error("invalid {field} field: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("archive too small to hold a footer: {0} bytes")]
    ArchiveTooSmall(u64),

    #[error("malformed archive at offset {offset}: {reason}")]
    Format { offset: u64, reason: String },

    #[error("header checksum mismatch at offset {offset}: stored {stored:o}, computed {computed:o}")]
    ChecksumMismatch {
        offset: u64,
        stored: u32,
        computed: u32,
    },

    #[error("{0} is not a member of the archive")]
    UnknownMember(String),

    #[error("refusing to extract unsafe member path {0:?}")]
    UnsafePath(String),

    #[error("no member files given")]
    NoMembers,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Wrap an I/O error with the step and file that produced it
    pub fn file(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::File {
            op,
            path: path.into(),
            source,
        }
    }
}

impl From<toml::de::Error> for ArchiveError {
    fn from(err: toml::de::Error) -> Self {
        ArchiveError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
