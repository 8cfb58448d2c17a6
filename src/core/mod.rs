//! Archive engine: header codec, block streaming, traversal and writing

pub mod block;
pub mod error;
pub mod header;
pub mod members;
pub mod metadata;
pub mod reader;
pub mod update;
pub mod writer;

pub use reader::{ArchiveEntry, ArchiveReader};
pub use update::UpdateCoordinator;
pub use writer::{ArchiveWriter, EntrySink, WriteMode, WriteSummary};
