//! Library-wide error and result types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout nestkit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Node resolution absorbs most of these internally and reports them as a
/// `false` from [`crate::VirtualNode::exists`] or a `None` from
/// [`crate::VirtualNode::get_bytes`]. The writer and
/// [`crate::VirtualNode::delete`] hand them to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The primary path exists but is not a regular file.
    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// The stream ended before all expected bytes could be read.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A length does not fit in the address space of this host.
    #[error("invalid offset or size")]
    InvalidRange,

    /// A previous attempt to open this node's backing file failed.
    #[error("node is inaccessible")]
    Inaccessible,

    /// The operation is not meaningful for this kind of node.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}
