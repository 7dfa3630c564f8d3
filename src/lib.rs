//! **nestkit** - addressing, validating and reading files nested inside files.
//!
//! A container file often embeds other files, which embed others in turn.
//! nestkit models each nesting level as a [`VirtualNode`]: a parent link, an
//! offset relative to the parent, a length, and a 4-byte signature captured
//! when the node is built. Nodes can later be checked against that signature
//! and materialized without loading the whole outer file.
//!
//! [`EndianWriter`] produces the byte sequences such containers expect, in a
//! byte order chosen by the caller rather than by the host.
//!
//! # Modules
//! | Module | Purpose |
//! |--------|---------|
//! | [`node`]   | Chained virtual nodes: resolution, validation, residency |
//! | [`path`]   | `<primary>[:<segment>]*` address grammar |
//! | [`writer`] | Byte-order-aware binary writer |
//! | [`order`]  | Byte order tag and host-order probing |
//! | [`utils`]  | 64-bit-safe seeking and buffer draining |
//!
//! # Example
//! ```
//! use nestkit::VirtualNode;
//!
//! let mut image = vec![0u8; 32];
//! image[..4].copy_from_slice(b"PACK");
//! image[8..12].copy_from_slice(b"FILE");
//!
//! let pack = VirtualNode::from_bytes("image", image);
//! let file = VirtualNode::child(&pack, "file.bin", 8, 8);
//!
//! assert!(file.exists());
//! assert_eq!(file.name(), "file.bin");
//! assert_eq!(&file.get_bytes().unwrap()[..4], b"FILE");
//! ```

pub mod error;
pub mod node;
pub mod order;
pub mod path;
pub mod utils;
pub mod writer;

pub use error::{Error, Result};
pub use node::{EntryKind, Magic, NodeStream, VirtualNode};
pub use order::ByteOrder;
pub use path::VirtualPath;
pub use writer::{EndianWriter, Encoding};
