//! Virtual nodes - byte ranges nested inside real files.
//!
//! A [`VirtualNode`] is one nesting level. A root node stands for a real file
//! (or an in-memory buffer); every other node names a range inside its parent
//! by an offset relative to the parent's own position and a length.
//!
//! ```text
//! game.dat                      root      offset 0
//! └── game.dat:assets           child     offset 0x1000 (from game.dat)
//!     └── game.dat:assets:tex   grandchild offset 0x40  (from assets)
//! ```
//!
//! ## Resolution
//! A stream is positioned at a node's data by applying every ancestor's
//! offset as a seek relative to the current cursor, root first, then the
//! node's own. Absolute positions are never precomputed.
//!
//! ## Validation
//! Each node captures the 4 bytes at its resolved position once, when it is
//! initialized. [`VirtualNode::exists`] re-reads those bytes for the node and
//! every ancestor and requires an exact match. An all-zero signature never
//! matches.
//!
//! ## Residency
//! [`VirtualNode::pin`] keeps a node's bytes in memory; streams for the node
//! and its descendants are then served from that buffer instead of the
//! filesystem. [`VirtualNode::unpin`] drops the buffer. A child built under a
//! pinned ancestor starts out pinned with its own copy of its range.
//!
//! ## Failure model
//! Resolution never panics and never hands errors to the caller: a failed
//! open marks the node inaccessible for good, and `exists` / `get_bytes`
//! report `false` / `None`. Use [`VirtualNode::verify`] to tell a signature
//! mismatch apart from an I/O failure.
//!
//! Nodes use interior mutability without synchronization and are therefore
//! neither `Send` nor `Sync`.

use std::cell::{Cell, RefCell};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Take};
use std::path::Path;
use std::ptr;
use std::rc::Rc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::order::ByteOrder;
use crate::path::VirtualPath;
use crate::utils::{Origin, drain, read_exactly, read_signature, seek_by};
use crate::{Error, Result};

/// 4-byte signature captured at a node's resolved position.
pub type Magic = [u8; 4];

/// The signature of an uninitialized node. Never counts as a match.
pub const EMPTY_MAGIC: Magic = [0; 4];

/// Kind of filesystem entry behind a disk-backed root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

#[derive(Debug)]
enum Source {
    /// Root backed by the filesystem entry at the primary path.
    Disk(EntryKind),
    /// Root built from a caller-supplied buffer.
    Memory(Bytes),
    /// Range inside the parent.
    Nested,
}

/// One nesting level of a virtual address.
#[derive(Debug)]
pub struct VirtualNode {
    address: VirtualPath,
    source: Source,
    length: u64,
    declared_length: u64,
    offset: u64,
    parent: Option<Rc<VirtualNode>>,
    magic: Cell<Magic>,
    endianness: Cell<ByteOrder>,
    initialized: Cell<bool>,
    accessible: Cell<bool>,
    active: Cell<bool>,
    resident: RefCell<Option<Bytes>>,
}

/// A readable, seekable view over a node's backing data.
#[derive(Debug)]
pub enum NodeStream {
    /// Real file opened for shared reading.
    File(File),
    /// Resident buffer of this node or an ancestor.
    Memory(Cursor<Bytes>),
}

impl Read for NodeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NodeStream::File(f) => f.read(buf),
            NodeStream::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for NodeStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            NodeStream::File(f) => f.seek(pos),
            NodeStream::Memory(c) => c.seek(pos),
        }
    }
}

impl VirtualNode {
    /// Open a root node over a real path and capture its signature.
    ///
    /// The length is taken from the file's metadata; directories get length
    /// zero and are never initialized. A path that cannot be inspected yields
    /// an inaccessible node rather than an error.
    pub fn open(path: impl Into<String>) -> Rc<Self> {
        Self::open_inner(path.into(), true)
    }

    /// Like [`Self::open`] but leaves the signature uncaptured until
    /// [`Self::initialize`] is called.
    pub fn open_deferred(path: impl Into<String>) -> Rc<Self> {
        Self::open_inner(path.into(), false)
    }

    fn open_inner(path: String, capture: bool) -> Rc<Self> {
        let address = VirtualPath::parse(path);
        let (kind, length, accessible) = match fs::metadata(address.primary()) {
            Ok(m) if m.is_dir() => (EntryKind::Directory, 0, true),
            Ok(m) => (EntryKind::File, m.len(), true),
            Err(e) => {
                debug!(path = address.as_str(), error = %e, "cannot stat primary path");
                (EntryKind::File, 0, false)
            }
        };

        let node = Rc::new(Self::new(address, Source::Disk(kind), 0, length, None));
        node.accessible.set(accessible);
        if capture && kind == EntryKind::File {
            node.initialize(false);
        }
        node
    }

    /// Build a root node over an in-memory buffer and capture its signature.
    ///
    /// `name` is used as the address; it never touches the filesystem.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Rc<Self> {
        let node = Self::from_bytes_deferred(name, data);
        node.initialize(false);
        node
    }

    /// Like [`Self::from_bytes`] but leaves the signature uncaptured.
    pub fn from_bytes_deferred(name: impl Into<String>, data: impl Into<Bytes>) -> Rc<Self> {
        let data = data.into();
        let length = data.len() as u64;
        Rc::new(Self::new(
            VirtualPath::parse(name),
            Source::Memory(data),
            0,
            length,
            None,
        ))
    }

    /// Build a node for `length` bytes at `offset` inside `parent` and
    /// capture its signature.
    ///
    /// The address becomes `<parent address>:<segment>`. A `length` of zero
    /// means the size is unknown; materializing such a node reads to the end
    /// of the backing data.
    pub fn child(parent: &Rc<Self>, segment: &str, offset: u64, length: u64) -> Rc<Self> {
        let node = Self::child_deferred(parent, segment, offset, length);
        node.initialize(false);
        node
    }

    /// Like [`Self::child`] but leaves the signature uncaptured.
    ///
    /// If an ancestor is pinned when the child is built, the child starts out
    /// pinned with its own slice of that buffer. The copy is taken once;
    /// unpinning the ancestor later does not affect it.
    pub fn child_deferred(parent: &Rc<Self>, segment: &str, offset: u64, length: u64) -> Rc<Self> {
        let address = parent.address.join(segment);
        let node = Self::new(
            address,
            Source::Nested,
            offset,
            length,
            Some(Rc::clone(parent)),
        );
        if let Some(data) = node.inherit_resident() {
            trace!(path = node.full_path(), len = data.len(), "inherited resident bytes");
            node.active.set(true);
            *node.resident.borrow_mut() = Some(data);
        }
        Rc::new(node)
    }

    fn new(
        address: VirtualPath,
        source: Source,
        offset: u64,
        length: u64,
        parent: Option<Rc<Self>>,
    ) -> Self {
        Self {
            address,
            source,
            length,
            declared_length: length,
            offset,
            parent,
            magic: Cell::new(EMPTY_MAGIC),
            endianness: Cell::new(ByteOrder::default()),
            initialized: Cell::new(false),
            accessible: Cell::new(true),
            active: Cell::new(false),
            resident: RefCell::new(None),
        }
    }

    // Identity

    /// The full address as supplied.
    pub fn full_path(&self) -> &str {
        self.address.as_str()
    }

    /// The real-filesystem part of the address.
    pub fn primary_path(&self) -> &Path {
        Path::new(self.address.primary())
    }

    /// Virtual segment names after the primary path.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.address.segments()
    }

    /// Display name: the last segment, or the primary path's file name.
    pub fn name(&self) -> &str {
        self.address.name()
    }

    /// Extension of [`Self::name`], without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.address.extension()
    }

    /// Byte length of this node; zero when unknown.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Length as supplied by whoever created the node.
    pub fn declared_length(&self) -> u64 {
        self.declared_length
    }

    /// Offset relative to the parent's position.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The enclosing node, `None` for roots.
    pub fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    /// Whether this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The outermost ancestor (the node itself for roots).
    pub fn virtual_root(self: &Rc<Self>) -> Rc<Self> {
        let mut node = Rc::clone(self);
        while let Some(parent) = node.parent.clone() {
            node = parent;
        }
        node
    }

    /// Filesystem entry kind for disk-backed roots.
    pub fn kind(&self) -> Option<EntryKind> {
        match self.source {
            Source::Disk(kind) => Some(kind),
            Source::Memory(_) | Source::Nested => None,
        }
    }

    // State

    /// Captured signature ([`EMPTY_MAGIC`] before initialization).
    pub fn magic(&self) -> Magic {
        self.magic.get()
    }

    /// Whether the signature has been captured.
    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// `false` once opening a stream for this node has failed.
    pub fn is_accessible(&self) -> bool {
        self.accessible.get()
    }

    /// Byte order recorded for this node's content.
    ///
    /// Informational only; resolution does not consult it.
    pub fn endianness(&self) -> ByteOrder {
        self.endianness.get()
    }

    /// Record the byte order of this node's content.
    pub fn set_endianness(&self, order: ByteOrder) {
        self.endianness.set(order);
    }

    /// Whether the node is pinned in memory.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    // Operations

    /// Capture the signature at this node's resolved position.
    ///
    /// Does nothing if the node is already initialized, unless `force` is
    /// set. A short read records [`EMPTY_MAGIC`].
    pub fn initialize(&self, force: bool) {
        if self.initialized.get() && !force {
            return;
        }
        self.initialized.set(true);

        let captured = self
            .open_stream()
            .and_then(|mut s| read_signature(&mut s));
        match captured {
            Ok(magic) => {
                let magic = magic.unwrap_or(EMPTY_MAGIC);
                trace!(path = self.full_path(), ?magic, "captured signature");
                self.magic.set(magic);
            }
            Err(e) => debug!(path = self.full_path(), error = %e, "signature capture failed"),
        }
    }

    /// Check this node and all of its ancestors against their signatures.
    ///
    /// `Ok(false)` means a level resolved but held different bytes;
    /// `Err` means a level could not be read at all.
    ///
    /// A level whose captured signature is four zero bytes never matches.
    /// A root over a file that starts with `00 00 00 00` therefore reports
    /// `Ok(false)`, and so does every node below it.
    pub fn verify(&self) -> Result<bool> {
        if let Some(parent) = &self.parent {
            if !parent.verify()? {
                return Ok(false);
            }
        }

        let mut s = self.open_stream()?;
        let found = read_signature(&mut s)?;
        let expected = self.magic.get();
        let matched = expected != EMPTY_MAGIC && found == Some(expected);
        if !matched {
            debug!(path = self.full_path(), ?expected, ?found, "signature mismatch");
        }
        Ok(matched)
    }

    /// Whether the whole chain down to this node still holds the expected
    /// signatures.
    ///
    /// Always `false` for a chain containing an all-zero signature; see
    /// [`Self::verify`].
    pub fn exists(&self) -> bool {
        self.verify().unwrap_or_else(|e| {
            debug!(path = self.full_path(), error = %e, "existence check failed");
            false
        })
    }

    /// Materialize this node's bytes.
    ///
    /// Returns the resident buffer when there is one, otherwise reads
    /// `length` bytes from the resolved position (or everything up to the
    /// end when the length is unknown). Returns `None` on any failure.
    pub fn get_bytes(&self) -> Option<Bytes> {
        if let Some(bytes) = self.resident_bytes() {
            if self.length == 0 || bytes.len() as u64 == self.length {
                return Some(bytes);
            }
        }

        let was_active = self.active.replace(true);
        let result = self.read_through();
        match &result {
            Ok(bytes) if was_active => *self.resident.borrow_mut() = Some(bytes.clone()),
            Ok(_) => self.unpin(),
            Err(e) => {
                debug!(path = self.full_path(), error = %e, "materialization failed");
                if !was_active {
                    self.unpin();
                }
            }
        }
        result.ok()
    }

    /// Keep this node's bytes in memory.
    ///
    /// Reads the node once if nothing is resident yet. Returns whether the
    /// bytes are resident afterwards.
    pub fn pin(&self) -> bool {
        self.active.set(true);
        if self.resident_bytes().is_some() {
            return true;
        }
        match self.read_through() {
            Ok(bytes) => {
                *self.resident.borrow_mut() = Some(bytes);
                true
            }
            Err(e) => {
                debug!(path = self.full_path(), error = %e, "pin failed");
                false
            }
        }
    }

    /// Release this node's resident bytes.
    ///
    /// Ancestors' buffers and a memory root's own data are left alone.
    pub fn unpin(&self) {
        self.active.set(false);
        self.resident.borrow_mut().take();
    }

    /// Open a stream positioned at this node's data and bounded by its
    /// length (unbounded when the length is unknown).
    pub fn reader(&self) -> Option<Take<NodeStream>> {
        let limit = if self.length == 0 { u64::MAX } else { self.length };
        match self.open_stream() {
            Ok(s) => Some(s.take(limit)),
            Err(e) => {
                debug!(path = self.full_path(), error = %e, "cannot open reader");
                None
            }
        }
    }

    /// Delete the filesystem entry behind a root node.
    ///
    /// Files are removed with [`fs::remove_file`], directories with
    /// [`fs::remove_dir`] (which requires them to be empty). Nested and
    /// memory-backed nodes return [`Error::Unsupported`] and touch nothing.
    pub fn delete(&self) -> Result<()> {
        if self.parent.is_some() {
            warn!(path = self.full_path(), "refusing to delete a nested node");
            return Err(Error::Unsupported("cannot delete a nested node"));
        }
        match self.source {
            Source::Disk(EntryKind::File) => fs::remove_file(self.primary_path())?,
            Source::Disk(EntryKind::Directory) => fs::remove_dir(self.primary_path())?,
            Source::Memory(_) | Source::Nested => {
                warn!(path = self.full_path(), "refusing to delete a memory-backed node");
                return Err(Error::Unsupported("node has no filesystem entry"));
            }
        }
        debug!(path = self.full_path(), "deleted");
        Ok(())
    }

    // Resolution

    fn resident_bytes(&self) -> Option<Bytes> {
        match &self.source {
            Source::Memory(data) => Some(data.clone()),
            Source::Disk(_) | Source::Nested => self.resident.borrow().clone(),
        }
    }

    /// Slice of the nearest pinned ancestor's buffer covering this node.
    fn inherit_resident(&self) -> Option<Bytes> {
        let mut cur = self.parent.as_deref();
        while let Some(owner) = cur {
            if let Some(data) = owner.active.get().then(|| owner.resident_bytes()).flatten() {
                let mut s = Cursor::new(data);
                self.resolve_and_seek(&mut s, Some(owner)).ok()?;
                let start = usize::try_from(s.position()).ok()?;
                let data = s.into_inner();
                let end = if self.length == 0 {
                    data.len()
                } else {
                    start.checked_add(usize::try_from(self.length).ok()?)?
                };
                return (start <= end && end <= data.len()).then(|| data.slice(start..end));
            }
            cur = owner.parent.as_deref();
        }
        None
    }

    fn read_through(&self) -> Result<Bytes> {
        let mut s = self.open_stream()?;
        if self.length == 0 {
            drain(&mut s)
        } else {
            read_exactly(&mut s, self.length)
        }
    }

    /// Acquire a stream positioned at this node's data.
    ///
    /// The nearest resident buffer on the way to the root wins; only when
    /// none exists is the primary path opened.
    fn open_stream(&self) -> Result<NodeStream> {
        if !self.accessible.get() {
            return Err(Error::Inaccessible);
        }

        let mut cur = Some(self);
        while let Some(node) = cur {
            if let Some(data) = node.resident_bytes() {
                let mut s = NodeStream::Memory(Cursor::new(data));
                self.resolve_and_seek(&mut s, Some(node))?;
                return Ok(s);
            }
            cur = node.parent.as_deref();
        }

        let opened = open_shared(self.primary_path()).and_then(|file| {
            let mut s = NodeStream::File(file);
            self.resolve_and_seek(&mut s, None)?;
            Ok(s)
        });
        if let Err(e) = &opened {
            debug!(path = self.full_path(), error = %e, "stream open failed, node is now inaccessible");
            self.accessible.set(false);
        }
        opened
    }

    /// Apply the relative seeks from `base` (exclusive) down to `self`.
    ///
    /// `s` must sit at the start of `base`'s data, or at the start of the
    /// real file when `base` is `None`.
    fn resolve_and_seek<S: Seek>(&self, s: &mut S, base: Option<&VirtualNode>) -> Result<()> {
        if base.is_some_and(|b| ptr::eq(b, self)) {
            return Ok(());
        }
        if let Some(parent) = &self.parent {
            parent.resolve_and_seek(s, base)?;
        }
        if self.offset != 0 {
            trace!(path = self.full_path(), offset = self.offset, "relative seek");
            seek_by(s, self.offset, Origin::Current)?;
        }
        Ok(())
    }
}

/// Open `path` for reading without denying other readers or writers.
fn open_shared(path: &Path) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true);
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        // FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
        opts.share_mode(0x1 | 0x2 | 0x4);
    }
    let file = opts.open(path)?;
    if !file.metadata()?.is_file() {
        return Err(Error::NotAFile(path.to_path_buf()));
    }
    Ok(file)
}
