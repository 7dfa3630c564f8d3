//! Low-level stream primitives shared by node resolution.
//!
//! Each function either completes or returns an error; short reads are
//! reported explicitly instead of producing partially filled buffers.

use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;

use crate::{Error, Result};

/// Reference point for [`seek_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Beginning of the stream.
    Start,
    /// Current cursor position.
    Current,
    /// End of the stream.
    End,
}

impl Origin {
    fn seek_from(self, offset: u64) -> SeekFrom {
        // Callers only pass offsets no larger than i64::MAX.
        let signed = offset as i64;
        match self {
            Origin::Start => SeekFrom::Start(offset),
            Origin::Current => SeekFrom::Current(signed),
            Origin::End => SeekFrom::End(signed),
        }
    }
}

/// Seek `offset` bytes forward from `origin`, accepting the full `u64` range.
///
/// [`SeekFrom::Current`] and [`SeekFrom::End`] take an `i64`, so an offset
/// above `i64::MAX` is split into two equal relative seeks plus a one-byte
/// remainder. Returns the new position.
pub fn seek_by<S: Seek + ?Sized>(s: &mut S, offset: u64, origin: Origin) -> Result<u64> {
    if offset > i64::MAX as u64 {
        let half = offset / 2;
        let rem = offset % 2;
        s.seek(origin.seek_from(half))?;
        s.seek(SeekFrom::Current(half as i64))?;
        Ok(s.seek(SeekFrom::Current(rem as i64))?)
    } else {
        Ok(s.seek(origin.seek_from(offset))?)
    }
}

/// Read everything left in `r` into a buffer.
///
/// The reader is dropped (closing files) when passed by value; pass
/// `&mut r` to leave it open.
pub fn drain<R: Read>(mut r: R) -> Result<Bytes> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(Bytes::from(buf))
}

/// Read exactly `len` bytes.
///
/// Storage grows with the data actually read, so a bogus length on a short
/// stream fails with [`Error::UnexpectedEof`] instead of allocating `len`
/// bytes up front.
pub fn read_exactly<R: Read>(r: &mut R, len: u64) -> Result<Bytes> {
    let cap = usize::try_from(len).map_err(|_| Error::InvalidRange)?;
    let mut buf = Vec::with_capacity(cap.min(64 * 1024));
    r.by_ref().take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) != len {
        return Err(Error::UnexpectedEof);
    }
    Ok(Bytes::from(buf))
}

/// Read a 4-byte signature.
///
/// Returns `Ok(None)` when the stream ends first.
pub fn read_signature<R: Read>(r: &mut R) -> Result<Option<[u8; 4]>> {
    let mut b = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        match r.read(&mut b[filled..]) {
            Ok(0) => return Ok(None),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(b))
}
