//! Byte-order-aware binary writer.
//!
//! [`EndianWriter`] wraps any [`Write`] sink. Every multi-byte value is
//! rendered in host order and reversed only when the requested
//! [`ByteOrder`] differs from the host, so the output is identical on every
//! platform.
//!
//! Each primitive has two call shapes:
//!
//! * `write_u32(v)` uses the writer's sticky order, changed with
//!   [`EndianWriter::change_endianness`].
//! * `write_u32_with(v, order)` overrides the order for that one call.
//!
//! ```
//! use nestkit::{ByteOrder, EndianWriter};
//!
//! let mut w = EndianWriter::with_order(Vec::new(), ByteOrder::Big);
//! w.write_u16(0xFEFF)?;
//! w.write_u32_with(1, ByteOrder::Little)?;
//! assert_eq!(w.into_inner(), [0xFE, 0xFF, 0x01, 0x00, 0x00, 0x00]);
//! # Ok::<(), nestkit::Error>(())
//! ```
//!
//! A sink error aborts the write and is returned as [`crate::Error::Io`].
//! Bytes the sink accepted before failing stay written.
//!
//! To keep using the sink after the writer is gone, construct the writer
//! over `&mut sink` instead of `sink`.

use std::io::Write;

use tracing::trace;

use crate::Result;
use crate::order::ByteOrder;

/// A fixed-width value with a native in-memory byte layout.
pub trait Primitive: Copy {
    /// Byte array holding the value.
    type Bytes: AsRef<[u8]> + AsMut<[u8]>;

    /// The value's bytes in host order.
    fn native_bytes(self) -> Self::Bytes;
}

macro_rules! primitive {
    ($($ty:ty => $n:literal),* $(,)?) => {$(
        impl Primitive for $ty {
            type Bytes = [u8; $n];

            #[inline]
            fn native_bytes(self) -> Self::Bytes {
                self.to_ne_bytes()
            }
        }
    )*};
}

primitive! {
    i16 => 2, u16 => 2,
    i32 => 4, u32 => 4,
    i64 => 8, u64 => 8,
    f32 => 4, f64 => 8,
}

/// Character encoding used for text written with
/// [`EndianWriter::write_str`] and [`EndianWriter::write_char`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// UTF-16, little-endian code units.
    Utf16Le,
    /// UTF-16, big-endian code units.
    Utf16Be,
}

impl Encoding {
    fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => s.as_bytes().to_vec(),
            Encoding::Utf16Le => s.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Utf16Be => s.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }
}

/// Writer that serializes primitives in a chosen byte order.
#[derive(Debug)]
pub struct EndianWriter<W> {
    inner: W,
    order: ByteOrder,
    encoding: Encoding,
}

macro_rules! named_writers {
    ($($ty:ty => $plain:ident, $with:ident;)*) => {$(
        #[doc = concat!("Write a `", stringify!($ty), "` in the writer's byte order.")]
        #[inline]
        pub fn $plain(&mut self, value: $ty) -> Result<()> {
            self.write(value)
        }

        #[doc = concat!("Write a `", stringify!($ty), "` in `order`.")]
        #[inline]
        pub fn $with(&mut self, value: $ty, order: ByteOrder) -> Result<()> {
            self.write_with(value, order)
        }
    )*};
}

impl<W: Write> EndianWriter<W> {
    /// Little-endian writer with UTF-8 text.
    pub fn new(inner: W) -> Self {
        Self::with_encoding(inner, Encoding::default(), ByteOrder::default())
    }

    /// Writer with an initial byte order and UTF-8 text.
    pub fn with_order(inner: W, order: ByteOrder) -> Self {
        Self::with_encoding(inner, Encoding::default(), order)
    }

    /// Writer with an explicit text encoding and initial byte order.
    pub fn with_encoding(inner: W, encoding: Encoding, order: ByteOrder) -> Self {
        Self {
            inner,
            order,
            encoding,
        }
    }

    /// Current sticky byte order.
    pub fn endianness(&self) -> ByteOrder {
        self.order
    }

    /// Text encoding chosen at construction.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Change the byte order used by subsequent order-agnostic writes.
    pub fn change_endianness(&mut self, order: ByteOrder) {
        trace!(from = %self.order, to = %order, "changing writer byte order");
        self.order = order;
    }

    /// Write any [`Primitive`] in the sticky order.
    #[inline]
    pub fn write<T: Primitive>(&mut self, value: T) -> Result<()> {
        self.write_with(value, self.order)
    }

    /// Write any [`Primitive`] in `order`, leaving the sticky order alone.
    #[inline]
    pub fn write_with<T: Primitive>(&mut self, value: T, order: ByteOrder) -> Result<()> {
        let mut bytes = value.native_bytes();
        order.apply(bytes.as_mut());
        self.inner.write_all(bytes.as_ref())?;
        Ok(())
    }

    named_writers! {
        i16 => write_i16, write_i16_with;
        u16 => write_u16, write_u16_with;
        i32 => write_i32, write_i32_with;
        u32 => write_u32, write_u32_with;
        i64 => write_i64, write_i64_with;
        u64 => write_u64, write_u64_with;
        f32 => write_f32, write_f32_with;
        f64 => write_f64, write_f64_with;
    }

    /// Write a raw buffer in the sticky order.
    ///
    /// The buffer is treated as one native-order value: it is written as-is
    /// when the sticky order matches the host and reversed end-to-end
    /// otherwise.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.write_bytes_with(buf, self.order)
    }

    /// Write a raw buffer in `order`. See [`Self::write_bytes`].
    pub fn write_bytes_with(&mut self, buf: &[u8], order: ByteOrder) -> Result<()> {
        if order.needs_reverse() {
            let mut owned = buf.to_vec();
            owned.reverse();
            self.inner.write_all(&owned)?;
        } else {
            self.inner.write_all(buf)?;
        }
        Ok(())
    }

    /// Write one byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_all(&[value])?;
        Ok(())
    }

    /// Write one signed byte.
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    /// Write `0x01` for `true`, `0x00` for `false`.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    /// Write a character in the writer's encoding, without a length prefix.
    pub fn write_char(&mut self, value: char) -> Result<()> {
        let mut buf = [0u8; 4];
        let encoded = self.encoding.encode(value.encode_utf8(&mut buf));
        self.inner.write_all(&encoded)?;
        Ok(())
    }

    /// Write a length-prefixed string.
    ///
    /// The prefix is the encoded byte length as a 7-bit variable-length
    /// integer (low groups first, high bit set on all but the last byte).
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let encoded = self.encoding.encode(value);
        self.write_7bit_len(encoded.len() as u64)?;
        self.inner.write_all(&encoded)?;
        Ok(())
    }

    fn write_7bit_len(&mut self, mut len: u64) -> Result<()> {
        loop {
            let mut b = (len & 0x7F) as u8;
            len >>= 7;
            if len != 0 {
                b |= 0x80;
            }
            self.write_u8(b)?;
            if len == 0 {
                return Ok(());
            }
        }
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer, returning the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
