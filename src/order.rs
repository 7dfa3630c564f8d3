//! Byte order tag and the reversal rule shared by the writer.
//!
//! A value is always produced in the host's native layout first; it is then
//! reversed only when the requested order differs from the host order. The
//! host order is probed from the layout of a known integer rather than taken
//! from a compile-time assumption.

use std::fmt;

/// Byte order of a multi-byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// The byte order of the machine this code is running on.
    #[inline]
    pub fn native() -> Self {
        if 1u16.to_ne_bytes()[0] == 1 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    /// Whether bytes laid out in native order must be reversed to be in
    /// `self` order.
    #[inline]
    pub fn needs_reverse(self) -> bool {
        self != Self::native()
    }

    /// Rearrange a native-order byte sequence into `self` order, in place.
    #[inline]
    pub fn apply(self, bytes: &mut [u8]) {
        if self.needs_reverse() {
            bytes.reverse();
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Little => write!(f, "little-endian"),
            ByteOrder::Big => write!(f, "big-endian"),
        }
    }
}
