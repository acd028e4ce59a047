//! Guest address kinds and the pure conversions between them.
//!
//! Keep the kinds apart even where they share a representation: a
//! [`LinearPt`] has not been through the page tables, a [`PhysPt`] has.

use std::fmt;

use super::layout::REAL_MODE_IVT_BEGIN;

/// Guest physical memory address (below 4 GiB).
pub type PhysPt = u32;

/// Guest physical memory address for hardware that lives above 4 GiB.
pub type PhysPt64 = u64;

/// Guest linear address, before page-table translation.
pub type LinearPt = u32;

/// Guest segment value.
pub type SegmentVal = u16;

/// Page frame number.
pub type PageNum = u32;

/// Real-mode far pointer: segment in the upper 16 bits, offset in the lower.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RealPt(u32);

impl RealPt {
    /// Build a far pointer from a segment and offset.
    #[inline]
    pub const fn new(seg: SegmentVal, off: u16) -> Self {
        Self(((seg as u32) << 16) | off as u32)
    }

    /// Wrap a packed `seg:off` value, as stored in the vector table.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The packed `seg:off` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn seg(self) -> SegmentVal {
        (self.0 >> 16) as u16
    }

    #[inline]
    pub const fn off(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// The linear address this pointer names, `(seg << 4) + off`.
    #[inline]
    pub const fn linear(self) -> LinearPt {
        phys_make(self.seg(), self.off())
    }
}

impl fmt::Display for RealPt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.seg(), self.off())
    }
}

impl From<u32> for RealPt {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<RealPt> for u32 {
    fn from(pt: RealPt) -> Self {
        pt.raw()
    }
}

/// Linear address of `seg:off`.
///
/// The sum is not masked to 20 bits: `FFFF:FFFF` is `0x10FFEF`. Whether that
/// wraps to `0x0FFEF` is decided later by the A20 gate.
#[inline]
pub const fn phys_make(seg: SegmentVal, off: u16) -> LinearPt {
    ((seg as u32) << 4) + off as u32
}

/// Segment half of a packed real pointer.
#[inline]
pub const fn real_seg(pt: RealPt) -> SegmentVal {
    pt.seg()
}

/// Offset half of a packed real pointer.
#[inline]
pub const fn real_off(pt: RealPt) -> u16 {
    pt.off()
}

/// Linear address of a packed real pointer.
#[inline]
pub const fn real_to_phys(pt: RealPt) -> LinearPt {
    pt.linear()
}

/// Pack a segment and offset.
#[inline]
pub const fn real_make(seg: SegmentVal, off: u16) -> RealPt {
    RealPt::new(seg, off)
}

/// Convert a linear address below 1 MiB to a 4:16 real pointer.
///
/// Bits 16..19 become the top nibble of the segment and the low 16 bits
/// become the offset, so `0xABCDE` is `A000:BCDE`. Bits 20 and up are
/// dropped, which makes the conversion lossy for addresses at or above 1 MiB.
#[inline]
pub const fn phys_to_real416(phys: LinearPt) -> RealPt {
    RealPt::new(((phys >> 4) & 0xF000) as u16, (phys & 0xFFFF) as u16)
}

/// Linear address of interrupt vector `vec` in the real-mode vector table.
#[inline]
pub const fn real_vec_address(vec: u8) -> LinearPt {
    REAL_MODE_IVT_BEGIN + ((vec as u32) << 2)
}
