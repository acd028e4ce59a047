//! Raw host-side accessors.
//!
//! Every guest-visible value is stored little-endian in host memory. These
//! helpers read and write 8/16/32/64-bit values at a byte offset into a host
//! buffer with that byte order, whatever the host's own order is.
//!
//! Three build variants produce identical results:
//! - little-endian hosts use a direct native-order load/store,
//! - big-endian hosts byte-swap on every access,
//! - with the `strict-alignment` feature, values are composed one byte at a
//!   time and no multi-byte load or store is ever issued.
//!
//! There is no bounds checking beyond Rust's slice indexing: the caller
//! guarantees that `off..off + width` lies inside the buffer.
//!
//! # Panics
//!
//! All functions panic if the accessed range is outside `buf`.

/// Read a byte.
#[inline]
pub fn host_readb(buf: &[u8], off: usize) -> u8 {
    buf[off]
}

/// Write a byte.
#[inline]
pub fn host_writeb(buf: &mut [u8], off: usize, val: u8) {
    buf[off] = val;
}

/// Byte-at-a-time composition. Never issues a multi-byte load or store.
#[cfg_attr(not(feature = "strict-alignment"), allow(dead_code))]
mod bytewise {
    use super::{host_readb, host_writeb};

    #[inline]
    pub fn readw(buf: &[u8], off: usize) -> u16 {
        host_readb(buf, off) as u16 | ((host_readb(buf, off + 1) as u16) << 8)
    }

    #[inline]
    pub fn readd(buf: &[u8], off: usize) -> u32 {
        readw(buf, off) as u32 | ((readw(buf, off + 2) as u32) << 16)
    }

    #[inline]
    pub fn readq(buf: &[u8], off: usize) -> u64 {
        readd(buf, off) as u64 | ((readd(buf, off + 4) as u64) << 32)
    }

    #[inline]
    pub fn writew(buf: &mut [u8], off: usize, val: u16) {
        host_writeb(buf, off, val as u8);
        host_writeb(buf, off + 1, (val >> 8) as u8);
    }

    #[inline]
    pub fn writed(buf: &mut [u8], off: usize, val: u32) {
        writew(buf, off, val as u16);
        writew(buf, off + 2, (val >> 16) as u16);
    }

    #[inline]
    pub fn writeq(buf: &mut [u8], off: usize, val: u64) {
        writed(buf, off, val as u32);
        writed(buf, off + 4, (val >> 32) as u32);
    }
}

/// Native-width access, byte-swapped on big-endian hosts.
#[cfg_attr(feature = "strict-alignment", allow(dead_code))]
mod native {
    macro_rules! native_access {
        ($read:ident, $write:ident, $ty:ty) => {
            #[inline]
            pub fn $read(buf: &[u8], off: usize) -> $ty {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&buf[off..off + std::mem::size_of::<$ty>()]);
                let val = <$ty>::from_ne_bytes(raw);
                #[cfg(target_endian = "big")]
                let val = val.swap_bytes();
                val
            }

            #[inline]
            pub fn $write(buf: &mut [u8], off: usize, val: $ty) {
                #[cfg(target_endian = "big")]
                let val = val.swap_bytes();
                buf[off..off + std::mem::size_of::<$ty>()].copy_from_slice(&val.to_ne_bytes());
            }
        };
    }

    native_access!(readw, writew, u16);
    native_access!(readd, writed, u32);
    native_access!(readq, writeq, u64);
}

#[cfg(feature = "strict-alignment")]
use bytewise as imp;
#[cfg(not(feature = "strict-alignment"))]
use native as imp;

/// Read a little-endian 16-bit value.
#[inline]
pub fn host_readw(buf: &[u8], off: usize) -> u16 {
    imp::readw(buf, off)
}

/// Read a little-endian 32-bit value.
#[inline]
pub fn host_readd(buf: &[u8], off: usize) -> u32 {
    imp::readd(buf, off)
}

/// Read a little-endian 64-bit value.
#[inline]
pub fn host_readq(buf: &[u8], off: usize) -> u64 {
    imp::readq(buf, off)
}

/// Write a little-endian 16-bit value.
#[inline]
pub fn host_writew(buf: &mut [u8], off: usize, val: u16) {
    imp::writew(buf, off, val)
}

/// Write a little-endian 32-bit value.
#[inline]
pub fn host_writed(buf: &mut [u8], off: usize, val: u32) {
    imp::writed(buf, off, val)
}

/// Write a little-endian 64-bit value.
#[inline]
pub fn host_writeq(buf: &mut [u8], off: usize, val: u64) {
    imp::writeq(buf, off, val)
}

/// A guest memory unit: one of the four access widths.
///
/// Lets the physical and handler-aware layers be written once over all
/// widths while still exposing the `b`/`w`/`d`/`q` entry points.
pub trait MemUnit: Copy + Eq + std::fmt::Debug {
    /// Width in bytes.
    const WIDTH: usize;
    /// Value returned for reads of absent memory.
    const SENTINEL: Self;

    fn read_host(buf: &[u8], off: usize) -> Self;
    fn write_host(self, buf: &mut [u8], off: usize);

    /// Zero-extend to 64 bits.
    fn to_u64(self) -> u64;
    /// Truncate from 64 bits.
    fn from_u64(val: u64) -> Self;
}

macro_rules! mem_unit {
    ($ty:ty, $read:ident, $write:ident) => {
        impl MemUnit for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            const SENTINEL: Self = <$ty>::MAX;

            #[inline]
            fn read_host(buf: &[u8], off: usize) -> Self {
                $read(buf, off)
            }

            #[inline]
            fn write_host(self, buf: &mut [u8], off: usize) {
                $write(buf, off, self)
            }

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_u64(val: u64) -> Self {
                val as $ty
            }
        }
    };
}

mem_unit!(u8, host_readb, host_writeb);
mem_unit!(u16, host_readw, host_writew);
mem_unit!(u32, host_readd, host_writed);
mem_unit!(u64, host_readq, host_writeq);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut buf = [0u8; 16];
        host_writed(&mut buf, 1, 0x1234_5678);
        assert_eq!(&buf[1..5], &[0x78, 0x56, 0x34, 0x12]);

        host_writeq(&mut buf, 8, 0x0102_0304_0506_0708);
        assert_eq!(&buf[8..16], &[8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_unaligned_read() {
        let buf = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99];
        assert_eq!(host_readw(&buf, 1), 0x3322);
        assert_eq!(host_readd(&buf, 3), 0x7766_5544);
        assert_eq!(host_readq(&buf, 1), 0x9988_7766_5544_3322);
    }

    #[test]
    fn test_bytewise_matches_native() {
        let src: Vec<u8> = (0..32u8).map(|i| i.wrapping_mul(0x3B) ^ 0xA5).collect();
        for off in 0..src.len() - 8 {
            assert_eq!(bytewise::readw(&src, off), native::readw(&src, off));
            assert_eq!(bytewise::readd(&src, off), native::readd(&src, off));
            assert_eq!(bytewise::readq(&src, off), native::readq(&src, off));
        }

        for off in [1, 3, 5, 7] {
            let mut a = [0u8; 16];
            let mut b = [0u8; 16];
            bytewise::writew(&mut a, off, 0xBEEF);
            native::writew(&mut b, off, 0xBEEF);
            assert_eq!(a, b);
            bytewise::writed(&mut a, off, 0xDEAD_BEEF);
            native::writed(&mut b, off, 0xDEAD_BEEF);
            assert_eq!(a, b);
            bytewise::writeq(&mut a, off, 0x0123_4567_89AB_CDEF);
            native::writeq(&mut b, off, 0x0123_4567_89AB_CDEF);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_mem_unit_sentinels() {
        assert_eq!(<u8 as MemUnit>::SENTINEL, 0xFF);
        assert_eq!(<u16 as MemUnit>::SENTINEL, 0xFFFF);
        assert_eq!(<u32 as MemUnit>::SENTINEL, 0xFFFF_FFFF);
        assert_eq!(<u64 as MemUnit>::WIDTH, 8);
    }

    #[test]
    #[should_panic]
    fn test_out_of_buffer_panics() {
        let buf = [0u8; 3];
        host_readd(&buf, 0);
    }
}
