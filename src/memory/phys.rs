//! Bounds-checked physical RAM access.
//!
//! Reads past the end of RAM return the all-ones sentinel of the access
//! width, writes past the end are dropped. Guest software probing for
//! memory sees an empty bus, never a fault.

use super::address::{PhysPt, PhysPt64};
use super::host::MemUnit;
use super::layout::HIGH_MEMORY_START;
use super::Memory;

/// Offset of a `T`-wide access at `addr` into a buffer of `len` bytes, if
/// the whole access fits.
///
/// Equivalent to `addr < len - (width - 1)` without underflowing when `len`
/// is smaller than the width.
#[inline]
fn fit<T: MemUnit>(addr: u64, len: usize) -> Option<usize> {
    let addr = usize::try_from(addr).ok()?;
    if T::WIDTH <= len && addr <= len - T::WIDTH {
        Some(addr)
    } else {
        None
    }
}

#[inline]
pub(crate) fn read_bounded<T: MemUnit>(ram: &[u8], addr: PhysPt) -> T {
    match fit::<T>(addr as u64, ram.len()) {
        Some(off) => T::read_host(ram, off),
        None => T::SENTINEL,
    }
}

#[inline]
pub(crate) fn write_bounded<T: MemUnit>(ram: &mut [u8], addr: PhysPt, val: T) {
    if let Some(off) = fit::<T>(addr as u64, ram.len()) {
        val.write_host(ram, off);
    }
}

macro_rules! phys_accessors {
    ($($read:ident, $write:ident, $ty:ty;)*) => {
        $(
            #[inline]
            pub fn $read(&self, addr: PhysPt) -> $ty {
                self.phys_read(addr)
            }

            #[inline]
            pub fn $write(&mut self, addr: PhysPt, val: $ty) {
                self.phys_write(addr, val)
            }
        )*
    };
}

macro_rules! physdev_accessors {
    ($($read:ident, $write:ident, $ty:ty;)*) => {
        $(
            #[inline]
            pub fn $read(&self, addr: PhysPt64) -> $ty {
                self.physdev_read(addr)
            }

            #[inline]
            pub fn $write(&mut self, addr: PhysPt64, val: $ty) {
                self.physdev_write(addr, val)
            }
        )*
    };
}

impl Memory {
    /// Read system RAM at a physical address below 4 GiB.
    ///
    /// Bypasses page handlers and the A20 gate.
    #[inline]
    pub fn phys_read<T: MemUnit>(&self, addr: PhysPt) -> T {
        read_bounded(self.low_ram(), addr)
    }

    /// Write system RAM at a physical address below 4 GiB.
    #[inline]
    pub fn phys_write<T: MemUnit>(&mut self, addr: PhysPt, val: T) {
        write_bounded(self.low_ram_mut(), addr, val)
    }

    phys_accessors! {
        phys_readb, phys_writeb, u8;
        phys_readw, phys_writew, u16;
        phys_readd, phys_writed, u32;
        phys_readq, phys_writeq, u64;
    }

    /// Write a byte string to RAM from `addr` up, dropping bytes that fall
    /// past the end.
    pub fn phys_writes(&mut self, addr: PhysPt, data: &[u8]) {
        let ram = self.low_ram_mut();
        for (i, &b) in data.iter().enumerate() {
            write_bounded(ram, addr.wrapping_add(i as u32), b);
        }
    }

    /// Arena offset of a device-bus access, if it lands in RAM.
    ///
    /// The address is truncated to the CPU's address width first. Below
    /// 4 GiB it indexes the low RAM, from 4 GiB up the high RAM.
    #[inline]
    fn physdev_offset<T: MemUnit>(&self, addr: PhysPt64) -> Option<usize> {
        let addr = addr & self.address_mask();
        if addr < HIGH_MEMORY_START {
            fit::<T>(addr, self.low_size)
        } else {
            fit::<T>(addr - HIGH_MEMORY_START, self.high_size).map(|off| self.low_size + off)
        }
    }

    /// Read RAM on the 64-bit device bus, including RAM above 4 GiB.
    #[inline]
    pub fn physdev_read<T: MemUnit>(&self, addr: PhysPt64) -> T {
        match self.physdev_offset::<T>(addr) {
            Some(off) => T::read_host(self.arena.as_slice(), off),
            None => T::SENTINEL,
        }
    }

    /// Write RAM on the 64-bit device bus, including RAM above 4 GiB.
    #[inline]
    pub fn physdev_write<T: MemUnit>(&mut self, addr: PhysPt64, val: T) {
        if let Some(off) = self.physdev_offset::<T>(addr) {
            val.write_host(self.arena.as_mut_slice(), off);
        }
    }

    physdev_accessors! {
        physdev_readb, physdev_writeb, u8;
        physdev_readw, physdev_writew, u16;
        physdev_readd, physdev_writed, u32;
        physdev_readq, physdev_writeq, u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Memory {
        Memory::builder().memory_kb(64).build().unwrap()
    }

    #[test]
    fn test_round_trip_all_widths() {
        let mut mem = memory();
        let last = mem.mem_size() as PhysPt;

        mem.phys_writeb(last - 1, 0xA5);
        assert_eq!(mem.phys_readb(last - 1), 0xA5);
        mem.phys_writew(last - 2, 0xBEEF);
        assert_eq!(mem.phys_readw(last - 2), 0xBEEF);
        mem.phys_writed(last - 4, 0xDEAD_BEEF);
        assert_eq!(mem.phys_readd(last - 4), 0xDEAD_BEEF);
        mem.phys_writeq(last - 8, 0x0123_4567_89AB_CDEF);
        assert_eq!(mem.phys_readq(last - 8), 0x0123_4567_89AB_CDEF);

        mem.phys_writed(0x123, 0x1122_3344);
        assert_eq!(mem.phys_readb(0x123), 0x44);
        assert_eq!(mem.phys_readw(0x125), 0x1122);
    }

    #[test]
    fn test_out_of_range_reads_return_sentinel() {
        let mem = memory();
        let size = mem.mem_size() as PhysPt;
        for addr in [size, size + 1, 0x10_0000, u32::MAX] {
            assert_eq!(mem.phys_readb(addr), 0xFF);
            assert_eq!(mem.phys_readw(addr), 0xFFFF);
            assert_eq!(mem.phys_readd(addr), 0xFFFF_FFFF);
            assert_eq!(mem.phys_readq(addr), u64::MAX);
        }
        // Straddling the end is out of range as a whole.
        assert_eq!(mem.phys_readw(size - 1), 0xFFFF);
        assert_eq!(mem.phys_readd(size - 3), 0xFFFF_FFFF);
    }

    #[test]
    fn test_out_of_range_writes_are_dropped() {
        let mut mem = memory();
        let size = mem.mem_size() as PhysPt;
        mem.phys_writed(size - 2, 0x1234_5678);
        mem.phys_writeb(size, 0x12);
        mem.phys_writeq(u32::MAX - 3, u64::MAX);
        assert_eq!(mem.phys_readw(size - 2), 0);
        assert!(mem.low_ram().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fit_small_buffer() {
        assert_eq!(fit::<u32>(0, 2), None);
        assert_eq!(fit::<u16>(0, 2), Some(0));
        assert_eq!(fit::<u16>(1, 2), None);
        assert_eq!(fit::<u8>(1, 2), Some(1));
    }

    #[test]
    fn test_phys_ignores_a20() {
        let mut mem = Memory::builder().memory_mb(2).build().unwrap();
        mem.phys_writeb(0x10_0000, 0x42);
        assert_eq!(mem.phys_readb(0x10_0000), 0x42);
        assert_eq!(mem.phys_readb(0x0), 0);
    }

    #[test]
    fn test_phys_writes_clips_at_end() {
        let mut mem = memory();
        let size = mem.mem_size() as PhysPt;
        mem.phys_writes(size - 3, b"HELLO");
        assert_eq!(mem.phys_readb(size - 3), b'H');
        assert_eq!(mem.phys_readb(size - 1), b'L');
        assert_eq!(mem.phys_readb(size), 0xFF);
    }

    #[test]
    fn test_physdev_reaches_high_memory() {
        let mut mem = Memory::builder().memory_mb(1).memory_above_4gb_mb(1).build().unwrap();
        mem.physdev_writed(HIGH_MEMORY_START + 0x10, 0xFEED_FACE);
        assert_eq!(mem.physdev_readd(HIGH_MEMORY_START + 0x10), 0xFEED_FACE);
        // Low RAM at the same offset is untouched.
        assert_eq!(mem.physdev_readd(0x10), 0);

        mem.physdev_writew(0x500, 0x55AA);
        assert_eq!(mem.phys_readw(0x500), 0x55AA);

        // Between the end of low RAM and 4 GiB there is nothing.
        assert_eq!(mem.physdev_readb(0x20_0000), 0xFF);
        assert_eq!(mem.physdev_readq(HIGH_MEMORY_START + 0x10_0000), u64::MAX);
    }

    #[test]
    fn test_physdev_masks_address_width() {
        let mut mem = Memory::builder().memory_mb(1).address_bits(24).build().unwrap();
        mem.physdev_writeb(0x100_0042, 0x77);
        assert_eq!(mem.phys_readb(0x42), 0x77);
    }
}
