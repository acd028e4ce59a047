//! Handler-aware guest memory access.
//!
//! These are slower than the `phys_*` family: every access goes through the
//! A20 gate and is dispatched on the handler of the page it lands on. An
//! access that straddles a page boundary is split into bytes and each byte
//! is resolved on its own, so the two halves may hit different handlers.

use super::address::{phys_make, real_vec_address, LinearPt, PhysPt, RealPt, SegmentVal};
use super::handler::{PageHandler, PageSlot};
use super::host::MemUnit;
use super::layout::{PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};
use super::phys::{read_bounded, write_bounded};
use super::Memory;

#[inline]
fn device_read<T: MemUnit>(handler: &dyn PageHandler, addr: PhysPt) -> T {
    let val = match T::WIDTH {
        1 => handler.readb(addr) as u64,
        2 => handler.readw(addr) as u64,
        4 => handler.readd(addr) as u64,
        _ => handler.readq(addr),
    };
    T::from_u64(val)
}

#[inline]
fn device_write<T: MemUnit>(handler: &dyn PageHandler, addr: PhysPt, val: T) {
    let val = val.to_u64();
    match T::WIDTH {
        1 => handler.writeb(addr, val as u8),
        2 => handler.writew(addr, val as u16),
        4 => handler.writed(addr, val as u32),
        _ => handler.writeq(addr, val),
    }
}

#[inline]
fn crosses_page<T: MemUnit>(addr: LinearPt) -> bool {
    (addr as usize & PAGE_MASK) + T::WIDTH > PAGE_SIZE
}

macro_rules! mem_accessors {
    ($($read:ident, $write:ident, $real_read:ident, $real_write:ident, $ty:ty;)*) => {
        $(
            #[inline]
            pub fn $read(&self, addr: LinearPt) -> $ty {
                self.mem_read(addr)
            }

            #[inline]
            pub fn $write(&mut self, addr: LinearPt, val: $ty) {
                self.mem_write(addr, val)
            }

            #[inline]
            pub fn $real_read(&self, seg: SegmentVal, off: u16) -> $ty {
                self.mem_read(phys_make(seg, off))
            }

            #[inline]
            pub fn $real_write(&mut self, seg: SegmentVal, off: u16, val: $ty) {
                self.mem_write(phys_make(seg, off), val)
            }
        )*
    };
}

impl Memory {
    /// Resolve a linear address on the A20-gated path.
    #[inline]
    pub fn resolve(&self, addr: LinearPt) -> PhysPt {
        self.a20.filter(addr)
    }

    /// Read through the page handler table.
    pub fn mem_read<T: MemUnit>(&self, addr: LinearPt) -> T {
        if crosses_page::<T>(addr) {
            let mut val = 0u64;
            for i in 0..T::WIDTH {
                let b: u8 = self.mem_read(addr.wrapping_add(i as u32));
                val |= (b as u64) << (8 * i);
            }
            return T::from_u64(val);
        }

        let phys = self.resolve(addr);
        let page = (phys >> PAGE_SHIFT) as usize;
        match self.handlers.slot(page) {
            Some(PageSlot::Ram) => read_bounded(self.low_ram(), phys),
            Some(PageSlot::Unmapped) => T::SENTINEL,
            Some(PageSlot::Device(handler)) => device_read(handler.as_ref(), phys),
            None => match self.handlers.device(page) {
                Some(handler) => device_read(handler.as_ref(), phys),
                None => T::SENTINEL,
            },
        }
    }

    /// Write through the page handler table.
    pub fn mem_write<T: MemUnit>(&mut self, addr: LinearPt, val: T) {
        if crosses_page::<T>(addr) {
            let val = val.to_u64();
            for i in 0..T::WIDTH {
                self.mem_write(addr.wrapping_add(i as u32), (val >> (8 * i)) as u8);
            }
            return;
        }

        let phys = self.resolve(addr);
        let page = (phys >> PAGE_SHIFT) as usize;
        let low = self.low_size;
        match self.handlers.slot(page) {
            Some(PageSlot::Ram) => write_bounded(&mut self.arena.as_mut_slice()[..low], phys, val),
            Some(PageSlot::Unmapped) => {}
            Some(PageSlot::Device(handler)) => device_write(handler.as_ref(), phys, val),
            None => {
                if let Some(handler) = self.handlers.device(page) {
                    device_write(handler.as_ref(), phys, val);
                }
            }
        }
    }

    mem_accessors! {
        mem_readb, mem_writeb, real_readb, real_writeb, u8;
        mem_readw, mem_writew, real_readw, real_writew, u16;
        mem_readd, mem_writed, real_readd, real_writed, u32;
        mem_readq, mem_writeq, real_readq, real_writeq, u64;
    }

    /// Read interrupt vector `vec` from the real-mode vector table.
    pub fn real_get_vec(&self, vec: u8) -> RealPt {
        RealPt::from_raw(self.mem_readd(real_vec_address(vec)))
    }

    /// Point interrupt vector `vec` at `pt`.
    pub fn real_set_vec(&mut self, vec: u8, pt: RealPt) {
        self.mem_writed(real_vec_address(vec), pt.raw());
    }

    /// Point interrupt vector `vec` at `pt` and return what it held before.
    pub fn real_swap_vec(&mut self, vec: u8, pt: RealPt) -> RealPt {
        let addr = real_vec_address(vec);
        let old = RealPt::from_raw(self.mem_readd(addr));
        self.mem_writed(addr, pt.raw());
        old
    }
}
