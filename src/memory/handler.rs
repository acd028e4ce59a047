//! Per-page handler dispatch.
//!
//! Every guest page resolves to one of three behaviours: plain RAM backed by
//! the arena, unmapped (reads return all ones, writes are dropped), or a
//! device handler installed by an emulated peripheral. The memory core only
//! ever resets pages to RAM or unmapped; device handlers come from outside.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::address::PhysPt;
use super::layout::PAGE_SHIFT;

/// Memory-mapped behaviour for a range of guest pages.
///
/// Handlers receive the full physical address of the access. Only
/// [`PageHandler::readb`] and [`PageHandler::writeb`] are required; wider
/// accesses default to little-endian byte composition.
pub trait PageHandler: Send + Sync {
    /// Read a byte.
    fn readb(&self, addr: PhysPt) -> u8;

    /// Write a byte.
    fn writeb(&self, addr: PhysPt, val: u8);

    fn readw(&self, addr: PhysPt) -> u16 {
        self.readb(addr) as u16 | ((self.readb(addr.wrapping_add(1)) as u16) << 8)
    }

    fn readd(&self, addr: PhysPt) -> u32 {
        self.readw(addr) as u32 | ((self.readw(addr.wrapping_add(2)) as u32) << 16)
    }

    fn readq(&self, addr: PhysPt) -> u64 {
        self.readd(addr) as u64 | ((self.readd(addr.wrapping_add(4)) as u64) << 32)
    }

    fn writew(&self, addr: PhysPt, val: u16) {
        self.writeb(addr, val as u8);
        self.writeb(addr.wrapping_add(1), (val >> 8) as u8);
    }

    fn writed(&self, addr: PhysPt, val: u32) {
        self.writew(addr, val as u16);
        self.writew(addr.wrapping_add(2), (val >> 16) as u16);
    }

    fn writeq(&self, addr: PhysPt, val: u64) {
        self.writed(addr, val as u32);
        self.writed(addr.wrapping_add(4), (val >> 32) as u32);
    }
}

/// Which behaviour a page currently has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Ram,
    Unmapped,
    Device,
}

/// Resolved behaviour of a single page.
#[derive(Clone)]
pub(crate) enum PageSlot {
    Ram,
    Unmapped,
    Device(Arc<dyn PageHandler>),
}

impl PageSlot {
    fn kind(&self) -> HandlerKind {
        match self {
            PageSlot::Ram => HandlerKind::Ram,
            PageSlot::Unmapped => HandlerKind::Unmapped,
            PageSlot::Device(_) => HandlerKind::Device,
        }
    }
}

/// Lookup table from page number to behaviour.
///
/// Pages backed by the arena are stored densely; pages above the end of RAM
/// (device windows such as linear framebuffers) are stored sparsely and are
/// unmapped unless a device handler was installed there.
pub struct PageHandlerTable {
    ram_pages: usize,
    slots: Vec<PageSlot>,
    devices: BTreeMap<usize, Arc<dyn PageHandler>>,
}

/// Pages in the 32-bit physical address space.
const ADDRESS_SPACE_PAGES: usize = 1 << (32 - PAGE_SHIFT);

impl PageHandlerTable {
    /// A table where the first `ram_pages` pages are RAM.
    pub fn new(ram_pages: usize) -> Self {
        Self {
            ram_pages,
            slots: vec![PageSlot::Ram; ram_pages],
            devices: BTreeMap::new(),
        }
    }

    #[inline]
    pub(crate) fn slot(&self, page: usize) -> Option<&PageSlot> {
        self.slots.get(page)
    }

    #[inline]
    pub(crate) fn device(&self, page: usize) -> Option<&Arc<dyn PageHandler>> {
        self.devices.get(&page)
    }

    /// Behaviour of `page`.
    pub fn kind(&self, page: usize) -> HandlerKind {
        match self.slots.get(page) {
            Some(slot) => slot.kind(),
            None if self.devices.contains_key(&page) => HandlerKind::Device,
            None => HandlerKind::Unmapped,
        }
    }

    fn check_range(page: usize, pages: usize) -> Result<()> {
        match page.checked_add(pages) {
            Some(end) if end <= ADDRESS_SPACE_PAGES => Ok(()),
            _ => Err(Error::InvalidPageRange { page, pages }),
        }
    }

    /// Make `pages` pages from `page` behave like absent memory.
    pub fn reset_unmapped(&mut self, page: usize, pages: usize) -> Result<()> {
        Self::check_range(page, pages)?;
        for p in page..page + pages {
            match self.slots.get_mut(p) {
                Some(slot) => *slot = PageSlot::Unmapped,
                None => {
                    self.devices.remove(&p);
                }
            }
        }
        crate::debug_handler!("pages 0x{:x}+0x{:x} reset to unmapped", page, pages);
        Ok(())
    }

    /// Map `pages` pages from `page` back to the RAM behind them.
    ///
    /// Pages beyond the end of RAM cannot be mapped and are reported as an
    /// invalid range.
    pub fn map_ram(&mut self, page: usize, pages: usize) -> Result<()> {
        match page.checked_add(pages) {
            Some(end) if end <= self.ram_pages => {}
            _ => return Err(Error::InvalidPageRange { page, pages }),
        }
        for slot in &mut self.slots[page..page + pages] {
            *slot = PageSlot::Ram;
        }
        crate::debug_handler!("pages 0x{:x}+0x{:x} mapped to RAM", page, pages);
        Ok(())
    }

    /// Route `pages` pages from `page` to `handler`.
    pub fn install(&mut self, page: usize, pages: usize, handler: Arc<dyn PageHandler>) -> Result<()> {
        Self::check_range(page, pages)?;
        for p in page..page + pages {
            match self.slots.get_mut(p) {
                Some(slot) => *slot = PageSlot::Device(Arc::clone(&handler)),
                None => {
                    self.devices.insert(p, Arc::clone(&handler));
                }
            }
        }
        crate::debug_handler!("pages 0x{:x}+0x{:x} routed to device", page, pages);
        Ok(())
    }
}

impl std::fmt::Debug for PageHandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandlerTable")
            .field("ram_pages", &self.ram_pages)
            .field("device_pages", &self.devices.len())
            .finish()
    }
}
