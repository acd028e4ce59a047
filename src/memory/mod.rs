//! Guest memory subsystem.
//!
//! [`Memory`] owns the RAM arena, the page allocator, the A20 gate, the
//! per-page handler table and the hardware reservation window. It is not
//! internally synchronized: one emulation thread drives it, and anything
//! else (a debugger, a save-state writer) must pause that thread first.
//!
//! Two accessor families read and write guest memory:
//! - `phys_*` index the arena directly, bounds-checked, ignoring handlers
//!   and the A20 gate,
//! - `mem_*` and `real_*` resolve the address through the A20 gate and
//!   dispatch through the page handler of the page it lands on.

mod a20;
mod access;
mod address;
mod alloc;
mod arena;
mod block;
mod handler;
mod hardware;
pub mod host;
mod phys;

use std::sync::Arc;

pub use a20::{A20Gate, A20_BIT};
pub use address::{
    phys_make, phys_to_real416, real_make, real_off, real_seg, real_to_phys, real_vec_address,
    LinearPt, PageNum, PhysPt, PhysPt64, RealPt, SegmentVal,
};
pub use alloc::{MemHandle, PageAllocator, Pages, Resize};
pub use arena::Arena;
pub use block::MEM_STRLEN_MAX;
pub use handler::{HandlerKind, PageHandler, PageHandlerTable};
pub use hardware::HardwareReservation;
pub use host::MemUnit;

use crate::builder::MemoryBuilder;
use crate::error::Result;
use hardware::HardwareWindow;

/// Physical memory layout of a PC.
pub mod layout {
    /// Size of a page frame.
    pub const PAGE_SIZE: usize = 4096;
    pub const PAGE_SHIFT: u32 = 12;
    pub const PAGE_MASK: usize = PAGE_SIZE - 1;

    /// Real mode IVT (256 far pointers)
    pub const REAL_MODE_IVT_BEGIN: u32 = 0x0000;

    /// Pages below the 1 MiB boundary.
    pub const CONVENTIONAL_PAGES: usize = 0x100;

    /// High memory area, the 64 KiB - 16 bytes reachable above 1 MiB from
    /// real mode with A20 enabled.
    pub const HMA_START: u32 = 0x10_0000;

    /// End of the HMA window (exclusive), page 0x110.
    pub const HMA_END: u32 = 0x11_0000;

    /// First page handed out by the allocator by default: everything below
    /// (conventional memory, upper memory and the HMA) is left to DOS.
    pub const XMS_START_PAGE: usize = 0x110;

    /// Top of the window hardware reservations are carved from.
    pub const HARDWARE_WINDOW_TOP: u32 = 0xFE00_0000;

    /// High memory starts at 4GB
    pub const HIGH_MEMORY_START: u64 = 0x1_0000_0000;
}

use layout::{HIGH_MEMORY_START, PAGE_SIZE};

/// Emulated guest RAM and the bookkeeping around it.
///
/// # Example
///
/// ```rust
/// use x86mem::Memory;
///
/// let mut mem = Memory::builder().memory_mb(16).build()?;
/// mem.real_writew(0xFFFF, 0x0010, 0xAA55);
/// // A20 is disabled at power-on, so FFFF:0010 wraps to 0000:0000.
/// assert_eq!(mem.phys_readw(0), 0xAA55);
/// # Ok::<(), x86mem::Error>(())
/// ```
#[derive(Debug)]
pub struct Memory {
    arena: Arena,
    /// Bytes of RAM below 4 GiB, at the start of the arena.
    low_size: usize,
    /// Bytes of RAM at 4 GiB and up, after the low part in the arena.
    high_size: usize,
    a20: A20Gate,
    address_bits: u32,
    allocator: PageAllocator,
    handlers: PageHandlerTable,
    hardware: HardwareWindow,
}

impl Memory {
    /// Create a new memory builder.
    pub fn builder() -> MemoryBuilder {
        MemoryBuilder::new()
    }

    pub(crate) fn from_parts(
        arena: Arena,
        low_size: usize,
        a20_enabled: bool,
        address_bits: u32,
        reserved_pages: usize,
    ) -> Self {
        let high_size = arena.size() - low_size;
        let low_pages = low_size / PAGE_SIZE;
        Self {
            arena,
            low_size,
            high_size,
            a20: A20Gate::new(a20_enabled),
            address_bits,
            allocator: PageAllocator::new(low_pages, reserved_pages, high_size / PAGE_SIZE),
            handlers: PageHandlerTable::new(low_pages),
            hardware: HardwareWindow::new(low_size as u64),
        }
    }

    /// Bytes of RAM below 4 GiB.
    pub fn mem_size(&self) -> usize {
        self.low_size
    }

    /// Bytes of RAM at and above 4 GiB.
    pub fn mem_size_above_4gb(&self) -> usize {
        self.high_size
    }

    /// RAM below 4 GiB, the range the `phys_*` family can reach.
    #[inline]
    pub(crate) fn low_ram(&self) -> &[u8] {
        &self.arena.as_slice()[..self.low_size]
    }

    #[inline]
    pub(crate) fn low_ram_mut(&mut self) -> &mut [u8] {
        let low = self.low_size;
        &mut self.arena.as_mut_slice()[..low]
    }

    // A20 gate

    pub fn a20_enabled(&self) -> bool {
        self.a20.enabled()
    }

    /// Enable or disable the A20 gate. Returns the previous state.
    pub fn set_a20_enabled(&mut self, enabled: bool) -> bool {
        self.a20.set(enabled)
    }

    // Address width

    /// Physical address width of the emulated CPU.
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Address width needed to reach the top of RAM above 4 GiB.
    pub fn address_bits_4gb(&self) -> u32 {
        bits_to_cover(HIGH_MEMORY_START + self.high_size as u64)
    }

    #[inline]
    pub(crate) fn address_mask(&self) -> u64 {
        (1u64 << self.address_bits) - 1
    }

    // Page allocator

    /// Read-only view of the page allocator.
    pub fn allocator(&self) -> &PageAllocator {
        &self.allocator
    }

    pub fn total_pages(&self) -> usize {
        self.allocator.total_pages()
    }

    pub fn total_pages_at_4gb(&self) -> usize {
        self.allocator.total_pages_at_4gb()
    }

    pub fn conventional_pages(&self) -> usize {
        self.allocator.conventional_pages()
    }

    pub fn free_total(&self) -> usize {
        self.allocator.free_total()
    }

    pub fn free_largest(&self) -> usize {
        self.allocator.free_largest()
    }

    pub fn next_free_page(&self) -> Option<PageNum> {
        self.allocator.next_free_page()
    }

    pub fn allocated_pages(&self, handle: MemHandle) -> Result<usize> {
        self.allocator.allocated_pages(handle)
    }

    pub fn allocate_pages(&mut self, pages: usize, sequence: bool) -> Result<MemHandle> {
        self.allocator.allocate(pages, sequence)
    }

    pub fn allocate_pages_a20_friendly(&mut self, pages: usize, sequence: bool) -> Result<MemHandle> {
        self.allocator.allocate_a20_friendly(pages, sequence)
    }

    pub fn release_pages(&mut self, handle: MemHandle) -> Result<()> {
        self.allocator.release(handle)
    }

    /// Resize `handle` to `pages` frames.
    ///
    /// When a contiguous allocation has to move, the guest contents of its
    /// old frames are copied to the new ones, so callers see the same data
    /// under the new handle value.
    pub fn reallocate_pages(&mut self, handle: &mut MemHandle, pages: usize, sequence: bool) -> Result<Resize> {
        let resize = self.allocator.reallocate(handle, pages, sequence)?;
        if let Resize::Moved { old_frames } = &resize {
            let new_frames: Vec<PageNum> = self.allocator.pages(*handle)?.collect();
            let ram = self.low_ram_mut();
            for (&from, &to) in old_frames.iter().zip(&new_frames) {
                let from = from as usize * PAGE_SIZE;
                ram.copy_within(from..from + PAGE_SIZE, to as usize * PAGE_SIZE);
            }
        }
        Ok(resize)
    }

    pub fn next_handle(&self, handle: MemHandle) -> Option<MemHandle> {
        self.allocator.next_handle(handle)
    }

    pub fn next_handle_at(&self, handle: MemHandle, page: usize) -> Option<MemHandle> {
        self.allocator.next_handle_at(handle, page)
    }

    // Page handlers

    /// Make `pages` pages from `phys_page` behave like absent memory.
    pub fn reset_page_handler_unmapped(&mut self, phys_page: usize, pages: usize) -> Result<()> {
        self.handlers.reset_unmapped(phys_page, pages)
    }

    /// Map `pages` pages from `phys_page` back to RAM.
    pub fn map_ram(&mut self, phys_page: usize, pages: usize) -> Result<()> {
        self.handlers.map_ram(phys_page, pages)
    }

    /// Route `pages` pages from `phys_page` to a device handler.
    pub fn install_handler(&mut self, phys_page: usize, pages: usize, handler: Arc<dyn PageHandler>) -> Result<()> {
        self.handlers.install(phys_page, pages, handler)
    }

    pub fn handler_kind(&self, phys_page: usize) -> HandlerKind {
        self.handlers.kind(phys_page)
    }

    // Hardware reservations

    /// Reserve `size` bytes of physical address space for a device.
    ///
    /// Returns the base address. Each name may be reserved once.
    pub fn hardware_allocate(&mut self, name: &str, size: u32) -> Result<PhysPt> {
        self.hardware.allocate(name, size)
    }

    pub fn hardware_reservations(&self) -> &[HardwareReservation] {
        self.hardware.reservations()
    }
}

/// Smallest address width that can express every address below `end`.
pub(crate) fn bits_to_cover(end: u64) -> u32 {
    (64 - end.saturating_sub(1).leading_zeros()).max(32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Memory {
        Memory::builder().memory_mb(16).build().unwrap()
    }

    #[test]
    fn test_sizes() {
        let mem = memory();
        assert_eq!(mem.mem_size(), 16 * 1024 * 1024);
        assert_eq!(mem.mem_size_above_4gb(), 0);
        assert_eq!(mem.total_pages(), 4096);
        assert_eq!(mem.total_pages_at_4gb(), 0);
        assert_eq!(mem.conventional_pages(), 256);
        assert_eq!(mem.free_total(), 4096 - layout::XMS_START_PAGE);
    }

    #[test]
    fn test_address_bits() {
        let mem = memory();
        assert_eq!(mem.address_bits(), 32);
        assert_eq!(mem.address_bits_4gb(), 32);

        let big = Memory::builder().memory_mb(1).memory_above_4gb_mb(4).build().unwrap();
        assert_eq!(big.address_bits(), 36);
        assert_eq!(big.address_bits_4gb(), 33);
        assert_eq!(big.total_pages_at_4gb(), 1024);
    }

    #[test]
    fn test_bits_to_cover() {
        assert_eq!(bits_to_cover(0x1000), 32);
        assert_eq!(bits_to_cover(HIGH_MEMORY_START), 32);
        assert_eq!(bits_to_cover(HIGH_MEMORY_START + 1), 33);
        assert_eq!(bits_to_cover(0x10_0000_0000), 36);
    }

    #[test]
    fn test_a20_toggle() {
        let mut mem = memory();
        assert!(!mem.a20_enabled());
        assert!(!mem.set_a20_enabled(true));
        assert!(mem.a20_enabled());
    }

    #[test]
    fn test_reallocate_moves_contents() {
        let mut mem = Memory::builder().memory_mb(2).reserved_pages(0).build().unwrap();
        let mut handle = mem.allocate_pages(2, true).unwrap();
        let _blocker = mem.allocate_pages(1, true).unwrap();
        mem.phys_writed(0x0000, 0xCAFE_F00D);
        mem.phys_writed(0x1FFC, 0x1234_5678);

        let resize = mem.reallocate_pages(&mut handle, 4, true).unwrap();
        assert!(matches!(resize, Resize::Moved { .. }));
        assert_eq!(handle.raw(), 3);
        assert_eq!(mem.phys_readd(0x3000), 0xCAFE_F00D);
        assert_eq!(mem.phys_readd(0x4FFC), 0x1234_5678);
    }

    #[test]
    fn test_handler_kind_passthrough() {
        let mut mem = memory();
        mem.reset_page_handler_unmapped(0xA0, 0x20).unwrap();
        assert_eq!(mem.handler_kind(0xA0), HandlerKind::Unmapped);
        mem.map_ram(0xA0, 0x20).unwrap();
        assert_eq!(mem.handler_kind(0xBF), HandlerKind::Ram);
    }
}
