//! Memory builder for configuring and creating the guest memory subsystem.

use crate::error::{Error, Result};
use crate::memory::layout::{HARDWARE_WINDOW_TOP, HIGH_MEMORY_START, PAGE_SIZE, XMS_START_PAGE};
use crate::memory::{bits_to_cover, Arena, Memory};

const DEFAULT_MEMORY_BYTES: u64 = 16 * 1024 * 1024;

/// Builder for creating a [`Memory`].
///
/// # Example
///
/// ```rust
/// use x86mem::Memory;
///
/// let mem = Memory::builder()
///     .memory_mb(64)
///     .a20_enabled(true)
///     .build()?;
/// assert_eq!(mem.total_pages(), 64 * 256);
/// # Ok::<(), x86mem::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryBuilder {
    memory_bytes: Option<u64>,
    above_4gb_bytes: Option<u64>,
    a20_enabled: Option<bool>,
    address_bits: Option<u32>,
    reserved_pages: Option<usize>,
}

impl MemoryBuilder {
    /// Create a new memory builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the amount of RAM below 4 GiB in kilobytes.
    ///
    /// Must be a multiple of 4.
    pub fn memory_kb(mut self, kb: u32) -> Self {
        self.memory_bytes = Some(kb as u64 * 1024);
        self
    }

    /// Set the amount of RAM below 4 GiB in megabytes.
    ///
    /// Default: 16 MB
    pub fn memory_mb(mut self, mb: u32) -> Self {
        self.memory_bytes = Some(mb as u64 * 1024 * 1024);
        self
    }

    /// Set the amount of RAM mapped from 4 GiB up, in megabytes.
    ///
    /// Default: 0
    pub fn memory_above_4gb_mb(mut self, mb: u32) -> Self {
        self.above_4gb_bytes = Some(mb as u64 * 1024 * 1024);
        self
    }

    /// Set the state of the A20 gate at power-on.
    ///
    /// Default: disabled
    pub fn a20_enabled(mut self, enabled: bool) -> Self {
        self.a20_enabled = Some(enabled);
        self
    }

    /// Set the physical address width of the emulated CPU (20..=40).
    ///
    /// Default: 32, or 36 when RAM above 4 GiB is configured
    pub fn address_bits(mut self, bits: u32) -> Self {
        self.address_bits = Some(bits);
        self
    }

    /// Set how many pages at the bottom of RAM the page allocator leaves
    /// alone.
    ///
    /// Default: 0x110 (conventional memory, upper memory and the HMA)
    pub fn reserved_pages(mut self, pages: usize) -> Self {
        self.reserved_pages = Some(pages);
        self
    }

    /// Build the memory subsystem.
    ///
    /// This validates the configuration and allocates the host arena.
    pub fn build(self) -> Result<Memory> {
        // Validate configuration
        let low = self.memory_bytes.unwrap_or(DEFAULT_MEMORY_BYTES);
        if low == 0 || low % PAGE_SIZE as u64 != 0 || low > HARDWARE_WINDOW_TOP as u64 {
            return Err(Error::InvalidMemorySize(low));
        }

        let high = self.above_4gb_bytes.unwrap_or(0);
        let needed_bits = if high > 0 {
            bits_to_cover(HIGH_MEMORY_START + high)
        } else {
            20
        };
        let address_bits = match self.address_bits {
            Some(bits) if (20..=40).contains(&bits) && bits >= needed_bits => bits,
            Some(bits) => return Err(Error::InvalidAddressBits(bits)),
            None if high > 0 => needed_bits.max(36),
            None => 32,
        };
        if needed_bits > 40 {
            return Err(Error::InvalidMemorySize(high));
        }

        let total = usize::try_from(low + high).map_err(|_| Error::InvalidMemorySize(low + high))?;
        let arena = Arena::new(total)?;

        Ok(Memory::from_parts(
            arena,
            low as usize,
            self.a20_enabled.unwrap_or(false),
            address_bits,
            self.reserved_pages.unwrap_or(XMS_START_PAGE),
        ))
    }
}
