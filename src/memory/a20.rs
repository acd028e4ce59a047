//! A20 address-line gate.

use super::address::LinearPt;
use super::layout::{HMA_END, HMA_START};

/// Bit forced low when the gate is disabled.
pub const A20_BIT: u32 = 1 << 20;

/// State of the A20 gate.
///
/// With the gate disabled, the HMA window (`0x100000..0x110000`, everything
/// a real-mode `seg:off` can reach above 1 MiB) aliases onto the copy with
/// bit 20 clear: `FFFF:0010` reads linear `0x00000` as it did on an 8086.
/// Addresses outside the window are never touched, so XMS and device memory
/// above it stay where they are whatever the gate state. Only the explicit
/// [`A20Gate::set`] changes the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A20Gate {
    enabled: bool,
}

impl A20Gate {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    #[inline]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the gate. Returns the previous state.
    pub fn set(&mut self, enabled: bool) -> bool {
        let previous = self.enabled;
        if previous != enabled {
            crate::debug_a20!("A20 gate {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        previous
    }

    /// Whether `addr` lies in the window the gate aliases.
    #[inline]
    pub const fn wraps(addr: LinearPt) -> bool {
        addr >= HMA_START && addr < HMA_END
    }

    /// Resolve `addr` through the gate.
    #[inline]
    pub const fn filter(&self, addr: LinearPt) -> LinearPt {
        if !self.enabled && Self::wraps(addr) {
            addr & !A20_BIT
        } else {
            addr
        }
    }
}

impl Default for A20Gate {
    /// Power-on state: disabled.
    fn default() -> Self {
        Self::new(false)
    }
}
