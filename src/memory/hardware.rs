//! Physical address space reservations for emulated hardware.
//!
//! Devices that need a private window (linear framebuffers, PCI BARs) ask
//! for one by name. Windows are carved top-down from
//! [`HARDWARE_WINDOW_TOP`], page-rounded and aligned to their own size
//! rounded up to a power of two, and may never reach down into RAM.

use crate::error::{Error, Result};

use super::address::PhysPt;
use super::layout::{HARDWARE_WINDOW_TOP, PAGE_SIZE};

/// A named window of physical address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareReservation {
    pub name: String,
    pub base: PhysPt,
    pub size: u32,
}

impl HardwareReservation {
    /// Check if an address falls within this reservation.
    pub fn contains(&self, addr: PhysPt) -> bool {
        addr >= self.base && (addr - self.base) < self.size
    }
}

#[derive(Debug)]
pub(crate) struct HardwareWindow {
    /// Lowest address a reservation may start at (end of RAM).
    floor: u64,
    /// Everything at and above this is taken.
    top: u64,
    reservations: Vec<HardwareReservation>,
}

impl HardwareWindow {
    pub(crate) fn new(floor: u64) -> Self {
        Self {
            floor,
            top: HARDWARE_WINDOW_TOP as u64,
            reservations: Vec::new(),
        }
    }

    pub(crate) fn allocate(&mut self, name: &str, size: u32) -> Result<PhysPt> {
        if self.reservations.iter().any(|r| r.name == name) {
            return Err(Error::DuplicateReservation(name.to_string()));
        }

        let failed = || Error::HardwareReservationFailed {
            name: name.to_string(),
            size,
        };
        if size == 0 {
            return Err(failed());
        }

        let page = PAGE_SIZE as u64;
        let rounded = (size as u64 + page - 1) & !(page - 1);
        let align = rounded.next_power_of_two();
        let base = self.top.checked_sub(rounded).ok_or_else(failed)? & !(align - 1);
        if base < self.floor {
            return Err(failed());
        }

        let reservation = HardwareReservation {
            name: name.to_string(),
            base: base as PhysPt,
            size: rounded as u32,
        };
        crate::debug_hardware!(
            "reserved '{}' at 0x{:08x} (0x{:x} bytes)",
            reservation.name,
            reservation.base,
            reservation.size
        );
        self.top = base;
        self.reservations.push(reservation);
        Ok(base as PhysPt)
    }

    pub(crate) fn reservations(&self) -> &[HardwareReservation] {
        &self.reservations
    }
}
