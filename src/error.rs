//! Error types for x86mem.

use thiserror::Error;

use crate::memory::MemHandle;

/// Result type alias using x86mem's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when configuring or managing guest memory.
///
/// Out-of-range guest accesses are never errors: reads return the all-ones
/// sentinel and writes are dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    #[error("invalid memory size: {0} bytes (must be a non-zero multiple of 4096 below the hardware window)")]
    InvalidMemorySize(u64),

    #[error("invalid address width: {0} bits (must be 20..=40)")]
    InvalidAddressBits(u32),

    // Host errors
    #[error("memory allocation failed: {0}")]
    MemoryAllocationFailed(String),

    // Page allocator errors
    #[error("invalid memory handle: {0}")]
    InvalidHandle(MemHandle),

    #[error("cannot allocate zero pages")]
    EmptyAllocation,

    #[error("insufficient free pages: requested {requested}, available {available}")]
    InsufficientPages { requested: usize, available: usize },

    // Hardware reservation errors
    #[error("hardware reservation '{name}' of {size} bytes does not fit")]
    HardwareReservationFailed { name: String, size: u32 },

    #[error("hardware reservation '{0}' already exists")]
    DuplicateReservation(String),

    // Page handler errors
    #[error("invalid page range: {pages} pages at page 0x{page:x}")]
    InvalidPageRange { page: usize, pages: usize },
}
