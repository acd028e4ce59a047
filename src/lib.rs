//! # x86mem
//!
//! Guest physical memory for x86 PC emulators: the RAM arena, a page
//! allocator for DOS memory managers, the A20 gate, and the accessor
//! families emulated hardware and the CPU core read and write through.
//!
//! ## Quick Start
//!
//! ```rust
//! use x86mem::{Memory, Result};
//!
//! fn main() -> Result<()> {
//!     let mut mem = Memory::builder()
//!         .memory_mb(16)
//!         .build()?;
//!
//!     // Real-mode access goes through the A20 gate and page handlers.
//!     mem.real_writew(0x0040, 0x0013, 640);
//!     assert_eq!(mem.phys_readw(0x413), 640);
//!
//!     // XMS-style allocation of 64 contiguous pages.
//!     let handle = mem.allocate_pages(64, true)?;
//!     assert_eq!(mem.allocated_pages(handle)?, 64);
//!     mem.release_pages(handle)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! [`Memory`] is driven by a single emulation thread and carries no locks.
//! Other threads must stop emulation before touching it.

mod builder;
pub mod debug;
mod error;
pub mod memory;

// Re-exports
pub use builder::MemoryBuilder;
pub use error::{Error, Result};
pub use memory::{
    phys_make, phys_to_real416, real_make, real_off, real_seg, real_to_phys, real_vec_address,
    HandlerKind, LinearPt, MemHandle, Memory, PageHandler, PageNum, PhysPt, PhysPt64, RealPt,
    Resize, SegmentVal,
};
