//! Host backing store for guest RAM.

use crate::error::{Error, Result};

use super::layout::PAGE_SIZE;

#[cfg(windows)]
use windows::Win32::System::Memory::*;

/// Page-aligned, zero-initialized host memory standing in for guest RAM.
///
/// The arena is only ever exposed as a bounds-checked slice; no raw
/// offsettable pointer leaves this module.
pub struct Arena {
    /// Pointer to the allocated memory
    ptr: *mut u8,
    /// Size of the allocation in bytes
    size: usize,
}

// Safety: Arena owns its allocation exclusively; aliasing is governed by
// the &/&mut borrows handed out by as_slice/as_mut_slice.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Allocate a new arena of `size` bytes.
    ///
    /// `size` must be a non-zero multiple of the 4 KiB page size.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || size % PAGE_SIZE != 0 {
            return Err(Error::InvalidMemorySize(size as u64));
        }

        let ptr = Self::map(size)?;
        Ok(Self { ptr, size })
    }

    #[cfg(unix)]
    fn map(size: usize) -> Result<*mut u8> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(Error::MemoryAllocationFailed(format!(
                "mmap failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        Ok(ptr as *mut u8)
    }

    #[cfg(windows)]
    fn map(size: usize) -> Result<*mut u8> {
        let ptr = unsafe { VirtualAlloc(None, size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };

        if ptr.is_null() {
            return Err(Error::MemoryAllocationFailed(format!(
                "VirtualAlloc failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        Ok(ptr as *mut u8)
    }

    /// Get the size of the arena in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get a slice view of the arena.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// Get a mutable slice view of the arena.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }

        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }

        #[cfg(windows)]
        unsafe {
            let _ = VirtualFree(self.ptr as *mut std::ffi::c_void, 0, MEM_RELEASE);
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena").field("size", &self.size).finish()
    }
}
