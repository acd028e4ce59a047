//! Bulk transfers over the handler-aware accessors.
//!
//! Everything here moves data one unit at a time through `mem_*`, in
//! ascending address order. Nothing checks alignment, and copies between
//! overlapping guest ranges are only well defined when `dest <= src`: a
//! forward copy into a higher overlapping destination re-reads bytes it has
//! already written. Callers that need move semantics must stage the data.

use super::address::LinearPt;
use super::Memory;

/// Longest string [`Memory::mem_strlen`] will scan for a terminator.
pub const MEM_STRLEN_MAX: usize = 1024;

impl Memory {
    /// Copy host bytes into guest memory at `pt`.
    pub fn block_write(&mut self, pt: LinearPt, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.mem_writeb(pt.wrapping_add(i as u32), b);
        }
    }

    /// Fill `data` from guest memory at `pt`.
    pub fn block_read(&self, pt: LinearPt, data: &mut [u8]) {
        for (i, b) in data.iter_mut().enumerate() {
            *b = self.mem_readb(pt.wrapping_add(i as u32));
        }
    }

    /// Copy host dwords into guest memory at `pt`, 32 bits per access.
    pub fn block_write32(&mut self, pt: LinearPt, data: &[u32]) {
        for (i, &d) in data.iter().enumerate() {
            self.mem_writed(pt.wrapping_add(4 * i as u32), d);
        }
    }

    /// Fill `data` from guest memory at `pt`, 32 bits per access.
    pub fn block_read32(&self, pt: LinearPt, data: &mut [u32]) {
        for (i, d) in data.iter_mut().enumerate() {
            *d = self.mem_readd(pt.wrapping_add(4 * i as u32));
        }
    }

    /// Copy `size` bytes of guest memory from `src` to `dest`, a dword at a
    /// time with a byte tail.
    pub fn block_copy(&mut self, dest: LinearPt, src: LinearPt, size: usize) {
        let dwords = size / 4;
        for i in 0..dwords {
            let off = 4 * i as u32;
            let d = self.mem_readd(src.wrapping_add(off));
            self.mem_writed(dest.wrapping_add(off), d);
        }
        for i in dwords * 4..size {
            let b = self.mem_readb(src.wrapping_add(i as u32));
            self.mem_writeb(dest.wrapping_add(i as u32), b);
        }
    }

    /// Copy a NUL-terminated guest string at `pt` into `data`.
    ///
    /// At most `data.len() - 1` characters are copied and the result is
    /// always NUL-terminated. Returns the number of characters copied.
    pub fn str_copy(&self, pt: LinearPt, data: &mut [u8]) -> usize {
        let Some(max) = data.len().checked_sub(1) else {
            return 0;
        };
        let mut len = 0;
        while len < max {
            let b = self.mem_readb(pt.wrapping_add(len as u32));
            if b == 0 {
                break;
            }
            data[len] = b;
            len += 1;
        }
        data[len] = 0;
        len
    }

    /// Copy `size` bytes of guest memory from `src` to `dest`, a byte at a
    /// time.
    pub fn mem_memcpy(&mut self, dest: LinearPt, src: LinearPt, size: usize) {
        for i in 0..size {
            let b = self.mem_readb(src.wrapping_add(i as u32));
            self.mem_writeb(dest.wrapping_add(i as u32), b);
        }
    }

    /// Length of the NUL-terminated guest string at `pt`.
    ///
    /// Returns 0 when no terminator is found within [`MEM_STRLEN_MAX`]
    /// bytes.
    pub fn mem_strlen(&self, pt: LinearPt) -> usize {
        (0..MEM_STRLEN_MAX)
            .find(|&i| self.mem_readb(pt.wrapping_add(i as u32)) == 0)
            .unwrap_or(0)
    }

    /// Copy the NUL-terminated guest string at `src`, terminator included,
    /// to `dest`. Returns the string length.
    pub fn mem_strcpy(&mut self, dest: LinearPt, src: LinearPt) -> usize {
        let mut len: u32 = 0;
        loop {
            let b = self.mem_readb(src.wrapping_add(len));
            self.mem_writeb(dest.wrapping_add(len), b);
            if b == 0 || len == u32::MAX {
                return len as usize;
            }
            len += 1;
        }
    }
}
