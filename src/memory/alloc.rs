//! Page-granular allocator over guest RAM below 4 GiB.
//!
//! Ownership is tracked in two arrays indexed by page number:
//! - `owner[page]` is the handle owning the page, or free,
//! - `next[page]` links the page to the following frame of its handle.
//!
//! A handle is named after the first frame it claimed, so the handle value
//! doubles as the head of its frame chain. Frames below `reserved` (the
//! conventional area and HMA by default) are never handed out.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

use super::address::PageNum;
use super::layout::CONVENTIONAL_PAGES;

const FREE: i32 = -2;
const END: i32 = -1;

/// Opaque token naming a set of page frames.
///
/// The value space is a signed integer; [`MemHandle::NONE`] is the reserved
/// "no handle" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemHandle(i32);

impl MemHandle {
    /// No handle: allocation failure, end of chain, released handle.
    pub const NONE: MemHandle = MemHandle(-1);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 < 0
    }

    /// First frame of the handle.
    pub fn first_page(self) -> Option<PageNum> {
        u32::try_from(self.0).ok()
    }
}

impl Default for MemHandle {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for MemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "#{:x}", self.0)
        }
    }
}

/// Outcome of a successful [`PageAllocator::reallocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resize {
    /// The handle kept its identity; frames were added or removed in place.
    InPlace,
    /// The handle was `NONE` and a new allocation was made.
    Allocated,
    /// The size was zero and the handle was released.
    Released,
    /// A contiguous run could not grow in place. The handle now names a
    /// fresh run; `old_frames` lists the frames it used to own, in chain
    /// order, so the caller can carry their contents over.
    Moved { old_frames: Vec<PageNum> },
}

#[inline]
fn in_odd_megabyte(page: usize) -> bool {
    page & 0x100 != 0
}

/// Free/owned bookkeeping for every page frame below 4 GiB.
#[derive(Debug, Clone)]
pub struct PageAllocator {
    owner: Vec<i32>,
    next: Vec<i32>,
    reserved: usize,
    pages_at_4gb: usize,
}

impl PageAllocator {
    /// Create an allocator for `total_pages` frames below 4 GiB, the first
    /// `reserved` of which are never allocated, plus `pages_at_4gb` frames
    /// of RAM above 4 GiB that are only reported.
    pub fn new(total_pages: usize, reserved: usize, pages_at_4gb: usize) -> Self {
        Self {
            owner: vec![MemHandle::NONE.0; total_pages],
            next: vec![FREE; total_pages],
            reserved: reserved.min(total_pages),
            pages_at_4gb,
        }
    }

    /// Total 4 KiB pages below 4 GiB.
    pub fn total_pages(&self) -> usize {
        self.owner.len()
    }

    /// Total 4 KiB pages at and above 4 GiB.
    pub fn total_pages_at_4gb(&self) -> usize {
        self.pages_at_4gb
    }

    /// Pages below the 1 MiB boundary.
    pub fn conventional_pages(&self) -> usize {
        self.total_pages().min(CONVENTIONAL_PAGES)
    }

    /// First page the allocator may hand out.
    pub fn reserved_pages(&self) -> usize {
        self.reserved
    }

    #[inline]
    fn is_free(&self, page: usize) -> bool {
        self.next[page] == FREE
    }

    /// Free allocatable pages.
    pub fn free_total(&self) -> usize {
        (self.reserved..self.total_pages())
            .filter(|&page| self.is_free(page))
            .count()
    }

    /// Free allocatable pages outside odd megabytes.
    fn free_total_a20_friendly(&self) -> usize {
        (self.reserved..self.total_pages())
            .filter(|&page| self.is_free(page) && !in_odd_megabyte(page))
            .count()
    }

    /// Length of the largest run of free allocatable pages.
    pub fn free_largest(&self) -> usize {
        self.largest_run(false)
    }

    /// Largest free run, with odd megabytes breaking runs when
    /// `a20_friendly` is set, matching what [`Self::best_match`] can place.
    fn largest_run(&self, a20_friendly: bool) -> usize {
        let mut largest = 0;
        let mut run = 0;
        for page in self.reserved..self.total_pages() {
            if self.is_free(page) && !(a20_friendly && in_odd_megabyte(page)) {
                run += 1;
                largest = largest.max(run);
            } else {
                run = 0;
            }
        }
        largest
    }

    /// Best-fit search for `size` free frames.
    ///
    /// An exactly sized run wins immediately, otherwise the smallest run
    /// that is large enough. With `a20_friendly`, odd megabytes (bit 20 of
    /// the address set) break runs, so a placement never changes meaning
    /// when the A20 gate is toggled.
    fn best_match(&self, size: usize, a20_friendly: bool) -> Option<usize> {
        let total = self.total_pages();
        let mut first: Option<usize> = None;
        let mut best = usize::MAX;
        let mut best_first = None;

        for page in self.reserved..total {
            let usable = self.is_free(page) && !(a20_friendly && in_odd_megabyte(page));
            match first {
                None if usable => first = Some(page),
                Some(start) if !usable => {
                    let run = page - start;
                    if run == size {
                        return Some(start);
                    }
                    if run > size && run < best {
                        best = run;
                        best_first = Some(start);
                    }
                    first = None;
                }
                _ => {}
            }
        }

        if let Some(start) = first {
            let run = total - start;
            if run >= size && run < best {
                return Some(start);
            }
        }
        best_first
    }

    /// Best single-page placement, if any page is free.
    pub fn next_free_page(&self) -> Option<PageNum> {
        self.best_match(1, false).map(|page| page as PageNum)
    }

    /// Claim `count` frames from `start` for the handle headed at `head`,
    /// chaining them after `prev`. Returns the last frame claimed.
    fn link_run(&mut self, head: i32, prev: Option<usize>, start: usize, count: usize) -> Option<usize> {
        let mut prev = prev;
        for page in start..start + count {
            if let Some(p) = prev {
                self.next[p] = page as i32;
            }
            self.owner[page] = head;
            self.next[page] = END;
            prev = Some(page);
        }
        prev
    }

    /// Allocate `pages` frames.
    ///
    /// With `sequence` the frames are contiguous and the call fails unless a
    /// single free run is large enough. Without it the frames may be
    /// scattered and are chained in the order they were claimed.
    pub fn allocate(&mut self, pages: usize, sequence: bool) -> Result<MemHandle> {
        self.allocate_with(pages, sequence, false)
    }

    /// As [`PageAllocator::allocate`], but only places frames in even
    /// megabytes, where the A20 gate cannot alias them.
    pub fn allocate_a20_friendly(&mut self, pages: usize, sequence: bool) -> Result<MemHandle> {
        self.allocate_with(pages, sequence, true)
    }

    fn allocate_with(&mut self, pages: usize, sequence: bool, a20_friendly: bool) -> Result<MemHandle> {
        if pages == 0 {
            return Err(Error::EmptyAllocation);
        }

        let handle = if sequence {
            let start = self
                .best_match(pages, a20_friendly)
                .ok_or_else(|| Error::InsufficientPages {
                    requested: pages,
                    available: self.largest_run(a20_friendly),
                })?;
            self.link_run(start as i32, None, start, pages);
            MemHandle(start as i32)
        } else {
            let available = if a20_friendly {
                self.free_total_a20_friendly()
            } else {
                self.free_total()
            };
            if available < pages {
                return Err(Error::InsufficientPages {
                    requested: pages,
                    available,
                });
            }

            let mut head: Option<i32> = None;
            let mut last: Option<usize> = None;
            let mut remaining = pages;
            while remaining > 0 {
                let start = self.best_match(1, a20_friendly).ok_or(Error::InsufficientPages {
                    requested: pages,
                    available,
                })?;
                let run = (start..self.total_pages())
                    .take_while(|&p| self.is_free(p) && !(a20_friendly && in_odd_megabyte(p)))
                    .take(remaining)
                    .count();
                let owner = *head.get_or_insert(start as i32);
                last = self.link_run(owner, last, start, run);
                remaining -= run;
            }
            MemHandle(head.unwrap_or(END))
        };

        crate::debug_alloc!(
            "allocated {} pages (sequence={}, a20_friendly={}) as handle {}",
            pages,
            sequence,
            a20_friendly,
            handle
        );
        Ok(handle)
    }

    /// Head page of a live handle.
    fn validate(&self, handle: MemHandle) -> Result<usize> {
        let head = usize::try_from(handle.0).map_err(|_| Error::InvalidHandle(handle))?;
        if head >= self.total_pages() || self.owner[head] != handle.0 {
            return Err(Error::InvalidHandle(handle));
        }
        Ok(head)
    }

    fn chain(&self, head: usize) -> Pages<'_> {
        Pages {
            allocator: self,
            cursor: Some(head),
        }
    }

    /// Return every frame owned by `handle` to the free pool.
    ///
    /// Releasing an unknown or already released handle is an error.
    pub fn release(&mut self, handle: MemHandle) -> Result<()> {
        let head = self.validate(handle)?;
        let frames: Vec<usize> = self.chain(head).map(|page| page as usize).collect();
        for &page in &frames {
            self.owner[page] = MemHandle::NONE.0;
            self.next[page] = FREE;
        }
        crate::debug_alloc!("released handle {} ({} pages)", handle, frames.len());
        Ok(())
    }

    /// Resize `handle` to exactly `pages` frames.
    ///
    /// A `NONE` handle is allocated fresh and a size of zero releases the
    /// handle, leaving it `NONE`. Growing a sequence first tries to extend
    /// the run in place, then moves it to a new run. On failure the handle
    /// and its frames are left untouched.
    pub fn reallocate(&mut self, handle: &mut MemHandle, pages: usize, sequence: bool) -> Result<Resize> {
        if handle.is_none() {
            if pages == 0 {
                return Ok(Resize::InPlace);
            }
            *handle = self.allocate(pages, sequence)?;
            return Ok(Resize::Allocated);
        }

        let head = self.validate(*handle)?;
        if pages == 0 {
            self.release(*handle)?;
            *handle = MemHandle::NONE;
            return Ok(Resize::Released);
        }

        let frames: Vec<usize> = self.chain(head).map(|page| page as usize).collect();
        let old_pages = frames.len();
        let last = frames[old_pages - 1];

        match pages.cmp(&old_pages) {
            Ordering::Equal => Ok(Resize::InPlace),
            Ordering::Less => {
                self.next[frames[pages - 1]] = END;
                for &page in &frames[pages..] {
                    self.owner[page] = MemHandle::NONE.0;
                    self.next[page] = FREE;
                }
                crate::debug_alloc!("shrunk handle {} from {} to {} pages", handle, old_pages, pages);
                Ok(Resize::InPlace)
            }
            Ordering::Greater => {
                let need = pages - old_pages;
                if sequence {
                    let free_after = (last + 1..self.total_pages())
                        .take_while(|&page| self.is_free(page))
                        .count();
                    if free_after >= need {
                        self.link_run(head as i32, Some(last), last + 1, need);
                        crate::debug_alloc!("grew handle {} in place to {} pages", handle, pages);
                        return Ok(Resize::InPlace);
                    }

                    let moved = self.allocate(pages, true)?;
                    self.release(*handle)?;
                    crate::debug_alloc!("moved handle {} to {} ({} pages)", handle, moved, pages);
                    *handle = moved;
                    Ok(Resize::Moved {
                        old_frames: frames.iter().map(|&page| page as PageNum).collect(),
                    })
                } else {
                    let rest = self.allocate(need, false)?;
                    let rest_head = self.validate(rest)?;
                    let added: Vec<usize> = self.chain(rest_head).map(|page| page as usize).collect();
                    for page in added {
                        self.owner[page] = head as i32;
                    }
                    self.next[last] = rest_head as i32;
                    crate::debug_alloc!("grew handle {} to {} pages", handle, pages);
                    Ok(Resize::InPlace)
                }
            }
        }
    }

    /// Number of frames owned by `handle`.
    pub fn allocated_pages(&self, handle: MemHandle) -> Result<usize> {
        let head = self.validate(handle)?;
        Ok(self.chain(head).count())
    }

    /// Handle owning `page`, if the page is allocated.
    pub fn owner_of(&self, page: usize) -> Option<MemHandle> {
        match self.owner.get(page) {
            Some(&owner) if owner >= 0 => Some(MemHandle(owner)),
            _ => None,
        }
    }

    /// Handle owning the page right after `handle`'s last frame.
    pub fn next_handle(&self, handle: MemHandle) -> Option<MemHandle> {
        let head = self.validate(handle).ok()?;
        let last = self.chain(head).last()? as usize;
        self.owner_of(last + 1)
    }

    /// Live handle whose first frame is `page`, unless it is `handle`.
    ///
    /// Walking every page with the last handle seen as the cursor visits each
    /// live handle exactly once and skips free pages.
    pub fn next_handle_at(&self, handle: MemHandle, page: usize) -> Option<MemHandle> {
        let owner = self.owner_of(page)?;
        if owner == handle || owner.0 as usize != page {
            return None;
        }
        Some(owner)
    }

    /// Frame following `page` in its handle's chain.
    pub fn next_page(&self, page: PageNum) -> Option<PageNum> {
        match self.next.get(page as usize) {
            Some(&next) if next >= 0 => Some(next as PageNum),
            _ => None,
        }
    }

    /// The `index`-th frame of `handle`.
    pub fn page_at(&self, handle: MemHandle, index: usize) -> Option<PageNum> {
        let head = self.validate(handle).ok()?;
        self.chain(head).nth(index)
    }

    /// Frames of `handle` in chain order.
    pub fn pages(&self, handle: MemHandle) -> Result<Pages<'_>> {
        let head = self.validate(handle)?;
        Ok(self.chain(head))
    }

    /// Every live handle, in ascending order of first frame.
    pub fn handles(&self) -> impl Iterator<Item = MemHandle> + '_ {
        (0..self.total_pages())
            .filter(move |&page| self.owner[page] == page as i32)
            .map(|page| MemHandle(page as i32))
    }
}

/// Iterator over the frames of a handle.
#[derive(Debug, Clone)]
pub struct Pages<'a> {
    allocator: &'a PageAllocator,
    cursor: Option<usize>,
}

impl Iterator for Pages<'_> {
    type Item = PageNum;

    fn next(&mut self) -> Option<PageNum> {
        let page = self.cursor?;
        self.cursor = self.allocator.next_page(page as PageNum).map(|next| next as usize);
        Some(page as PageNum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 16 MiB, nothing reserved.
    fn flat() -> PageAllocator {
        PageAllocator::new(4096, 0, 0)
    }

    #[test]
    fn test_queries() {
        let alloc = PageAllocator::new(4096, 0x110, 256);
        assert_eq!(alloc.total_pages(), 4096);
        assert_eq!(alloc.total_pages_at_4gb(), 256);
        assert_eq!(alloc.conventional_pages(), 256);
        assert_eq!(alloc.free_total(), 4096 - 0x110);
        assert_eq!(alloc.free_largest(), 4096 - 0x110);
        assert_eq!(alloc.next_free_page(), Some(0x110));

        let tiny = PageAllocator::new(64, 0x110, 0);
        assert_eq!(tiny.conventional_pages(), 64);
        assert_eq!(tiny.free_total(), 0);
    }

    #[test]
    fn test_sequence_allocation() {
        let mut alloc = flat();
        let before = alloc.free_largest();
        let handle = alloc.allocate(10, true).unwrap();
        assert_eq!(alloc.free_largest(), before - 10);
        assert_eq!(alloc.allocated_pages(handle).unwrap(), 10);

        let frames: Vec<PageNum> = alloc.pages(handle).unwrap().collect();
        assert_eq!(frames, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_allocate_everything() {
        let mut alloc = flat();
        assert!(alloc.allocate(4097, true).is_err());
        let handle = alloc.allocate(alloc.total_pages(), true).unwrap();
        assert_eq!(alloc.free_total(), 0);
        assert_eq!(alloc.free_largest(), 0);
        assert!(alloc.allocate(1, false).is_err());
        alloc.release(handle).unwrap();
        assert_eq!(alloc.free_total(), 4096);
    }

    #[test]
    fn test_allocate_respects_reserved_area() {
        let mut alloc = PageAllocator::new(4096, 0x110, 0);
        assert!(alloc.allocate(4096, true).is_err());
        let free = alloc.free_total();
        let handle = alloc.allocate(free, true).unwrap();
        assert_eq!(handle.raw(), 0x110);
        assert_eq!(alloc.free_total(), 0);
    }

    #[test]
    fn test_zero_pages() {
        let mut alloc = flat();
        assert_eq!(alloc.allocate(0, true), Err(Error::EmptyAllocation));
    }

    #[test]
    fn test_best_fit_prefers_exact_run() {
        let mut alloc = PageAllocator::new(64, 0, 0);
        let a = alloc.allocate(4, true).unwrap();
        let _b = alloc.allocate(1, true).unwrap();
        let c = alloc.allocate(8, true).unwrap();
        let _d = alloc.allocate(1, true).unwrap();
        alloc.release(a).unwrap();
        alloc.release(c).unwrap();

        // Holes: 4 pages at 0, 8 pages at 5, tail from 14.
        assert_eq!(alloc.allocate(8, true).unwrap().raw(), 5);
        assert_eq!(alloc.allocate(3, true).unwrap().raw(), 0);
    }

    #[test]
    fn test_scattered_allocation() {
        let mut alloc = PageAllocator::new(32, 0, 0);
        let a = alloc.allocate(4, true).unwrap();
        let _b = alloc.allocate(4, true).unwrap();
        let c = alloc.allocate(4, true).unwrap();
        let _d = alloc.allocate(20, true).unwrap();
        alloc.release(a).unwrap();
        alloc.release(c).unwrap();

        assert!(alloc.allocate(6, true).is_err());
        let handle = alloc.allocate(6, false).unwrap();
        let frames: Vec<PageNum> = alloc.pages(handle).unwrap().collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 8, 9]);
        assert_eq!(alloc.owner_of(9), Some(handle));
        assert_eq!(alloc.free_total(), 2);
    }

    #[test]
    fn test_release_twice_is_an_error() {
        let mut alloc = flat();
        let handle = alloc.allocate(3, false).unwrap();
        alloc.release(handle).unwrap();
        assert_eq!(alloc.release(handle), Err(Error::InvalidHandle(handle)));
        assert_eq!(alloc.allocated_pages(handle), Err(Error::InvalidHandle(handle)));
        assert!(alloc.release(MemHandle::NONE).is_err());
        assert!(alloc.release(MemHandle::from_raw(1_000_000)).is_err());
    }

    #[test]
    fn test_release_non_head_page_is_an_error() {
        let mut alloc = flat();
        let handle = alloc.allocate(3, true).unwrap();
        let middle = MemHandle::from_raw(handle.raw() + 1);
        assert!(alloc.release(middle).is_err());
        assert_eq!(alloc.allocated_pages(handle).unwrap(), 3);
    }

    #[test]
    fn test_reallocate_shrink_then_grow() {
        let mut alloc = flat();
        let mut handle = alloc.allocate(16, true).unwrap();
        let original = handle;

        assert_eq!(alloc.reallocate(&mut handle, 4, true).unwrap(), Resize::InPlace);
        assert_eq!(alloc.allocated_pages(handle).unwrap(), 4);
        assert_eq!(alloc.free_total(), 4096 - 4);

        assert_eq!(alloc.reallocate(&mut handle, 16, true).unwrap(), Resize::InPlace);
        assert_eq!(handle, original);
        assert_eq!(alloc.allocated_pages(handle).unwrap(), 16);
    }

    #[test]
    fn test_reallocate_sequence_moves_when_blocked() {
        let mut alloc = PageAllocator::new(64, 0, 0);
        let mut handle = alloc.allocate(4, true).unwrap();
        let blocker = alloc.allocate(1, true).unwrap();

        let resize = alloc.reallocate(&mut handle, 8, true).unwrap();
        assert_eq!(resize, Resize::Moved { old_frames: vec![0, 1, 2, 3] });
        assert_eq!(handle.raw(), 5);
        assert_eq!(alloc.allocated_pages(handle).unwrap(), 8);
        assert_eq!(alloc.owner_of(0), None);
        assert_eq!(alloc.owner_of(4), Some(blocker));
    }

    #[test]
    fn test_reallocate_failure_leaves_handle_intact() {
        let mut alloc = PageAllocator::new(16, 0, 0);
        let mut handle = alloc.allocate(4, true).unwrap();
        let _blocker = alloc.allocate(8, true).unwrap();
        let before: Vec<PageNum> = alloc.pages(handle).unwrap().collect();

        assert!(alloc.reallocate(&mut handle, 12, true).is_err());
        assert!(alloc.reallocate(&mut handle, 12, false).is_err());
        assert_eq!(handle.raw(), 0);
        assert_eq!(alloc.pages(handle).unwrap().collect::<Vec<_>>(), before);
        assert_eq!(alloc.free_total(), 4);
    }

    #[test]
    fn test_reallocate_scattered_grow() {
        let mut alloc = PageAllocator::new(16, 0, 0);
        let mut handle = alloc.allocate(2, true).unwrap();
        let _blocker = alloc.allocate(2, true).unwrap();

        assert_eq!(alloc.reallocate(&mut handle, 5, false).unwrap(), Resize::InPlace);
        assert_eq!(handle.raw(), 0);
        let frames: Vec<PageNum> = alloc.pages(handle).unwrap().collect();
        assert_eq!(frames, vec![0, 1, 4, 5, 6]);
        assert!(frames.iter().all(|&p| alloc.owner_of(p as usize) == Some(handle)));
        // The frames claimed for growth do not form a handle of their own.
        assert_eq!(alloc.handles().count(), 2);
    }

    #[test]
    fn test_reallocate_none_and_zero() {
        let mut alloc = flat();
        let mut handle = MemHandle::NONE;
        assert_eq!(alloc.reallocate(&mut handle, 0, true).unwrap(), Resize::InPlace);
        assert!(handle.is_none());

        assert_eq!(alloc.reallocate(&mut handle, 3, true).unwrap(), Resize::Allocated);
        assert_eq!(alloc.allocated_pages(handle).unwrap(), 3);

        let old = handle;
        assert_eq!(alloc.reallocate(&mut handle, 0, true).unwrap(), Resize::Released);
        assert!(handle.is_none());
        assert!(alloc.allocated_pages(old).is_err());

        let mut stale = old;
        assert!(alloc.reallocate(&mut stale, 2, true).is_err());
    }

    #[test]
    fn test_next_handle() {
        let mut alloc = PageAllocator::new(64, 0, 0);
        let a = alloc.allocate(2, true).unwrap();
        let b = alloc.allocate(3, true).unwrap();
        let c = alloc.allocate(1, true).unwrap();

        assert_eq!(alloc.next_handle(a), Some(b));
        assert_eq!(alloc.next_handle(b), Some(c));
        assert_eq!(alloc.next_handle(c), None);

        alloc.release(b).unwrap();
        assert_eq!(alloc.next_handle(a), None);
        assert_eq!(alloc.next_handle(b), None);
    }

    #[test]
    fn test_next_handle_at_enumerates_live_handles_once() {
        let mut alloc = PageAllocator::new(64, 0, 0);
        let a = alloc.allocate(3, true).unwrap();
        let gap = alloc.allocate(2, true).unwrap();
        let b = alloc.allocate(4, true).unwrap();
        alloc.release(gap).unwrap();
        let c = alloc.allocate(4, false).unwrap();

        let mut cursor = MemHandle::NONE;
        let mut seen = Vec::new();
        for page in 0..alloc.total_pages() {
            if let Some(handle) = alloc.next_handle_at(cursor, page) {
                assert!(alloc.owner_of(page).is_some());
                seen.push(handle);
                cursor = handle;
            }
        }

        assert_eq!(seen, vec![a, c, b]);
        assert_eq!(alloc.handles().collect::<Vec<_>>(), seen);
    }

    #[test]
    fn test_chain_helpers() {
        let mut alloc = PageAllocator::new(16, 0, 0);
        let handle = alloc.allocate(3, true).unwrap();
        assert_eq!(alloc.next_page(0), Some(1));
        assert_eq!(alloc.next_page(2), None);
        assert_eq!(alloc.next_page(7), None);
        assert_eq!(alloc.page_at(handle, 2), Some(2));
        assert_eq!(alloc.page_at(handle, 3), None);
    }

    #[test]
    fn test_a20_friendly_skips_odd_megabytes() {
        // 3 MiB; reserved area ends inside the first odd megabyte.
        let mut alloc = PageAllocator::new(0x300, 0x110, 0);
        let handle = alloc.allocate_a20_friendly(16, true).unwrap();
        assert_eq!(handle.raw(), 0x200);

        // Only 256 even-megabyte pages exist above the reserved area.
        assert!(alloc.allocate_a20_friendly(0x100, true).is_err());
        assert!(alloc.allocate_a20_friendly(0x100, false).is_err());

        let scattered = alloc.allocate_a20_friendly(0xF0, false).unwrap();
        assert!(alloc
            .pages(scattered)
            .unwrap()
            .all(|page| page & 0x100 == 0));
    }

    #[test]
    fn test_a20_friendly_failure_reports_placeable_run() {
        // Pages 0x100..0x1FF are free but sit in the odd megabyte.
        let mut alloc = PageAllocator::new(0x300, 0, 0);
        let _low = alloc.allocate(0xF0, true).unwrap();
        let _high = alloc.allocate_a20_friendly(0xF8, true).unwrap();
        assert_eq!(alloc.free_largest(), 0x110);

        assert_eq!(
            alloc.allocate_a20_friendly(0x20, true),
            Err(Error::InsufficientPages {
                requested: 0x20,
                available: 0x10,
            })
        );
    }

    #[test]
    fn test_a20_friendly_sequence_never_spans_odd_megabyte() {
        let mut alloc = PageAllocator::new(0x400, 0, 0);
        let _low = alloc.allocate(0xF8, true).unwrap();
        // 8 pages left below 1 MiB; a 16 page run must not continue into 1 MiB.
        let handle = alloc.allocate_a20_friendly(16, true).unwrap();
        assert_eq!(handle.raw(), 0x200);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(MemHandle::NONE.to_string(), "none");
        assert_eq!(MemHandle::from_raw(0x110).to_string(), "#110");
        assert_eq!(MemHandle::from_raw(0x110).first_page(), Some(0x110));
        assert_eq!(MemHandle::NONE.first_page(), None);
    }
}
