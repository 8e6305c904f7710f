//! Memory views and per-view page tables

use crate::constants::*;
use parking_lot::RwLock;

/// Kind tag for a memory view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Loader and OS data structures
    SystemData,
    /// Application code, data and heap (MEM2)
    Application,
    /// Foreground bucket
    Foreground,
    /// MEM1 (fast graphics memory)
    MEM1,
}

/// One page table entry.
///
/// `allocated` is set only on the first page of an allocation and `count`
/// is valid only there; every page of the run (including the base page)
/// has `in_use` set and `base` pointing at the base page index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageEntry {
    /// Index of the first page of the allocation this page belongs to
    pub base: u32,
    /// Number of pages in the allocation (base page only)
    pub count: u32,
    /// Set on the base page of an allocation
    pub allocated: bool,
    /// Set on every page of an allocation
    pub in_use: bool,
}

/// A contiguous guest-address range with a fixed page size
pub struct MemoryView {
    /// View kind tag
    pub kind: MemoryKind,
    /// First guest address covered
    pub start: u32,
    /// One past the last guest address covered
    pub end: u32,
    /// Allocation granularity
    pub page_size: u32,
    /// One entry per page
    pub pages: RwLock<Vec<PageEntry>>,
}

impl MemoryView {
    pub fn new(kind: MemoryKind, start: u32, end: u32, page_size: u32) -> Self {
        debug_assert!(start < end);
        debug_assert!(page_size.is_power_of_two());
        debug_assert_eq!((end - start) % page_size, 0);
        let num_pages = ((end - start) / page_size) as usize;
        Self {
            kind,
            start,
            end,
            page_size,
            pages: RwLock::new(vec![PageEntry::default(); num_pages]),
        }
    }

    /// Length of the view in bytes
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Number of pages in the view
    pub fn num_pages(&self) -> usize {
        self.len() / self.page_size as usize
    }

    /// Does this view contain `addr`?
    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Guest address of page `index`
    #[inline]
    pub fn page_addr(&self, index: usize) -> u32 {
        self.start + index as u32 * self.page_size
    }

    /// Page index containing `addr`
    #[inline]
    pub fn page_index(&self, addr: u32) -> usize {
        ((addr - self.start) / self.page_size) as usize
    }
}

/// The fixed Wii U view set
pub fn default_views() -> Vec<MemoryView> {
    vec![
        MemoryView::new(
            MemoryKind::SystemData,
            SYSTEM_DATA_BASE,
            SYSTEM_DATA_END,
            SYSTEM_DATA_PAGE,
        ),
        MemoryView::new(
            MemoryKind::Application,
            APPLICATION_BASE,
            APPLICATION_END,
            APPLICATION_PAGE,
        ),
        MemoryView::new(
            MemoryKind::Foreground,
            FOREGROUND_BASE,
            FOREGROUND_END,
            FOREGROUND_PAGE,
        ),
        MemoryView::new(MemoryKind::MEM1, MEM1_BASE, MEM1_END, MEM1_PAGE),
    ]
}
