//! Guest memory manager
//!
//! Reserves a single 4 GiB host window so that every guest address
//! translates to `base + address`, then maps the fixed view set inside it.
//! Host/guest pointer conversion is a constant-time offset.

use crate::bytes::{from_guest, to_guest, Primitive};
use crate::constants::ADDRESS_SPACE_SIZE;
use crate::view::{default_views, MemoryKind, MemoryView, PageEntry};
use ocf_core::error::MemoryError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Base address hints tried in order when reserving the guest window
const BASE_HINTS: &[usize] = &[
    0x1_0000_0000,
    0x2_0000_0000,
    0x4_0000_0000,
    0x8_0000_0000,
    0, // let the host choose
];

/// Guest memory manager for the Wii U address space
pub struct Memory {
    /// Host base of the 4 GiB window; `host = base + guest_address`
    base: *mut u8,
    /// The fixed view set
    views: Vec<MemoryView>,
}

// Safety: the window is process-lived; page tables are behind RwLocks and
// raw accesses follow the guest's own synchronisation rules.
unsafe impl Send for Memory {}
unsafe impl Sync for Memory {}

impl Memory {
    /// Reserve the guest window and map all views.
    ///
    /// Tries each base hint in turn; either every view maps or the
    /// reservation is released and the next hint is tried.
    pub fn initialise() -> Result<Arc<Self>, MemoryError> {
        let views = default_views();
        let mut reserved_any = false;

        for &hint in BASE_HINTS {
            let base = match Self::reserve_address_space(hint) {
                Some(base) => base,
                None => continue,
            };
            reserved_any = true;

            if Self::try_map_views(base, &views) {
                debug!("guest memory window reserved at {:p}", base);
                return Ok(Arc::new(Self { base, views }));
            }

            Self::release_address_space(base);
        }

        warn!("failed to reserve the 4 GiB guest window");
        if reserved_any {
            Err(MemoryError::MappingFailed)
        } else {
            Err(MemoryError::OutOfMemory)
        }
    }

    #[cfg(unix)]
    fn reserve_address_space(hint: usize) -> Option<*mut u8> {
        use libc::{mmap, MAP_ANONYMOUS, MAP_FAILED, MAP_NORESERVE, MAP_PRIVATE, PROT_NONE};

        let ptr = unsafe {
            mmap(
                hint as *mut libc::c_void,
                ADDRESS_SPACE_SIZE,
                PROT_NONE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_NORESERVE,
                -1,
                0,
            )
        };

        if ptr == MAP_FAILED {
            None
        } else {
            Some(ptr as *mut u8)
        }
    }

    #[cfg(unix)]
    fn try_map_views(base: *mut u8, views: &[MemoryView]) -> bool {
        use libc::{mprotect, PROT_NONE, PROT_READ, PROT_WRITE};

        for (index, view) in views.iter().enumerate() {
            let ok = unsafe {
                mprotect(
                    base.add(view.start as usize) as *mut libc::c_void,
                    view.len(),
                    PROT_READ | PROT_WRITE,
                ) == 0
            };

            if !ok {
                // Undo whatever succeeded so the caller can retry elsewhere
                for mapped in &views[..index] {
                    unsafe {
                        mprotect(
                            base.add(mapped.start as usize) as *mut libc::c_void,
                            mapped.len(),
                            PROT_NONE,
                        );
                    }
                }
                return false;
            }
        }

        true
    }

    #[cfg(unix)]
    fn release_address_space(base: *mut u8) {
        unsafe {
            libc::munmap(base as *mut libc::c_void, ADDRESS_SPACE_SIZE);
        }
    }

    #[cfg(windows)]
    fn reserve_address_space(hint: usize) -> Option<*mut u8> {
        use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_RESERVE, PAGE_NOACCESS};

        let ptr = unsafe {
            VirtualAlloc(
                hint as *const core::ffi::c_void,
                ADDRESS_SPACE_SIZE,
                MEM_RESERVE,
                PAGE_NOACCESS,
            )
        };

        if ptr.is_null() {
            None
        } else {
            Some(ptr as *mut u8)
        }
    }

    #[cfg(windows)]
    fn try_map_views(base: *mut u8, views: &[MemoryView]) -> bool {
        use windows_sys::Win32::System::Memory::{
            VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_DECOMMIT, PAGE_READWRITE,
        };

        for (index, view) in views.iter().enumerate() {
            let ptr = unsafe {
                VirtualAlloc(
                    base.add(view.start as usize) as *const core::ffi::c_void,
                    view.len(),
                    MEM_COMMIT,
                    PAGE_READWRITE,
                )
            };

            if ptr.is_null() {
                for mapped in &views[..index] {
                    unsafe {
                        VirtualFree(
                            base.add(mapped.start as usize) as *mut core::ffi::c_void,
                            mapped.len(),
                            MEM_DECOMMIT,
                        );
                    }
                }
                return false;
            }
        }

        true
    }

    #[cfg(windows)]
    fn release_address_space(base: *mut u8) {
        use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};
        unsafe {
            VirtualFree(base as *mut core::ffi::c_void, 0, MEM_RELEASE);
        }
    }

    /// Host base pointer of the guest window
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    /// The mapped views
    pub fn views(&self) -> &[MemoryView] {
        &self.views
    }

    fn view_by_kind(&self, kind: MemoryKind) -> Option<&MemoryView> {
        self.views.iter().find(|v| v.kind == kind)
    }

    fn view_by_addr(&self, addr: u32) -> Option<&MemoryView> {
        self.views.iter().find(|v| v.contains(addr))
    }

    /// Is `addr` inside an allocated page of some view?
    pub fn valid(&self, addr: u32) -> bool {
        match self.view_by_addr(addr) {
            Some(view) => {
                let pages = view.pages.read();
                pages[view.page_index(addr)].in_use
            }
            None => false,
        }
    }

    /// Allocate `size` bytes from the view tagged `kind`.
    ///
    /// Returns the guest address of the allocation, or 0 on failure.
    pub fn alloc(&self, kind: MemoryKind, size: u32) -> u32 {
        let view = match self.view_by_kind(kind) {
            Some(view) => view,
            None => return 0,
        };

        if size == 0 {
            return 0;
        }

        let count = size.div_ceil(view.page_size) as usize;
        let mut pages = view.pages.write();

        let first = match find_free_run(&pages, 0, count) {
            Some(first) => first,
            None => {
                warn!("alloc of {} bytes from {:?} failed", size, kind);
                return 0;
            }
        };

        mark_allocated(&mut pages, first, count);
        view.page_addr(first)
    }

    /// Allocate `size` bytes at the fixed guest address `addr`.
    ///
    /// Fails if the range is not wholly inside one view and free.
    pub fn alloc_fixed(&self, addr: u32, size: u32) -> bool {
        let view = match self.view_by_addr(addr) {
            Some(view) => view,
            None => return false,
        };

        if size == 0 || addr % view.page_size != 0 {
            return false;
        }

        let first = view.page_index(addr);
        let count = size.div_ceil(view.page_size) as usize;

        if first + count > view.num_pages() {
            return false;
        }

        let mut pages = view.pages.write();

        if pages[first..first + count].iter().any(|p| p.in_use) {
            return false;
        }

        mark_allocated(&mut pages, first, count);
        true
    }

    /// Free the allocation starting at (or containing) `addr`.
    pub fn free(&self, addr: u32) -> bool {
        let view = match self.view_by_addr(addr) {
            Some(view) => view,
            None => return false,
        };

        let mut pages = view.pages.write();
        let index = view.page_index(addr);

        if !pages[index].in_use {
            return false;
        }

        let base = pages[index].base as usize;
        let count = pages[base].count as usize;
        debug_assert!(pages[base].allocated);

        for page in &mut pages[base..base + count] {
            *page = PageEntry::default();
        }

        true
    }

    /// Translate a guest address to a host pointer.
    ///
    /// Address 0 is the null sentinel and yields a null pointer.
    #[inline(always)]
    pub fn translate(&self, addr: u32) -> *mut u8 {
        if addr == 0 {
            std::ptr::null_mut()
        } else {
            unsafe { self.base.add(addr as usize) }
        }
    }

    /// Translate a host pointer back to a guest address.
    ///
    /// A null pointer yields address 0. Any other pointer must lie inside
    /// the guest window; violating that is a programmer error.
    pub fn untranslate(&self, ptr: *const u8) -> u32 {
        if ptr.is_null() {
            return 0;
        }

        let ptr = ptr as usize;
        let base = self.base as usize;
        assert!(ptr > base, "host pointer below guest window");
        assert!(ptr <= base + 0xFFFF_FFFF, "host pointer above guest window");
        (ptr - base) as u32
    }

    /// Read a value from guest memory, converting from big-endian.
    #[inline(always)]
    pub fn read<T: Primitive>(&self, addr: u32) -> T {
        from_guest(self.read_no_swap(addr))
    }

    /// Read a value from guest memory without byte conversion.
    #[inline(always)]
    pub fn read_no_swap<T: Primitive>(&self, addr: u32) -> T {
        unsafe { std::ptr::read_unaligned(self.translate(addr) as *const T) }
    }

    /// Write a value to guest memory, converting to big-endian.
    #[inline(always)]
    pub fn write<T: Primitive>(&self, addr: u32, value: T) {
        self.write_no_swap(addr, to_guest(value));
    }

    /// Write a value to guest memory without byte conversion.
    #[inline(always)]
    pub fn write_no_swap<T: Primitive>(&self, addr: u32, value: T) {
        unsafe { std::ptr::write_unaligned(self.translate(addr) as *mut T, value) }
    }

    /// Copy bytes into guest memory.
    pub fn write_bytes(&self, addr: u32, data: &[u8]) {
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.translate(addr), data.len());
        }
    }

    /// Copy bytes out of guest memory.
    pub fn read_bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(self.translate(addr), data.as_mut_ptr(), len);
        }
        data
    }

    /// Zero a range of guest memory.
    pub fn zero(&self, addr: u32, len: usize) {
        unsafe {
            std::ptr::write_bytes(self.translate(addr), 0, len);
        }
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        Self::release_address_space(self.base);
    }
}

fn find_free_run(pages: &[PageEntry], from: usize, count: usize) -> Option<usize> {
    let mut start = from;
    let mut run = 0usize;

    for (index, page) in pages.iter().enumerate().skip(from) {
        if page.in_use {
            run = 0;
            start = index + 1;
        } else {
            run += 1;
            if run == count {
                return Some(start);
            }
        }
    }

    None
}

fn mark_allocated(pages: &mut [PageEntry], first: usize, count: usize) {
    for (offset, page) in pages[first..first + count].iter_mut().enumerate() {
        *page = PageEntry {
            base: first as u32,
            count: if offset == 0 { count as u32 } else { 0 },
            allocated: offset == 0,
            in_use: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn test_initialise() {
        let mem = Memory::initialise().unwrap();
        assert!(!mem.base().is_null());
        assert_eq!(mem.views().len(), 4);
    }

    #[test]
    fn test_translate_null() {
        let mem = Memory::initialise().unwrap();
        assert!(mem.translate(0).is_null());
        assert_eq!(mem.untranslate(std::ptr::null()), 0);
    }

    #[test]
    fn test_translate_roundtrip() {
        let mem = Memory::initialise().unwrap();
        let addr = mem.alloc(MemoryKind::Application, 0x1000);
        assert_ne!(addr, 0);
        let host = mem.translate(addr);
        assert_eq!(mem.untranslate(host), addr);
    }

    #[test]
    fn test_typed_access_roundtrip() {
        let mem = Memory::initialise().unwrap();
        let addr = mem.alloc(MemoryKind::Application, 0x1000);

        mem.write::<u32>(addr, 0x1234_5678);
        assert_eq!(mem.read::<u32>(addr), 0x1234_5678);

        mem.write::<u64>(addr + 8, 0xDEAD_BEEF_CAFE_BABE);
        assert_eq!(mem.read::<u64>(addr + 8), 0xDEAD_BEEF_CAFE_BABE);

        mem.write::<u16>(addr + 16, 0xABCD);
        assert_eq!(mem.read::<u16>(addr + 16), 0xABCD);

        mem.write::<f64>(addr + 24, 2.718281828);
        assert_eq!(mem.read::<f64>(addr + 24), 2.718281828);
    }

    #[test]
    fn test_big_endian_storage() {
        let mem = Memory::initialise().unwrap();
        let addr = mem.alloc(MemoryKind::Application, 0x1000);

        mem.write::<u32>(addr, 0x1234_5678);
        assert_eq!(mem.read_bytes(addr, 4), vec![0x12, 0x34, 0x56, 0x78]);

        // No-swap access sees the raw storage order on a little-endian host
        if cfg!(target_endian = "little") {
            assert_eq!(mem.read_no_swap::<u32>(addr), 0x7856_3412);
        }
    }

    #[test]
    fn test_alloc_free_restores_page_table() {
        let mem = Memory::initialise().unwrap();
        let view = mem.view_by_kind(MemoryKind::MEM1).unwrap();
        let before = view.pages.read().clone();

        let addr = mem.alloc(MemoryKind::MEM1, 3 * MEM1_PAGE + 1);
        assert_ne!(addr, 0);
        assert!(mem.valid(addr));
        assert!(mem.valid(addr + 3 * MEM1_PAGE)); // rounded up to 4 pages

        assert!(mem.free(addr));
        assert_eq!(*view.pages.read(), before);
        assert!(!mem.valid(addr));
    }

    #[test]
    fn test_alloc_fixed() {
        let mem = Memory::initialise().unwrap();
        let addr = MEM1_BASE + 4 * MEM1_PAGE;

        assert!(mem.alloc_fixed(addr, MEM1_PAGE));
        // Overlapping fixed allocation fails
        assert!(!mem.alloc_fixed(addr, MEM1_PAGE));
        // Unaligned fails
        assert!(!mem.alloc_fixed(addr + 4, MEM1_PAGE));

        assert!(mem.free(addr));
        assert!(mem.alloc_fixed(addr, MEM1_PAGE));
    }

    #[test]
    fn test_free_by_interior_address() {
        let mem = Memory::initialise().unwrap();
        let addr = mem.alloc(MemoryKind::MEM1, 4 * MEM1_PAGE);
        assert_ne!(addr, 0);

        // Freeing through a non-base page releases the whole run
        assert!(mem.free(addr + 2 * MEM1_PAGE));
        assert!(!mem.valid(addr));
    }

    #[test]
    fn test_alloc_failure_returns_zero() {
        let mem = Memory::initialise().unwrap();
        // Larger than the whole MEM1 view
        assert_eq!(mem.alloc(MemoryKind::MEM1, MEM1_END - MEM1_BASE + 1), 0);
        assert_eq!(mem.alloc(MemoryKind::MEM1, 0), 0);
    }
}
