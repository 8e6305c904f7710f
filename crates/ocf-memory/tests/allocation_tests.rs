//! Allocator behaviour across views and threads

use ocf_memory::{Memory, MemoryKind, APPLICATION_PAGE, MEM1_PAGE, SYSTEM_DATA_PAGE};
use std::sync::Arc;
use std::thread;

#[test]
fn test_alloc_rounds_to_view_page_size() {
    let mem = Memory::initialise().unwrap();

    let a = mem.alloc(MemoryKind::SystemData, 1);
    let b = mem.alloc(MemoryKind::SystemData, 1);
    assert_ne!(a, 0);
    assert_eq!(b, a + SYSTEM_DATA_PAGE);

    let c = mem.alloc(MemoryKind::Application, 1);
    let d = mem.alloc(MemoryKind::Application, 1);
    assert_eq!(d, c + APPLICATION_PAGE);
}

#[test]
fn test_freed_range_is_reused() {
    let mem = Memory::initialise().unwrap();

    let a = mem.alloc(MemoryKind::MEM1, 2 * MEM1_PAGE);
    let b = mem.alloc(MemoryKind::MEM1, MEM1_PAGE);
    assert_ne!(a, 0);
    assert_ne!(b, 0);

    assert!(mem.free(a));
    let c = mem.alloc(MemoryKind::MEM1, MEM1_PAGE);
    assert_eq!(c, a); // first-fit scan lands back on the freed run
}

#[test]
fn test_view_exhaustion() {
    let mem = Memory::initialise().unwrap();

    // MEM1 is 32 MiB; grab it all, then one more page must fail.
    let all = mem.alloc(MemoryKind::MEM1, 0x0200_0000);
    assert_ne!(all, 0);
    assert_eq!(mem.alloc(MemoryKind::MEM1, MEM1_PAGE), 0);

    assert!(mem.free(all));
    assert_ne!(mem.alloc(MemoryKind::MEM1, MEM1_PAGE), 0);
}

#[test]
fn test_concurrent_disjoint_allocations() {
    let mem = Memory::initialise().unwrap();
    let mut handles = Vec::new();

    for t in 0..8u32 {
        let mem = Arc::clone(&mem);
        handles.push(thread::spawn(move || {
            let mut addrs = Vec::new();
            for i in 0..16u32 {
                let addr = mem.alloc(MemoryKind::Application, APPLICATION_PAGE);
                assert_ne!(addr, 0);
                // Scribble a thread-unique pattern over the allocation
                mem.write::<u32>(addr, t << 16 | i);
                addrs.push(addr);
            }
            for (i, &addr) in addrs.iter().enumerate() {
                assert_eq!(mem.read::<u32>(addr), t << 16 | i as u32);
                assert!(mem.free(addr));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Every page released again
    let probe = mem.alloc(MemoryKind::Application, APPLICATION_PAGE);
    assert_ne!(probe, 0);
}

#[test]
fn test_valid_tracks_allocation() {
    let mem = Memory::initialise().unwrap();

    assert!(!mem.valid(0));
    assert!(!mem.valid(0xFBAD_CDE0)); // callback sentinel is never mapped

    let addr = mem.alloc(MemoryKind::Foreground, 1);
    assert!(mem.valid(addr));
    assert!(mem.free(addr));
    assert!(!mem.valid(addr));
}
