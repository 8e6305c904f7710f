//! Cross-thread reservation break behaviour

use ocf_memory::{Memory, MemoryKind, ReservationRegistry, ThreadReservation};
use std::sync::Arc;
use std::thread;

#[test]
fn test_store_from_other_thread_breaks_reservation() {
    let mem = Memory::initialise().unwrap();
    let registry = ReservationRegistry::new();
    let addr = mem.alloc(MemoryKind::Application, 0x1000);

    let reservation = ThreadReservation::new();
    registry.reserve(1, addr, &reservation);
    assert!(reservation.matches(addr));

    let mem2 = Arc::clone(&mem);
    let registry2 = Arc::clone(&registry);
    thread::spawn(move || {
        mem2.write::<u32>(addr, 0xFFFF_FFFF);
        registry2.notify_store(2, addr, 4);
    })
    .join()
    .unwrap();

    // Thread 1's subsequent conditional store must observe the break
    assert!(!reservation.matches(addr));
}

#[test]
fn test_reservation_survives_unrelated_store() {
    let mem = Memory::initialise().unwrap();
    let registry = ReservationRegistry::new();
    let addr = mem.alloc(MemoryKind::Application, 0x1000);
    let other = addr + 0x800;

    let reservation = ThreadReservation::new();
    registry.reserve(1, addr, &reservation);

    registry.notify_store(2, other, 4);
    assert!(reservation.matches(addr));
}

#[test]
fn test_many_threads_hammering_one_line() {
    let registry = ReservationRegistry::new();
    let addr = 0x0200_0000u32;

    let mut handles = Vec::new();
    for t in 0..8u64 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            let reservation = ThreadReservation::new();
            for _ in 0..100 {
                registry.reserve(t, addr, &reservation);
                registry.notify_store(t, addr, 4);
            }
            registry.release(t);
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Registry is coherent afterwards: a fresh reservation holds until
    // somebody else stores.
    let reservation = ThreadReservation::new();
    registry.reserve(100, addr, &reservation);
    assert!(reservation.matches(addr));
    registry.notify_store(101, addr, 4);
    assert!(!reservation.matches(addr));
}
