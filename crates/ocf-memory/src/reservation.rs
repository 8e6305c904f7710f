//! Load-reserved / store-conditional support
//!
//! Each guest thread owns one reservation (lwarx sets it, stwcx. consumes
//! it). Reservations are tracked process-wide at cache-line granularity so
//! that a store by any thread breaks every other thread's reservation on
//! that line.

use crate::constants::CACHE_LINE;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// A single guest thread's reservation state
#[derive(Debug, Default)]
pub struct ThreadReservation {
    active: AtomicBool,
    addr: AtomicU32,
}

impl ThreadReservation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Establish a reservation on `addr`
    pub fn set(&self, addr: u32) {
        self.addr.store(addr, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Drop the reservation
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Is the reservation still held for `addr`?
    pub fn matches(&self, addr: u32) -> bool {
        self.active.load(Ordering::Acquire) && self.addr.load(Ordering::Relaxed) == addr
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn address(&self) -> u32 {
        self.addr.load(Ordering::Relaxed)
    }
}

/// Process-wide registry of thread reservations, keyed by cache line.
///
/// Kept out of the typed read/write hot path; store handlers notify it
/// explicitly.
#[derive(Default)]
pub struct ReservationRegistry {
    lines: Mutex<HashMap<u32, Vec<(u64, Arc<ThreadReservation>)>>>,
}

impl ReservationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline]
    fn line_of(addr: u32) -> u32 {
        addr / CACHE_LINE
    }

    /// Record `thread`'s reservation on the line containing `addr`.
    ///
    /// Any previous reservation by the same thread is replaced.
    pub fn reserve(&self, thread: u64, addr: u32, reservation: &Arc<ThreadReservation>) {
        let mut lines = self.lines.lock();

        // A thread holds at most one reservation
        for entries in lines.values_mut() {
            entries.retain(|(id, _)| *id != thread);
        }
        lines.retain(|_, entries| !entries.is_empty());

        reservation.set(addr);
        lines
            .entry(Self::line_of(addr))
            .or_default()
            .push((thread, Arc::clone(reservation)));
    }

    /// Drop `thread`'s reservation, if any.
    pub fn release(&self, thread: u64) {
        let mut lines = self.lines.lock();
        for entries in lines.values_mut() {
            for (id, reservation) in entries.iter() {
                if *id == thread {
                    reservation.clear();
                }
            }
            entries.retain(|(id, _)| *id != thread);
        }
        lines.retain(|_, entries| !entries.is_empty());
    }

    /// A store of `len` bytes at `addr` happened; break every reservation
    /// on the touched cache lines, except `storing_thread`'s own.
    pub fn notify_store(&self, storing_thread: u64, addr: u32, len: u32) {
        let first = Self::line_of(addr);
        let last = Self::line_of(addr + len.saturating_sub(1));

        let mut lines = self.lines.lock();
        for line in first..=last {
            if let Some(entries) = lines.get_mut(&line) {
                for (id, reservation) in entries.iter() {
                    if *id != storing_thread {
                        reservation.clear();
                    }
                }
                entries.retain(|(id, _)| *id == storing_thread);
                if entries.is_empty() {
                    lines.remove(&line);
                }
            }
        }
    }
}
