//! Guest memory for the oxidized-cafe Wii U emulator
//!
//! This crate provides the emulated 32-bit guest address space: a reserved
//! 4 GiB host window holding the fixed set of memory views, a page-run
//! allocator per view, endian-aware typed access, big-endian value and
//! guest pointer wrappers, and the reservation registry backing
//! lwarx/stwcx. semantics across threads.

pub mod bigval;
pub mod bytes;
pub mod constants;
pub mod manager;
pub mod ptr;
pub mod reservation;
pub mod view;

pub use bigval::BeVal;
pub use bytes::{byte_swap, Primitive};
pub use constants::*;
pub use manager::Memory;
pub use ptr::{BePtr, BigEndian, Endianness, GuestPtr, NativeEndian};
pub use reservation::{ReservationRegistry, ThreadReservation};
pub use view::{MemoryKind, MemoryView, PageEntry};
