//! Architectural thread state
//!
//! One `ThreadState` per guest thread; one host thread drives it. The
//! process-wide services (guest memory, syscall table, reservation
//! registry) are injected at construction rather than reached through
//! globals.

use crate::syscalls::SyscallTable;
use bitflags::bitflags;
use ocf_memory::{Memory, ReservationRegistry, ThreadReservation};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A floating-point register: a 64-bit double and a paired-single view
/// sharing the same storage.
///
/// Marshalling rule: ps0 occupies the low 32 bits, ps1 the high 32 bits.
/// The double and the pair alias; whichever was written last defines the
/// contents, as on the original hardware's register file image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fpr(u64);

impl Fpr {
    /// Raw 64-bit storage
    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The double view
    #[inline]
    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }

    #[inline]
    pub fn set_value(&mut self, value: f64) {
        self.0 = value.to_bits();
    }

    /// Paired-single slot 0 (low word)
    #[inline]
    pub fn ps0(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    /// Paired-single slot 1 (high word)
    #[inline]
    pub fn ps1(self) -> f32 {
        f32::from_bits((self.0 >> 32) as u32)
    }

    #[inline]
    pub fn set_ps0(&mut self, value: f32) {
        self.0 = (self.0 & 0xFFFF_FFFF_0000_0000) | value.to_bits() as u64;
    }

    #[inline]
    pub fn set_ps1(&mut self, value: f32) {
        self.0 = (self.0 & 0x0000_0000_FFFF_FFFF) | ((value.to_bits() as u64) << 32);
    }

    /// Set both paired slots at once
    #[inline]
    pub fn set_pair(&mut self, ps0: f32, ps1: f32) {
        self.0 = ps0.to_bits() as u64 | ((ps1.to_bits() as u64) << 32);
    }
}

bitflags! {
    /// Floating-point status and control register.
    ///
    /// Only the architecturally observable subset is maintained.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Fpscr: u32 {
        const FX     = 0x8000_0000;
        const FEX    = 0x4000_0000;
        const VX     = 0x2000_0000;
        const OX     = 0x1000_0000;
        const UX     = 0x0800_0000;
        const ZX     = 0x0400_0000;
        const XX     = 0x0200_0000;
        const VXSNAN = 0x0100_0000;
        const VXISI  = 0x0080_0000;
        const VXIDI  = 0x0040_0000;
        const VXZDZ  = 0x0020_0000;
        const VXIMZ  = 0x0010_0000;
        const VXVC   = 0x0008_0000;
        const FR     = 0x0004_0000;
        const FI     = 0x0002_0000;
        /// Result flags field (FPRF)
        const FPRF   = 0x0001_F000;
        /// Rounding mode field
        const RN     = 0x0000_0003;
    }
}

/// XER bit positions
pub mod xer {
    pub const SO: u32 = 0x8000_0000;
    pub const OV: u32 = 0x4000_0000;
    pub const CA: u32 = 0x2000_0000;
    pub const BYTE_COUNT: u32 = 0x0000_007F;
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Architectural state of one guest thread
pub struct ThreadState {
    /// Thread id used by the reservation registry
    pub id: u64,
    /// General purpose registers
    pub gpr: [u32; 32],
    /// Floating point registers (double + paired-single views)
    pub fpr: [Fpr; 32],
    /// Condition register, CR0..CR7 packed MSB first
    pub cr: u32,
    /// Fixed-point exception register
    pub xer: u32,
    /// Link register
    pub lr: u32,
    /// Count register
    pub ctr: u32,
    /// Graphics quantization registers
    pub gqr: [u32; 8],
    /// Floating-point status and control register
    pub fpscr: Fpscr,
    /// Current instruction address
    pub cia: u32,
    /// Next instruction address
    pub nia: u32,

    reservation: Arc<ThreadReservation>,
    registry: Arc<ReservationRegistry>,
    memory: Arc<Memory>,
    syscalls: Arc<SyscallTable>,
}

impl ThreadState {
    pub fn new(
        memory: Arc<Memory>,
        syscalls: Arc<SyscallTable>,
        registry: Arc<ReservationRegistry>,
    ) -> Self {
        Self {
            id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
            gpr: [0; 32],
            fpr: [Fpr::default(); 32],
            cr: 0,
            xer: 0,
            lr: 0,
            ctr: 0,
            gqr: [0; 8],
            fpscr: Fpscr::default(),
            cia: 0,
            nia: 0,
            reservation: ThreadReservation::new(),
            registry,
            memory,
            syscalls,
        }
    }

    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    pub fn syscalls(&self) -> &Arc<SyscallTable> {
        &self.syscalls
    }

    // --- reservation protocol -------------------------------------------

    /// lwarx: establish a reservation on `addr`
    pub fn set_reservation(&self, addr: u32) {
        self.registry.reserve(self.id, addr, &self.reservation);
    }

    /// Is this thread's reservation still held for `addr`?
    pub fn reservation_matches(&self, addr: u32) -> bool {
        self.reservation.matches(addr)
    }

    pub fn reservation_active(&self) -> bool {
        self.reservation.is_active()
    }

    pub fn reservation_address(&self) -> u32 {
        self.reservation.address()
    }

    /// Drop this thread's reservation (stwcx. epilogue, context switch)
    pub fn clear_reservation(&self) {
        self.reservation.clear();
        self.registry.release(self.id);
    }

    /// A store this thread performed; breaks other threads' reservations
    pub fn notify_store(&self, addr: u32, len: u32) {
        self.registry.notify_store(self.id, addr, len);
    }

    // --- condition register ---------------------------------------------

    /// Read CR field `field` (0..7) as a 4-bit nibble {LT, GT, EQ, SO}
    #[inline]
    pub fn cr_field(&self, field: usize) -> u32 {
        (self.cr >> (28 - field * 4)) & 0xF
    }

    /// Write CR field `field`
    #[inline]
    pub fn set_cr_field(&mut self, field: usize, value: u32) {
        let shift = 28 - field * 4;
        self.cr = (self.cr & !(0xF << shift)) | ((value & 0xF) << shift);
    }

    /// Read CR bit `bit` (0 = MSB)
    #[inline]
    pub fn cr_bit(&self, bit: u32) -> u32 {
        (self.cr >> (31 - bit)) & 1
    }

    /// Write CR bit `bit`
    #[inline]
    pub fn set_cr_bit(&mut self, bit: u32, value: u32) {
        let shift = 31 - bit;
        self.cr = (self.cr & !(1 << shift)) | ((value & 1) << shift);
    }

    // --- XER -------------------------------------------------------------

    #[inline]
    pub fn xer_so(&self) -> bool {
        self.xer & xer::SO != 0
    }

    #[inline]
    pub fn xer_ov(&self) -> bool {
        self.xer & xer::OV != 0
    }

    #[inline]
    pub fn xer_ca(&self) -> bool {
        self.xer & xer::CA != 0
    }

    #[inline]
    pub fn set_xer_ca(&mut self, value: bool) {
        if value {
            self.xer |= xer::CA;
        } else {
            self.xer &= !xer::CA;
        }
    }

    /// Set or clear OV; setting it also sets the sticky SO bit
    #[inline]
    pub fn set_xer_ov(&mut self, value: bool) {
        if value {
            self.xer |= xer::OV | xer::SO;
        } else {
            self.xer &= !xer::OV;
        }
    }

    // --- compliance support ---------------------------------------------

    /// Deep copy for the compliance shadow run.
    ///
    /// Registers are copied; the shadow gets its own thread id and its
    /// own reservation record (initialised to the live one's values) so
    /// a shadow stwcx. observes the same pre-instruction state without
    /// displacing the live thread's registry entry. The process services
    /// are shared.
    pub fn snapshot(&self) -> ThreadState {
        let reservation = ThreadReservation::new();
        if self.reservation.is_active() {
            reservation.set(self.reservation.address());
        }

        ThreadState {
            id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
            gpr: self.gpr,
            fpr: self.fpr,
            cr: self.cr,
            xer: self.xer,
            lr: self.lr,
            ctr: self.ctr,
            gqr: self.gqr,
            fpscr: self.fpscr,
            cia: self.cia,
            nia: self.nia,
            reservation,
            registry: Arc::clone(&self.registry),
            memory: Arc::clone(&self.memory),
            syscalls: Arc::clone(&self.syscalls),
        }
    }
}
