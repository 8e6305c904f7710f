//! PPC EABI argument marshalling
//!
//! Kernel functions read their arguments from `r3..r10` (integers and
//! pointers) and `f1..f13` (floats), and write their result to `r3`
//! (or `r3:r4` for 64-bit) or `f1`.

use ocf_espresso::ThreadState;
use ocf_memory::GuestPtr;

/// Sequential reader over a kernel call's argument registers
pub struct CallArgs<'a> {
    state: &'a ThreadState,
    next_gpr: usize,
    next_fpr: usize,
}

impl<'a> CallArgs<'a> {
    pub fn new(state: &'a ThreadState) -> Self {
        Self {
            state,
            next_gpr: 3,
            next_fpr: 1,
        }
    }

    /// Next integer argument
    pub fn u32(&mut self) -> u32 {
        let value = self.state.gpr[self.next_gpr];
        self.next_gpr += 1;
        value
    }

    pub fn i32(&mut self) -> i32 {
        self.u32() as i32
    }

    /// Next 64-bit integer argument (register pair, even-aligned)
    pub fn u64(&mut self) -> u64 {
        if self.next_gpr % 2 != 0 {
            self.next_gpr += 1;
        }
        let hi = self.u32() as u64;
        let lo = self.u32() as u64;
        (hi << 32) | lo
    }

    pub fn i64(&mut self) -> i64 {
        self.u64() as i64
    }

    /// Next pointer argument
    pub fn ptr<T>(&mut self) -> GuestPtr<T> {
        GuestPtr::from_addr(self.u32())
    }

    /// Next floating-point argument
    pub fn f64(&mut self) -> f64 {
        let value = self.state.fpr[self.next_fpr].value();
        self.next_fpr += 1;
        value
    }
}

/// Write a 32-bit result into r3
pub fn ret_u32(state: &mut ThreadState, value: u32) {
    state.gpr[3] = value;
}

/// Write a 64-bit result into r3:r4
pub fn ret_u64(state: &mut ThreadState, value: u64) {
    state.gpr[3] = (value >> 32) as u32;
    state.gpr[4] = value as u32;
}

pub fn ret_i64(state: &mut ThreadState, value: i64) {
    ret_u64(state, value as u64);
}

/// Write a floating-point result into f1
pub fn ret_f64(state: &mut ThreadState, value: f64) {
    state.fpr[1].set_value(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocf_espresso::SyscallTable;
    use ocf_memory::{Memory, ReservationRegistry};
    use std::sync::Arc;

    fn test_state() -> ThreadState {
        ThreadState::new(
            Memory::initialise().unwrap(),
            Arc::new(SyscallTable::new()),
            ReservationRegistry::new(),
        )
    }

    #[test]
    fn test_sequential_int_args() {
        let mut state = test_state();
        state.gpr[3] = 10;
        state.gpr[4] = 20;
        state.gpr[5] = 30;

        let mut args = CallArgs::new(&state);
        assert_eq!(args.u32(), 10);
        assert_eq!(args.u32(), 20);
        assert_eq!(args.u32(), 30);
    }

    #[test]
    fn test_u64_pair_alignment() {
        let mut state = test_state();
        state.gpr[3] = 1; // consumed as a lone u32
        state.gpr[4] = 0xDEAD_BEEF; // hi (r4:r5 after align)
        state.gpr[5] = 0xCAFE_BABE; // lo

        let mut args = CallArgs::new(&state);
        assert_eq!(args.u32(), 1);
        assert_eq!(args.u64(), 0xDEAD_BEEF_CAFE_BABE);
    }

    #[test]
    fn test_float_args_and_returns() {
        let mut state = test_state();
        state.fpr[1].set_value(1.5);
        state.fpr[2].set_value(2.5);

        let mut args = CallArgs::new(&state);
        assert_eq!(args.f64(), 1.5);
        assert_eq!(args.f64(), 2.5);

        ret_f64(&mut state, 9.0);
        assert_eq!(state.fpr[1].value(), 9.0);

        ret_u64(&mut state, 0x1122_3344_5566_7788);
        assert_eq!(state.gpr[3], 0x1122_3344);
        assert_eq!(state.gpr[4], 0x5566_7788);
    }
}
