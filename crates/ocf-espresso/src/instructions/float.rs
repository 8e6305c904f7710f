//! Floating-point instructions
//!
//! IEEE-754 double arithmetic on the FPR double view. Single-precision
//! variants round the result to f32 with round-to-nearest-even. FPSCR is
//! maintained only to the architecturally observable extent.

use crate::instruction::Instruction;
use crate::interpreter::HandlerTable;
use crate::state::{Fpscr, ThreadState};
use crate::table::InstructionId;
use ocf_core::error::CpuError;

#[inline]
fn round_single(value: f64) -> f64 {
    value as f32 as f64
}

macro_rules! fp_binary {
    ($name:ident, |$a:ident, $b:ident| $expr:expr, $single:expr) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let $a = state.fpr[instr.fra()].value();
            let $b = state.fpr[instr.frb()].value();
            let result = $expr;
            let result = if $single { round_single(result) } else { result };
            state.fpr[instr.frd()].set_value(result);
            Ok(())
        }
    };
}

fp_binary!(fadd, |a, b| a + b, false);
fp_binary!(fadds, |a, b| a + b, true);
fp_binary!(fsub, |a, b| a - b, false);
fp_binary!(fsubs, |a, b| a - b, true);
fp_binary!(fdiv, |a, b| a / b, false);
fp_binary!(fdivs, |a, b| a / b, true);

macro_rules! fp_mul {
    ($name:ident, $single:expr) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let result = state.fpr[instr.fra()].value() * state.fpr[instr.frc()].value();
            let result = if $single { round_single(result) } else { result };
            state.fpr[instr.frd()].set_value(result);
            Ok(())
        }
    };
}

fp_mul!(fmul, false);
fp_mul!(fmuls, true);

macro_rules! fp_madd {
    ($name:ident, |$a:ident, $b:ident, $c:ident| $expr:expr, $single:expr) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let $a = state.fpr[instr.fra()].value();
            let $b = state.fpr[instr.frb()].value();
            let $c = state.fpr[instr.frc()].value();
            let result = $expr;
            let result = if $single { round_single(result) } else { result };
            state.fpr[instr.frd()].set_value(result);
            Ok(())
        }
    };
}

// The multiply-add family is fused on real hardware
fp_madd!(fmadd, |a, b, c| a.mul_add(c, b), false);
fp_madd!(fmadds, |a, b, c| a.mul_add(c, b), true);
fp_madd!(fmsub, |a, b, c| a.mul_add(c, -b), false);
fp_madd!(fmsubs, |a, b, c| a.mul_add(c, -b), true);
fp_madd!(fnmadd, |a, b, c| -a.mul_add(c, b), false);
fp_madd!(fnmadds, |a, b, c| -a.mul_add(c, b), true);
fp_madd!(fnmsub, |a, b, c| -a.mul_add(c, -b), false);
fp_madd!(fnmsubs, |a, b, c| -a.mul_add(c, -b), true);

fn fmr(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.fpr[instr.frd()] = state.fpr[instr.frb()];
    Ok(())
}

fn fneg(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let bits = state.fpr[instr.frb()].bits() ^ 0x8000_0000_0000_0000;
    state.fpr[instr.frd()] = crate::state::Fpr::from_bits(bits);
    Ok(())
}

fn fabs(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let bits = state.fpr[instr.frb()].bits() & !0x8000_0000_0000_0000;
    state.fpr[instr.frd()] = crate::state::Fpr::from_bits(bits);
    Ok(())
}

fn fnabs(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let bits = state.fpr[instr.frb()].bits() | 0x8000_0000_0000_0000;
    state.fpr[instr.frd()] = crate::state::Fpr::from_bits(bits);
    Ok(())
}

fn fsel(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.fpr[instr.fra()].value();
    let result = if a >= 0.0 {
        state.fpr[instr.frc()].value()
    } else {
        state.fpr[instr.frb()].value()
    };
    state.fpr[instr.frd()].set_value(result);
    Ok(())
}

fn fres(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = round_single(1.0 / state.fpr[instr.frb()].value());
    state.fpr[instr.frd()].set_value(result);
    Ok(())
}

fn frsqrte(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = 1.0 / state.fpr[instr.frb()].value().sqrt();
    state.fpr[instr.frd()].set_value(result);
    Ok(())
}

fn frsp(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = round_single(state.fpr[instr.frb()].value());
    state.fpr[instr.frd()].set_value(result);
    Ok(())
}

/// Convert to integer word; the result occupies the low word of the FPR
/// image with the high word holding the integer-conversion pattern.
fn fctiw_common(state: &mut ThreadState, instr: Instruction, value: f64) {
    let clamped = if value.is_nan() {
        i32::MIN
    } else if value >= i32::MAX as f64 {
        i32::MAX
    } else if value <= i32::MIN as f64 {
        i32::MIN
    } else {
        value as i32
    };
    let bits = 0xFFF8_0000_0000_0000u64 | clamped as u32 as u64;
    state.fpr[instr.frd()] = crate::state::Fpr::from_bits(bits);
}

fn fctiw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let value = state.fpr[instr.frb()].value().round_ties_even();
    fctiw_common(state, instr, value);
    Ok(())
}

fn fctiwz(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let value = state.fpr[instr.frb()].value().trunc();
    fctiw_common(state, instr, value);
    Ok(())
}

/// FP compares write {LT, GT, EQ, UN}; the fourth slot is the unordered
/// bit, not XER.SO.
fn fcmp_common(state: &mut ThreadState, instr: Instruction) {
    let a = state.fpr[instr.fra()].value();
    let b = state.fpr[instr.frb()].value();

    let field = if a.is_nan() || b.is_nan() {
        0b0001
    } else if a < b {
        0b1000
    } else if a > b {
        0b0100
    } else {
        0b0010
    };
    state.set_cr_field(instr.crfd(), field);
}

fn fcmpu(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    fcmp_common(state, instr);
    Ok(())
}

fn fcmpo(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.fpr[instr.fra()].value();
    let b = state.fpr[instr.frb()].value();
    if a.is_nan() || b.is_nan() {
        state.fpscr |= Fpscr::VX | Fpscr::VXSNAN;
    }
    fcmp_common(state, instr);
    Ok(())
}

fn mffs(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.fpr[instr.frd()] = crate::state::Fpr::from_bits(state.fpscr.bits() as u64);
    Ok(())
}

fn mtfsf(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let value = state.fpr[instr.frb()].bits() as u32;
    let fm = instr.fm();

    let mut mask = 0u32;
    for field in 0..8 {
        if fm & (0x80 >> field) != 0 {
            mask |= 0xF000_0000 >> (field * 4);
        }
    }

    let bits = (state.fpscr.bits() & !mask) | (value & mask);
    state.fpscr = Fpscr::from_bits_retain(bits);
    Ok(())
}

pub fn register(table: &mut HandlerTable) {
    use InstructionId as Id;

    table.register(Id::Fabs, fabs);
    table.register(Id::Fadd, fadd);
    table.register(Id::Fadds, fadds);
    table.register(Id::Fcmpo, fcmpo);
    table.register(Id::Fcmpu, fcmpu);
    table.register(Id::Fctiw, fctiw);
    table.register(Id::Fctiwz, fctiwz);
    table.register(Id::Fdiv, fdiv);
    table.register(Id::Fdivs, fdivs);
    table.register(Id::Fmadd, fmadd);
    table.register(Id::Fmadds, fmadds);
    table.register(Id::Fmr, fmr);
    table.register(Id::Fmsub, fmsub);
    table.register(Id::Fmsubs, fmsubs);
    table.register(Id::Fmul, fmul);
    table.register(Id::Fmuls, fmuls);
    table.register(Id::Fnabs, fnabs);
    table.register(Id::Fneg, fneg);
    table.register(Id::Fnmadd, fnmadd);
    table.register(Id::Fnmadds, fnmadds);
    table.register(Id::Fnmsub, fnmsub);
    table.register(Id::Fnmsubs, fnmsubs);
    table.register(Id::Fres, fres);
    table.register(Id::Frsp, frsp);
    table.register(Id::Frsqrte, frsqrte);
    table.register(Id::Fsel, fsel);
    table.register(Id::Fsub, fsub);
    table.register(Id::Fsubs, fsubs);
    table.register(Id::Mffs, mffs);
    table.register(Id::Mtfsf, mtfsf);
}
