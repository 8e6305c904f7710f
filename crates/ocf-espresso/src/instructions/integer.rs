//! Integer arithmetic, logical, rotate and compare instructions
//!
//! All arithmetic is modulo 2^32. OE-form handlers update XER.OV/SO with
//! the signed-overflow definition; Rc-form handlers update CR0 from the
//! result.

use super::{set_compare_field, update_cr0};
use crate::instruction::Instruction;
use crate::interpreter::HandlerTable;
use crate::state::ThreadState;
use crate::table::InstructionId;
use ocf_core::bits::mask_from_mb_me;
use ocf_core::error::CpuError;

/// Three-way add with carry-out and signed-overflow detection
#[inline]
fn add_full(a: u32, b: u32, carry_in: u32) -> (u32, bool, bool) {
    let wide = a as u64 + b as u64 + carry_in as u64;
    let result = wide as u32;
    let carry = wide > u32::MAX as u64;
    let signed = a as i32 as i64 + b as i32 as i64 + carry_in as i64;
    let overflow = signed < i32::MIN as i64 || signed > i32::MAX as i64;
    (result, carry, overflow)
}

fn addi(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let base = if instr.ra() == 0 {
        0
    } else {
        state.gpr[instr.ra()]
    };
    state.gpr[instr.rd()] = base.wrapping_add(instr.simm() as u32);
    Ok(())
}

fn addis(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let base = if instr.ra() == 0 {
        0
    } else {
        state.gpr[instr.ra()]
    };
    state.gpr[instr.rd()] = base.wrapping_add((instr.simm() as u32) << 16);
    Ok(())
}

fn addic(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let (result, carry, _) = add_full(state.gpr[instr.ra()], instr.simm() as u32, 0);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    Ok(())
}

fn addic_rc(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    addic(state, instr)?;
    update_cr0(state, state.gpr[instr.rd()]);
    Ok(())
}

fn add(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let (result, _, overflow) = add_full(state.gpr[instr.ra()], state.gpr[instr.rb()], 0);
    state.gpr[instr.rd()] = result;
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn addc(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let (result, carry, overflow) = add_full(state.gpr[instr.ra()], state.gpr[instr.rb()], 0);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn adde(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let carry_in = state.xer_ca() as u32;
    let (result, carry, overflow) = add_full(state.gpr[instr.ra()], state.gpr[instr.rb()], carry_in);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn addme(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let carry_in = state.xer_ca() as u32;
    let (result, carry, overflow) = add_full(state.gpr[instr.ra()], 0xFFFF_FFFF, carry_in);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn addze(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let carry_in = state.xer_ca() as u32;
    let (result, carry, overflow) = add_full(state.gpr[instr.ra()], 0, carry_in);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn subf(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let (result, _, overflow) = add_full(!state.gpr[instr.ra()], state.gpr[instr.rb()], 1);
    state.gpr[instr.rd()] = result;
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn subfc(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let (result, carry, overflow) = add_full(!state.gpr[instr.ra()], state.gpr[instr.rb()], 1);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn subfe(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let carry_in = state.xer_ca() as u32;
    let (result, carry, overflow) = add_full(!state.gpr[instr.ra()], state.gpr[instr.rb()], carry_in);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn subfic(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let (result, carry, _) = add_full(!state.gpr[instr.ra()], instr.simm() as u32, 1);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    Ok(())
}

fn subfme(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let carry_in = state.xer_ca() as u32;
    let (result, carry, overflow) = add_full(!state.gpr[instr.ra()], 0xFFFF_FFFF, carry_in);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn subfze(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let carry_in = state.xer_ca() as u32;
    let (result, carry, overflow) = add_full(!state.gpr[instr.ra()], 0, carry_in);
    state.gpr[instr.rd()] = result;
    state.set_xer_ca(carry);
    if instr.oe() {
        state.set_xer_ov(overflow);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn neg(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()];
    let result = (!a).wrapping_add(1);
    state.gpr[instr.rd()] = result;
    if instr.oe() {
        state.set_xer_ov(a == 0x8000_0000);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn mulli(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.gpr[instr.rd()] =
        (state.gpr[instr.ra()] as i32).wrapping_mul(instr.simm()) as u32;
    Ok(())
}

fn mullw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()] as i32 as i64;
    let b = state.gpr[instr.rb()] as i32 as i64;
    let product = a * b;
    let result = product as u32;
    state.gpr[instr.rd()] = result;
    if instr.oe() {
        state.set_xer_ov(product < i32::MIN as i64 || product > i32::MAX as i64);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn mulhw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()] as i32 as i64;
    let b = state.gpr[instr.rb()] as i32 as i64;
    let result = ((a * b) >> 32) as u32;
    state.gpr[instr.rd()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn mulhwu(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()] as u64;
    let b = state.gpr[instr.rb()] as u64;
    let result = ((a * b) >> 32) as u32;
    state.gpr[instr.rd()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn divw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()] as i32;
    let b = state.gpr[instr.rb()] as i32;

    let invalid = b == 0 || (a == i32::MIN && b == -1);
    let result = if invalid { 0 } else { (a / b) as u32 };

    state.gpr[instr.rd()] = result;
    if instr.oe() {
        state.set_xer_ov(invalid);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn divwu(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()];
    let b = state.gpr[instr.rb()];

    let invalid = b == 0;
    let result = if invalid { 0 } else { a / b };

    state.gpr[instr.rd()] = result;
    if instr.oe() {
        state.set_xer_ov(invalid);
    }
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

// --- logical ------------------------------------------------------------

macro_rules! logical_x {
    ($name:ident, |$s:ident, $b:ident| $expr:expr) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let $s = state.gpr[instr.rs()];
            let $b = state.gpr[instr.rb()];
            let result = $expr;
            state.gpr[instr.ra()] = result;
            if instr.rc() {
                update_cr0(state, result);
            }
            Ok(())
        }
    };
}

logical_x!(and, |s, b| s & b);
logical_x!(andc, |s, b| s & !b);
logical_x!(or, |s, b| s | b);
logical_x!(orc, |s, b| s | !b);
logical_x!(xor, |s, b| s ^ b);
logical_x!(nand, |s, b| !(s & b));
logical_x!(nor, |s, b| !(s | b));
logical_x!(eqv, |s, b| !(s ^ b));

fn andi_rc(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = state.gpr[instr.rs()] & instr.uimm();
    state.gpr[instr.ra()] = result;
    update_cr0(state, result);
    Ok(())
}

fn andis_rc(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = state.gpr[instr.rs()] & (instr.uimm() << 16);
    state.gpr[instr.ra()] = result;
    update_cr0(state, result);
    Ok(())
}

fn ori(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.gpr[instr.ra()] = state.gpr[instr.rs()] | instr.uimm();
    Ok(())
}

fn oris(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.gpr[instr.ra()] = state.gpr[instr.rs()] | (instr.uimm() << 16);
    Ok(())
}

fn xori(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.gpr[instr.ra()] = state.gpr[instr.rs()] ^ instr.uimm();
    Ok(())
}

fn xoris(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.gpr[instr.ra()] = state.gpr[instr.rs()] ^ (instr.uimm() << 16);
    Ok(())
}

fn extsb(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = state.gpr[instr.rs()] as i8 as i32 as u32;
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn extsh(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = state.gpr[instr.rs()] as i16 as i32 as u32;
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn cntlzw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let result = state.gpr[instr.rs()].leading_zeros();
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

// --- rotate and shift ---------------------------------------------------

fn rlwimi(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let rotated = state.gpr[instr.rs()].rotate_left(instr.sh());
    let mask = mask_from_mb_me(instr.mb(), instr.me());
    let result = (rotated & mask) | (state.gpr[instr.ra()] & !mask);
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn rlwinm(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let rotated = state.gpr[instr.rs()].rotate_left(instr.sh());
    let result = rotated & mask_from_mb_me(instr.mb(), instr.me());
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn rlwnm(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let rotated = state.gpr[instr.rs()].rotate_left(state.gpr[instr.rb()] & 0x1F);
    let result = rotated & mask_from_mb_me(instr.mb(), instr.me());
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn slw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let sh = state.gpr[instr.rb()] & 0x3F;
    let result = if sh > 31 {
        0
    } else {
        state.gpr[instr.rs()] << sh
    };
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn srw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let sh = state.gpr[instr.rb()] & 0x3F;
    let result = if sh > 31 {
        0
    } else {
        state.gpr[instr.rs()] >> sh
    };
    state.gpr[instr.ra()] = result;
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

/// Arithmetic right shift; CA is set when a negative value shifts out
/// one bits.
fn sraw_common(state: &mut ThreadState, instr: Instruction, sh: u32) -> Result<(), CpuError> {
    let value = state.gpr[instr.rs()] as i32;

    let (result, carry) = if sh > 31 {
        let result = if value < 0 { 0xFFFF_FFFF } else { 0 };
        (result, value < 0 && value != 0)
    } else {
        let shifted_out = if sh == 0 {
            0
        } else {
            value as u32 & ((1u32 << sh) - 1)
        };
        ((value >> sh) as u32, value < 0 && shifted_out != 0)
    };

    state.gpr[instr.ra()] = result;
    state.set_xer_ca(carry);
    if instr.rc() {
        update_cr0(state, result);
    }
    Ok(())
}

fn sraw(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let sh = state.gpr[instr.rb()] & 0x3F;
    sraw_common(state, instr, sh)
}

fn srawi(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    sraw_common(state, instr, instr.sh())
}

// --- compare ------------------------------------------------------------

fn cmp(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()] as i32;
    let b = state.gpr[instr.rb()] as i32;
    set_compare_field(state, instr.crfd(), a < b, a > b, a == b);
    Ok(())
}

fn cmpi(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()] as i32;
    let b = instr.simm();
    set_compare_field(state, instr.crfd(), a < b, a > b, a == b);
    Ok(())
}

fn cmpl(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()];
    let b = state.gpr[instr.rb()];
    set_compare_field(state, instr.crfd(), a < b, a > b, a == b);
    Ok(())
}

fn cmpli(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.gpr[instr.ra()];
    let b = instr.uimm();
    set_compare_field(state, instr.crfd(), a < b, a > b, a == b);
    Ok(())
}

pub fn register(table: &mut HandlerTable) {
    use InstructionId as Id;

    table.register(Id::Add, add);
    table.register(Id::Addc, addc);
    table.register(Id::Adde, adde);
    table.register(Id::Addi, addi);
    table.register(Id::Addic, addic);
    table.register(Id::AddicRc, addic_rc);
    table.register(Id::Addis, addis);
    table.register(Id::Addme, addme);
    table.register(Id::Addze, addze);
    table.register(Id::Divw, divw);
    table.register(Id::Divwu, divwu);
    table.register(Id::Mulhw, mulhw);
    table.register(Id::Mulhwu, mulhwu);
    table.register(Id::Mulli, mulli);
    table.register(Id::Mullw, mullw);
    table.register(Id::Neg, neg);
    table.register(Id::Subf, subf);
    table.register(Id::Subfc, subfc);
    table.register(Id::Subfe, subfe);
    table.register(Id::Subfic, subfic);
    table.register(Id::Subfme, subfme);
    table.register(Id::Subfze, subfze);

    table.register(Id::And, and);
    table.register(Id::Andc, andc);
    table.register(Id::AndiRc, andi_rc);
    table.register(Id::AndisRc, andis_rc);
    table.register(Id::Cntlzw, cntlzw);
    table.register(Id::Eqv, eqv);
    table.register(Id::Extsb, extsb);
    table.register(Id::Extsh, extsh);
    table.register(Id::Nand, nand);
    table.register(Id::Nor, nor);
    table.register(Id::Or, or);
    table.register(Id::Orc, orc);
    table.register(Id::Ori, ori);
    table.register(Id::Oris, oris);
    table.register(Id::Xor, xor);
    table.register(Id::Xori, xori);
    table.register(Id::Xoris, xoris);

    table.register(Id::Rlwimi, rlwimi);
    table.register(Id::Rlwinm, rlwinm);
    table.register(Id::Rlwnm, rlwnm);
    table.register(Id::Slw, slw);
    table.register(Id::Sraw, sraw);
    table.register(Id::Srawi, srawi);
    table.register(Id::Srw, srw);

    table.register(Id::Cmp, cmp);
    table.register(Id::Cmpi, cmpi);
    table.register(Id::Cmpl, cmpl);
    table.register(Id::Cmpli, cmpli);
}
