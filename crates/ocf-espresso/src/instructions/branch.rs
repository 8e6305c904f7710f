//! Branch instructions
//!
//! Handlers signal a taken branch by writing the target to `nia`; the
//! loop pre-sets `nia = cia + 4`. A branch to the callback sentinel
//! address terminates the interpreter loop.

use crate::instruction::Instruction;
use crate::interpreter::HandlerTable;
use crate::state::ThreadState;
use crate::table::InstructionId;
use ocf_core::error::CpuError;

/// Evaluate the BO/BI condition, decrementing CTR when BO asks for it.
fn condition_met(state: &mut ThreadState, bo: u32, bi: u32) -> bool {
    let ctr_ok = if bo & 0b00100 != 0 {
        true
    } else {
        state.ctr = state.ctr.wrapping_sub(1);
        (state.ctr == 0) == (bo & 0b00010 != 0)
    };

    let cond_ok = if bo & 0b10000 != 0 {
        true
    } else {
        state.cr_bit(bi) == (bo >> 3) & 1
    };

    ctr_ok && cond_ok
}

fn b(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let target = if instr.aa() {
        instr.li() as u32
    } else {
        state.cia.wrapping_add(instr.li() as u32)
    };

    if instr.lk() {
        state.lr = state.cia.wrapping_add(4);
    }

    state.nia = target;
    Ok(())
}

fn bc(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    if condition_met(state, instr.bo(), instr.bi()) {
        if instr.lk() {
            state.lr = state.cia.wrapping_add(4);
        }
        state.nia = if instr.aa() {
            instr.bd() as u32
        } else {
            state.cia.wrapping_add(instr.bd() as u32)
        };
    } else if instr.lk() {
        state.lr = state.cia.wrapping_add(4);
    }
    Ok(())
}

fn bclr(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    // Read the target before LK clobbers LR
    let target = state.lr & !3;
    if condition_met(state, instr.bo(), instr.bi()) {
        if instr.lk() {
            state.lr = state.cia.wrapping_add(4);
        }
        state.nia = target;
    } else if instr.lk() {
        state.lr = state.cia.wrapping_add(4);
    }
    Ok(())
}

fn bcctr(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    // bcctr never decrements CTR; only the CR condition applies
    let bo = instr.bo();
    let cond_ok = bo & 0b10000 != 0 || state.cr_bit(instr.bi()) == (bo >> 3) & 1;

    if cond_ok {
        if instr.lk() {
            state.lr = state.cia.wrapping_add(4);
        }
        state.nia = state.ctr & !3;
    } else if instr.lk() {
        state.lr = state.cia.wrapping_add(4);
    }
    Ok(())
}

pub fn register(table: &mut HandlerTable) {
    table.register(InstructionId::B, b);
    table.register(InstructionId::Bc, bc);
    table.register(InstructionId::Bclr, bclr);
    table.register(InstructionId::Bcctr, bcctr);
}
