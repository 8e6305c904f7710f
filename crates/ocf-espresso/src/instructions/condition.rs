//! Condition register logical operations and CR moves

use crate::instruction::Instruction;
use crate::interpreter::HandlerTable;
use crate::state::ThreadState;
use crate::table::InstructionId;
use ocf_core::error::CpuError;

macro_rules! cr_logical {
    ($name:ident, |$a:ident, $b:ident| $expr:expr) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let $a = state.cr_bit(instr.crba());
            let $b = state.cr_bit(instr.crbb());
            state.set_cr_bit(instr.crbd(), $expr & 1);
            Ok(())
        }
    };
}

cr_logical!(crand, |a, b| a & b);
cr_logical!(crandc, |a, b| a & !b);
cr_logical!(creqv, |a, b| !(a ^ b));
cr_logical!(crnand, |a, b| !(a & b));
cr_logical!(crnor, |a, b| !(a | b));
cr_logical!(cror, |a, b| a | b);
cr_logical!(crorc, |a, b| a | !b);
cr_logical!(crxor, |a, b| a ^ b);

fn mcrf(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let value = state.cr_field(instr.crfs());
    state.set_cr_field(instr.crfd(), value);
    Ok(())
}

fn mfcr(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.gpr[instr.rd()] = state.cr;
    Ok(())
}

fn mtcrf(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let value = state.gpr[instr.rs()];
    let crm = instr.crm();

    for field in 0..8 {
        // CRM bit 0 (MSB of the mask) selects CR0
        if crm & (0x80 >> field) != 0 {
            state.set_cr_field(field, value >> (28 - field as u32 * 4));
        }
    }
    Ok(())
}

pub fn register(table: &mut HandlerTable) {
    table.register(InstructionId::Crand, crand);
    table.register(InstructionId::Crandc, crandc);
    table.register(InstructionId::Creqv, creqv);
    table.register(InstructionId::Crnand, crnand);
    table.register(InstructionId::Crnor, crnor);
    table.register(InstructionId::Cror, cror);
    table.register(InstructionId::Crorc, crorc);
    table.register(InstructionId::Crxor, crxor);
    table.register(InstructionId::Mcrf, mcrf);
    table.register(InstructionId::Mfcr, mfcr);
    table.register(InstructionId::Mtcrf, mtcrf);
}
