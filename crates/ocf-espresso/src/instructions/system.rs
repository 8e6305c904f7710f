//! System instructions
//!
//! Memory barriers are no-ops: within one guest thread instructions
//! retire in program order, and the host's memory ordering is stronger
//! than what sync/eieio demand. Cache control is architecturally
//! observed as a no-op except dcbz, which zeroes the cache line.

use crate::instruction::Instruction;
use crate::interpreter::HandlerTable;
use crate::state::ThreadState;
use crate::table::{decode_spr, spr, InstructionId};
use ocf_core::error::CpuError;
use ocf_memory::CACHE_LINE;
use once_cell::sync::Lazy;
use std::time::Instant;
use tracing::{trace, warn};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Time base ticks since process start (one tick per nanosecond)
pub fn time_base() -> u64 {
    EPOCH.elapsed().as_nanos() as u64
}

fn nop(_state: &mut ThreadState, _instr: Instruction) -> Result<(), CpuError> {
    Ok(())
}

/// Read a special purpose register by architectural number
pub fn read_spr(state: &mut ThreadState, number: u32) -> u32 {
    match number {
        spr::XER => state.xer,
        spr::LR => state.lr,
        spr::CTR => state.ctr,
        spr::GQR0..=spr::GQR7 => state.gqr[(number - spr::GQR0) as usize],
        _ => {
            warn!("mfspr from unhandled SPR {}", number);
            0
        }
    }
}

/// Write a special purpose register by architectural number
pub fn write_spr(state: &mut ThreadState, number: u32, value: u32) {
    match number {
        spr::XER => state.xer = value,
        spr::LR => state.lr = value,
        spr::CTR => state.ctr = value,
        spr::GQR0..=spr::GQR7 => state.gqr[(number - spr::GQR0) as usize] = value,
        _ => warn!("mtspr to unhandled SPR {} dropped (value 0x{:08x})", number, value),
    }
}

fn mfspr(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let number = decode_spr(instr);
    state.gpr[instr.rd()] = read_spr(state, number);
    Ok(())
}

fn mtspr(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let number = decode_spr(instr);
    let value = state.gpr[instr.rs()];
    write_spr(state, number, value);
    Ok(())
}

fn mftb(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let tb = time_base();
    let value = match decode_spr(instr) {
        spr::TBL => tb as u32,
        spr::TBU => (tb >> 32) as u32,
        other => {
            warn!("mftb from unhandled TBR {}", other);
            0
        }
    };
    state.gpr[instr.rd()] = value;
    Ok(())
}

/// dcbz zeroes the cache line containing the effective address
fn dcbz(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let base = if instr.ra() == 0 {
        0
    } else {
        state.gpr[instr.ra()]
    };
    let ea = base.wrapping_add(state.gpr[instr.rb()]) & !(CACHE_LINE - 1);
    state.memory().zero(ea, CACHE_LINE as usize);
    state.notify_store(ea, CACHE_LINE);
    Ok(())
}

/// Kernel call dispatch: `kcn` indexes the syscall table, `kci` flags an
/// implementation. An unimplemented call does not advance `nia`.
pub fn dispatch_kernel_call(state: &mut ThreadState, kcn: u32, kci: bool) -> Result<(), CpuError> {
    let entry = match state.syscalls().get(kcn) {
        Some(entry) => entry,
        None => {
            warn!("kernel call {} not in the syscall table", kcn);
            state.nia = state.cia;
            return Err(CpuError::UnimplementedSyscall {
                name: format!("kc#{}", kcn),
            });
        }
    };

    if !kci || !entry.implemented {
        warn!("unimplemented kernel function {}", entry.name);
        state.nia = state.cia;
        return Err(CpuError::UnimplementedSyscall { name: entry.name });
    }

    trace!("kernel call {}", entry.name);
    (entry.call)(state);
    Ok(())
}

fn kc(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    dispatch_kernel_call(state, instr.kcn(), instr.kci())
}

pub fn register(table: &mut HandlerTable) {
    use InstructionId as Id;

    table.register(Id::Sync, nop);
    table.register(Id::Isync, nop);
    table.register(Id::Eieio, nop);
    table.register(Id::Dcbf, nop);
    table.register(Id::Dcbi, nop);
    table.register(Id::Dcbst, nop);
    table.register(Id::Dcbt, nop);
    table.register(Id::Dcbtst, nop);
    table.register(Id::Icbi, nop);
    table.register(Id::Dcbz, dcbz);
    table.register(Id::DcbzL, dcbz);
    table.register(Id::Mfspr, mfspr);
    table.register(Id::Mtspr, mtspr);
    table.register(Id::Mftb, mftb);
    table.register(Id::Kc, kc);
}
