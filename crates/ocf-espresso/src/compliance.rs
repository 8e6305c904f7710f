//! Interpreter/JIT compliance mode
//!
//! For each instruction: snapshot the architectural state (and any
//! reserved memory word), execute on the live state through the
//! interpreter, restore the reserved word, execute the same instruction
//! on the shadow state through a one-instruction JIT block, then compare
//! the two post-states field by field. The interpreter is ground truth;
//! any divergence halts with a report. Kernel calls are excluded — they
//! are not stateless, so double execution would be wrong.

use crate::instruction::Instruction;
use crate::interpreter::HandlerTable;
use crate::jit::JitManager;
use crate::state::ThreadState;
use crate::table::{InstructionData, InstructionId};
use ocf_core::error::CpuError;
use std::fmt::Write as _;
use tracing::warn;

/// One diverging field
#[derive(Debug, Clone)]
pub struct FieldDiff {
    pub field: String,
    pub interp: String,
    pub jit: String,
}

/// Everything that differed after one instruction
#[derive(Debug, Clone)]
pub struct ComplianceReport {
    pub addr: u32,
    pub word: u32,
    pub name: &'static str,
    pub diffs: Vec<FieldDiff>,
}

impl ComplianceReport {
    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} (0x{:08x}) diverged in {} field(s):",
            self.name,
            self.word,
            self.diffs.len()
        );
        for diff in &self.diffs {
            let _ = writeln!(
                out,
                "  {}: interp={} jit={}",
                diff.field, diff.interp, diff.jit
            );
        }
        out
    }
}

/// Run one instruction through both engines and diff the results.
pub fn step(
    jit: &JitManager,
    handlers: &HandlerTable,
    state: &mut ThreadState,
    instr: Instruction,
    data: &'static InstructionData,
) -> Result<(), CpuError> {
    let handler = handlers
        .get(data.id)
        .ok_or(CpuError::UnimplementedHandler { name: data.name })?;

    // Kernel calls mutate host-side state; run them once, uncompared
    if data.id == InstructionId::Kc {
        return handler(state, instr);
    }

    let mut shadow = state.snapshot();
    let reserved_word = if state.reservation_active() {
        let addr = state.reservation_address();
        Some((addr, state.memory().read_no_swap::<u32>(addr)))
    } else {
        None
    };

    // Ground truth first
    handler(state, instr)?;

    // Put the reserved word back so a shadow stwcx. sees the same memory
    if let Some((addr, word)) = reserved_word {
        state.memory().write_no_swap::<u32>(addr, word);
    }

    let block = match jit.get_single(shadow.cia) {
        Some(block) => block,
        None => {
            // Compilation failure is a JIT deficiency, not a divergence
            warn!(
                "compliance: no single block for 0x{:08x}, skipping diff",
                shadow.cia
            );
            return Ok(());
        }
    };
    jit.execute(&mut shadow, &block)?;

    let diffs = diff_states(state, &shadow);

    // The shadow may have registered a reservation of its own; drop its
    // registry entry now that the comparison is done.
    shadow.clear_reservation();

    if diffs.is_empty() {
        return Ok(());
    }

    let report = ComplianceReport {
        addr: state.cia,
        word: instr.0,
        name: data.name,
        diffs,
    };
    Err(CpuError::ComplianceDivergence {
        addr: report.addr,
        report: report.render(),
    })
}

fn diff_states(interp: &ThreadState, jit: &ThreadState) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    let mut push = |field: String, a: String, b: String| {
        diffs.push(FieldDiff {
            field,
            interp: a,
            jit: b,
        });
    };

    for i in 0..32 {
        if interp.gpr[i] != jit.gpr[i] {
            push(
                format!("r{}", i),
                format!("0x{:08x}", interp.gpr[i]),
                format!("0x{:08x}", jit.gpr[i]),
            );
        }
        if interp.fpr[i].bits() != jit.fpr[i].bits() {
            push(
                format!("fr{}", i),
                format!("0x{:016x}", interp.fpr[i].bits()),
                format!("0x{:016x}", jit.fpr[i].bits()),
            );
        }
    }

    for i in 0..8 {
        if interp.gqr[i] != jit.gqr[i] {
            push(
                format!("gqr{}", i),
                format!("0x{:08x}", interp.gqr[i]),
                format!("0x{:08x}", jit.gqr[i]),
            );
        }
    }

    macro_rules! scalar {
        ($name:literal, $field:ident) => {
            if interp.$field != jit.$field {
                push(
                    $name.to_string(),
                    format!("0x{:08x}", interp.$field),
                    format!("0x{:08x}", jit.$field),
                );
            }
        };
    }

    scalar!("cr", cr);
    scalar!("xer", xer);
    scalar!("lr", lr);
    scalar!("ctr", ctr);
    scalar!("nia", nia);

    if interp.fpscr != jit.fpscr {
        push(
            "fpscr".to_string(),
            format!("0x{:08x}", interp.fpscr.bits()),
            format!("0x{:08x}", jit.fpscr.bits()),
        );
    }

    if interp.reservation_active() != jit.reservation_active() {
        push(
            "reserve".to_string(),
            interp.reservation_active().to_string(),
            jit.reservation_active().to_string(),
        );
    } else if interp.reservation_active()
        && interp.reservation_address() != jit.reservation_address()
    {
        push(
            "reserveAddress".to_string(),
            format!("0x{:08x}", interp.reservation_address()),
            format!("0x{:08x}", jit.reservation_address()),
        );
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Interpreter, JitMode};
    use crate::syscalls::SyscallTable;
    use ocf_memory::{Memory, MemoryKind, ReservationRegistry, CALLBACK_ADDR};
    use std::sync::Arc;

    const BLR: u32 = (19 << 26) | (20 << 21) | (16 << 1);

    fn run_in_mode(words: &[u32], mode: JitMode) -> ThreadState {
        let memory = Memory::initialise().unwrap();
        let syscalls = Arc::new(SyscallTable::new());
        let registry = ReservationRegistry::new();
        let interp = Interpreter::new(Arc::clone(&memory));
        interp.set_jit_mode(mode);

        let mut state = ThreadState::new(Arc::clone(&memory), syscalls, registry);
        let code = memory.alloc(MemoryKind::Application, 0x1000);
        for (i, &word) in words.iter().enumerate() {
            memory.write::<u32>(code + i as u32 * 4, word);
        }

        state.lr = CALLBACK_ADDR;
        state.nia = code;
        interp.execute(&mut state).unwrap();
        state
    }

    #[test]
    fn test_no_divergence_on_arithmetic() {
        // addi r3,0,5; addi r4,0,7; add r5,r3,r4; blr
        let add = (31 << 26) | (5 << 21) | (3 << 16) | (4 << 11) | (266 << 1);
        let words = [0x3860_0005, 0x3880_0007, add, BLR];

        let debug = run_in_mode(&words, JitMode::Debug);
        assert_eq!(debug.gpr[5], 12);

        // Final state equals an interpreter-only run
        let plain = run_in_mode(&words, JitMode::Disabled);
        assert_eq!(debug.gpr, plain.gpr);
        assert_eq!(debug.cr, plain.cr);
        assert_eq!(debug.xer, plain.xer);
    }

    #[test]
    fn test_no_divergence_on_memory_ops() {
        let memory = Memory::initialise().unwrap();
        let syscalls = Arc::new(SyscallTable::new());
        let registry = ReservationRegistry::new();
        let interp = Interpreter::new(Arc::clone(&memory));
        interp.set_jit_mode(JitMode::Debug);

        let mut state = ThreadState::new(Arc::clone(&memory), syscalls, registry);
        let code = memory.alloc(MemoryKind::Application, 0x1000);
        let data = memory.alloc(MemoryKind::Application, 0x1000);

        // lis r3, 0x1234; ori r3, r3, 0x5678; stw r3, 0(r4); lwz r5, 0(r4); blr
        let words = [
            0x3C60_1234,
            0x6063_5678,
            (36 << 26) | (3 << 21) | (4 << 16),
            (32 << 26) | (5 << 21) | (4 << 16),
            BLR,
        ];
        for (i, &word) in words.iter().enumerate() {
            memory.write::<u32>(code + i as u32 * 4, word);
        }

        state.gpr[4] = data;
        state.lr = CALLBACK_ADDR;
        state.nia = code;
        interp.execute(&mut state).unwrap();

        assert_eq!(state.gpr[5], 0x1234_5678);
        assert_eq!(memory.read_bytes(data, 4), vec![0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_reservation_pair_under_compliance() {
        let memory = Memory::initialise().unwrap();
        let syscalls = Arc::new(SyscallTable::new());
        let registry = ReservationRegistry::new();
        let interp = Interpreter::new(Arc::clone(&memory));
        interp.set_jit_mode(JitMode::Debug);

        let mut state = ThreadState::new(Arc::clone(&memory), syscalls, registry);
        let code = memory.alloc(MemoryKind::Application, 0x1000);
        let data = memory.alloc(MemoryKind::Application, 0x1000);

        // lwarx r3, 0, r4; stwcx. r5, 0, r4; blr
        let lwarx = (31 << 26) | (3 << 21) | (4 << 11) | (20 << 1);
        let stwcx = (31 << 26) | (5 << 21) | (4 << 11) | (150 << 1) | 1;
        for (i, &word) in [lwarx, stwcx, BLR].iter().enumerate() {
            memory.write::<u32>(code + i as u32 * 4, word);
        }

        memory.write::<u32>(data, 7);
        state.gpr[4] = data;
        state.gpr[5] = 9;
        state.lr = CALLBACK_ADDR;
        state.nia = code;
        interp.execute(&mut state).unwrap();

        assert_eq!(state.gpr[3], 7);
        assert_eq!(memory.read::<u32>(data), 9);
        assert_eq!(state.cr_field(0) & 0b0010, 0b0010);
    }

    #[test]
    fn test_report_rendering() {
        let report = ComplianceReport {
            addr: 0x0200_0000,
            word: 0x3860_0001,
            name: "addi",
            diffs: vec![FieldDiff {
                field: "r3".to_string(),
                interp: "0x00000001".to_string(),
                jit: "0x00000002".to_string(),
            }],
        };
        let text = report.render();
        assert!(text.contains("addi"));
        assert!(text.contains("r3"));
        assert!(text.contains("interp=0x00000001"));
    }
}
