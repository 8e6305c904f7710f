//! Espresso (PowerPC 750) CPU core for oxidized-cafe
//!
//! The Wii U CPU is a 32-bit big-endian PowerPC 750 derivative with the
//! paired-single SIMD extension. This crate implements the execution core:
//! instruction table and decoder, architectural thread state, the
//! interpreter with its kernel-call trap and callback sentinel, the JIT
//! code cache, and the interpreter/JIT compliance mode used to validate
//! recompiled blocks against the interpreter as ground truth.
//!
//! ## Execution modes
//!
//! - [`JitMode::Disabled`]: pure interpretation
//! - [`JitMode::Enabled`]: basic blocks are compiled on first entry and
//!   dispatched from branch targets
//! - [`JitMode::Debug`]: every instruction runs through both engines and
//!   the architectural state is diffed afterwards

pub mod compliance;
pub mod instruction;
pub mod instructions;
pub mod interpreter;
pub mod jit;
pub mod state;
pub mod syscalls;
pub mod table;

pub use instruction::{Field, Instruction};
pub use interpreter::{HandlerTable, Interpreter, JitMode};
pub use jit::{CodeBlock, JitManager, JitStats};
pub use ocf_memory::CALLBACK_ADDR;
pub use state::{Fpr, ThreadState};
pub use syscalls::{KernelCall, SyscallTable};
pub use table::{decode_spr, instruction_table, InstructionData, InstructionId};
