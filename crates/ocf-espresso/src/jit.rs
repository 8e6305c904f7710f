//! JIT code cache and manager
//!
//! Basic blocks are compiled on first entry and cached by guest PC. A
//! compiled block is an immutable sequence of pre-decoded operations:
//! either a specialised native op (the system set: barriers, SPR moves,
//! the kernel-call trap) or a fallback op that invokes the interpreter
//! handler with the state and the raw instruction. Host-ISA code
//! generation is deliberately out of scope; the cache contract is what
//! matters to the rest of the core.
//!
//! A block ends after any branch, any kernel call, or the configured
//! maximum instruction count. The epilogue resolves the next guest PC
//! and returns it.

use crate::instruction::Instruction;
use crate::instructions::system::{dispatch_kernel_call, read_spr, write_spr};
use crate::interpreter::{HandlerFn, HandlerTable};
use crate::state::ThreadState;
use crate::table::{decode_spr, instruction_table, InstructionId, INSTRUCTION_COUNT};
use ocf_core::error::CpuError;
use ocf_memory::Memory;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// One compiled operation
enum Op {
    /// Architectural no-op (sync, isync, eieio)
    Nop,
    /// mfspr specialisation
    ReadSpr { number: u32, rd: usize },
    /// mtspr specialisation
    WriteSpr { number: u32, rs: usize },
    /// Kernel-call trap
    KernelCall { kcn: u32, kci: bool },
    /// Indirect call into the interpreter handler
    Fallback { handler: HandlerFn, instr: Instruction },
}

struct BlockOp {
    cia: u32,
    op: Op,
}

/// An immutable compiled block starting at `start`
pub struct CodeBlock {
    pub start: u32,
    ops: Vec<BlockOp>,
}

impl CodeBlock {
    /// Number of guest instructions covered
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Collects ops during compilation of one block
pub struct BlockAssembler {
    ops: Vec<BlockOp>,
    cia: u32,
}

impl BlockAssembler {
    fn emit(&mut self, op: Op) {
        self.ops.push(BlockOp { cia: self.cia, op });
    }
}

/// Per-instruction code generator: emit ops for `instr`, or return false
/// to fail the block's compilation.
pub type CodegenFn = fn(&mut BlockAssembler, Instruction) -> bool;

/// Registration entry for one opcode
enum Codegen {
    Native(CodegenFn),
    Fallback,
}

/// Counters for cache behaviour
#[derive(Debug, Clone, Copy, Default)]
pub struct JitStats {
    pub blocks_compiled: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Default)]
struct StatCounters {
    blocks_compiled: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

/// The JIT manager: code cache plus per-opcode codegen registrations
pub struct JitManager {
    memory: Arc<Memory>,
    handlers: Arc<HandlerTable>,
    codegen: Vec<Option<Codegen>>,
    /// Multi-instruction blocks; the mutex serialises lookup-then-insert
    blocks: Mutex<HashMap<u32, Arc<CodeBlock>>>,
    /// One-instruction blocks for compliance mode
    singles: Mutex<HashMap<u32, Arc<CodeBlock>>>,
    max_block: usize,
    stats: StatCounters,
}

impl JitManager {
    pub fn new(memory: Arc<Memory>, handlers: Arc<HandlerTable>, max_block: usize) -> Self {
        let mut manager = Self {
            memory,
            handlers,
            codegen: (0..INSTRUCTION_COUNT).map(|_| None).collect(),
            blocks: Mutex::new(HashMap::new()),
            singles: Mutex::new(HashMap::new()),
            max_block: max_block.max(1),
            stats: StatCounters::default(),
        };
        manager.register_defaults();
        manager
    }

    /// Install a native code generator for `id`
    pub fn register_instruction(&mut self, id: InstructionId, codegen: CodegenFn) {
        self.codegen[id as usize] = Some(Codegen::Native(codegen));
    }

    /// Route `id` through the interpreter handler inside compiled blocks
    pub fn register_instruction_fallback(&mut self, id: InstructionId) {
        self.codegen[id as usize] = Some(Codegen::Fallback);
    }

    /// Every handled opcode gets at least the fallback; the system set is
    /// specialised natively.
    fn register_defaults(&mut self) {
        for (_, data) in instruction_table().entries() {
            if self.handlers.has_handler(data.id) {
                self.register_instruction_fallback(data.id);
            }
        }

        self.register_instruction(InstructionId::Sync, gen_nop);
        self.register_instruction(InstructionId::Isync, gen_nop);
        self.register_instruction(InstructionId::Eieio, gen_nop);
        self.register_instruction(InstructionId::Mfspr, gen_mfspr);
        self.register_instruction(InstructionId::Mtspr, gen_mtspr);
        self.register_instruction(InstructionId::Kc, gen_kc);
    }

    /// Get (compiling on miss) the block starting at `pc`.
    ///
    /// Returns `None` when compilation fails; the loop then interprets.
    pub fn get(&self, pc: u32) -> Option<Arc<CodeBlock>> {
        let mut blocks = self.blocks.lock();

        if let Some(block) = blocks.get(&pc) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(block));
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let block = self.compile(pc, false)?;
        blocks.insert(pc, Arc::clone(&block));
        Some(block)
    }

    /// One-instruction block for the compliance mode
    pub fn get_single(&self, pc: u32) -> Option<Arc<CodeBlock>> {
        let mut singles = self.singles.lock();

        if let Some(block) = singles.get(&pc) {
            return Some(Arc::clone(block));
        }

        let block = self.compile(pc, true)?;
        singles.insert(pc, Arc::clone(&block));
        Some(block)
    }

    /// Drop every compiled block
    pub fn invalidate_all(&self) {
        self.blocks.lock().clear();
        self.singles.lock().clear();
        debug!("jit cache invalidated");
    }

    pub fn stats(&self) -> JitStats {
        JitStats {
            blocks_compiled: self.stats.blocks_compiled.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
        }
    }

    fn compile(&self, pc: u32, single: bool) -> Option<Arc<CodeBlock>> {
        let mut asm = BlockAssembler {
            ops: Vec::new(),
            cia: pc,
        };

        loop {
            let word = self.memory.read::<u32>(asm.cia);
            let instr = Instruction(word);

            let data = match instruction_table().decode(word) {
                Some(data) => data,
                None => {
                    warn!("jit: undecoded instruction at 0x{:08x}: 0x{:08x}", asm.cia, word);
                    return None;
                }
            };

            match self.codegen.get(data.id as usize)?.as_ref() {
                Some(Codegen::Native(codegen)) => {
                    if !codegen(&mut asm, instr) {
                        warn!("jit: native codegen for {} failed", data.name);
                        return None;
                    }
                }
                Some(Codegen::Fallback) => {
                    let handler = self.handlers.get(data.id)?;
                    asm.emit(Op::Fallback { handler, instr });
                }
                None => {
                    warn!("jit: no registration for {}", data.name);
                    return None;
                }
            }

            if single || ends_block(data.id) || asm.ops.len() >= self.max_block {
                break;
            }
            asm.cia = asm.cia.wrapping_add(4);
        }

        self.stats.blocks_compiled.fetch_add(1, Ordering::Relaxed);
        Some(Arc::new(CodeBlock {
            start: pc,
            ops: asm.ops,
        }))
    }

    /// Run a compiled block; returns the guest PC to resume at.
    pub fn execute(&self, state: &mut ThreadState, block: &CodeBlock) -> Result<u32, CpuError> {
        for op in &block.ops {
            state.cia = op.cia;
            state.nia = op.cia.wrapping_add(4);

            match &op.op {
                Op::Nop => {}
                Op::ReadSpr { number, rd } => {
                    state.gpr[*rd] = read_spr(state, *number);
                }
                Op::WriteSpr { number, rs } => {
                    let value = state.gpr[*rs];
                    write_spr(state, *number, value);
                }
                Op::KernelCall { kcn, kci } => {
                    dispatch_kernel_call(state, *kcn, *kci)?;
                }
                Op::Fallback { handler, instr } => {
                    handler(state, *instr)?;
                }
            }

            // Taken branch resolves the block's successor early
            if state.nia != op.cia.wrapping_add(4) {
                return Ok(state.nia);
            }
        }

        Ok(state.nia)
    }
}

/// Does `id` terminate a basic block?
fn ends_block(id: InstructionId) -> bool {
    matches!(
        id,
        InstructionId::B
            | InstructionId::Bc
            | InstructionId::Bclr
            | InstructionId::Bcctr
            | InstructionId::Kc
    )
}

fn gen_nop(asm: &mut BlockAssembler, _instr: Instruction) -> bool {
    asm.emit(Op::Nop);
    true
}

fn gen_mfspr(asm: &mut BlockAssembler, instr: Instruction) -> bool {
    asm.emit(Op::ReadSpr {
        number: decode_spr(instr),
        rd: instr.rd(),
    });
    true
}

fn gen_mtspr(asm: &mut BlockAssembler, instr: Instruction) -> bool {
    asm.emit(Op::WriteSpr {
        number: decode_spr(instr),
        rs: instr.rs(),
    });
    true
}

fn gen_kc(asm: &mut BlockAssembler, instr: Instruction) -> bool {
    asm.emit(Op::KernelCall {
        kcn: instr.kcn(),
        kci: instr.kci(),
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscalls::SyscallTable;
    use ocf_memory::{MemoryKind, ReservationRegistry, CALLBACK_ADDR};

    struct Fixture {
        jit: JitManager,
        state: ThreadState,
        code: u32,
    }

    fn fixture() -> Fixture {
        let memory = Memory::initialise().unwrap();
        let syscalls = Arc::new(SyscallTable::new());
        let registry = ReservationRegistry::new();
        let handlers = Arc::new(HandlerTable::new());
        let jit = JitManager::new(Arc::clone(&memory), handlers, 128);
        let state = ThreadState::new(Arc::clone(&memory), syscalls, registry);
        let code = memory.alloc(MemoryKind::Application, 0x1000);
        Fixture { jit, state, code }
    }

    const BLR: u32 = (19 << 26) | (20 << 21) | (16 << 1);

    fn write_program(f: &Fixture, words: &[u32]) {
        for (i, &word) in words.iter().enumerate() {
            f.state.memory().write::<u32>(f.code + i as u32 * 4, word);
        }
    }

    #[test]
    fn test_block_ends_at_branch() {
        let f = fixture();
        // addi; addi; blr; addi (unreachable)
        write_program(&f, &[0x3860_0001, 0x3880_0002, BLR, 0x38A0_0003]);

        let block = f.jit.get(f.code).unwrap();
        assert_eq!(block.len(), 3);
        assert_eq!(block.start, f.code);
    }

    #[test]
    fn test_execute_returns_next_pc() {
        let mut f = fixture();
        write_program(&f, &[0x3860_002A, BLR]);

        f.state.lr = CALLBACK_ADDR;
        let block = f.jit.get(f.code).unwrap();
        let next = f.jit.execute(&mut f.state, &block).unwrap();
        assert_eq!(next, CALLBACK_ADDR);
        assert_eq!(f.state.gpr[3], 42);
    }

    #[test]
    fn test_cache_hit_returns_same_block() {
        let f = fixture();
        write_program(&f, &[BLR]);

        let a = f.jit.get(f.code).unwrap();
        let b = f.jit.get(f.code).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let stats = f.jit.stats();
        assert_eq!(stats.blocks_compiled, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_invalidate_all() {
        let f = fixture();
        write_program(&f, &[BLR]);

        let a = f.jit.get(f.code).unwrap();
        f.jit.invalidate_all();
        let b = f.jit.get(f.code).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_undecodable_fails_compile() {
        let f = fixture();
        write_program(&f, &[0x0000_0000]);
        assert!(f.jit.get(f.code).is_none());
    }

    #[test]
    fn test_max_block_length() {
        let memory = Memory::initialise().unwrap();
        let syscalls = Arc::new(SyscallTable::new());
        let registry = ReservationRegistry::new();
        let handlers = Arc::new(HandlerTable::new());
        let jit = JitManager::new(Arc::clone(&memory), handlers, 4);
        let state = ThreadState::new(Arc::clone(&memory), syscalls, registry);
        let code = memory.alloc(MemoryKind::Application, 0x1000);

        for i in 0..8 {
            state.memory().write::<u32>(code + i * 4, 0x3860_0001);
        }
        let block = jit.get(code).unwrap();
        assert_eq!(block.len(), 4);
    }

    #[test]
    fn test_native_spr_ops() {
        let mut f = fixture();
        // mtspr CTR, r3 ; mfspr r4, CTR ; blr
        let mtspr_word = (31 << 26) | (3 << 21) | (crate::table::encode_spr(9) << 11) | (467 << 1);
        let mfspr_word = (31 << 26) | (4 << 21) | (crate::table::encode_spr(9) << 11) | (339 << 1);
        write_program(&f, &[mtspr_word, mfspr_word, BLR]);

        f.state.gpr[3] = 0x1337;
        f.state.lr = CALLBACK_ADDR;
        let block = f.jit.get(f.code).unwrap();
        f.jit.execute(&mut f.state, &block).unwrap();
        assert_eq!(f.state.ctr, 0x1337);
        assert_eq!(f.state.gpr[4], 0x1337);
    }

    #[test]
    fn test_get_single_is_one_instruction() {
        let f = fixture();
        write_program(&f, &[0x3860_0001, 0x3880_0002]);

        let block = f.jit.get_single(f.code).unwrap();
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn test_concurrent_get_compiles_once() {
        let f = fixture();
        write_program(&f, &[BLR]);
        let jit = Arc::new(f.jit);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let jit = Arc::clone(&jit);
            let code = f.code;
            handles.push(std::thread::spawn(move || {
                jit.get(code).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(jit.stats().blocks_compiled, 1);
    }
}
