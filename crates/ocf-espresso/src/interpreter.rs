//! Interpreter loop
//!
//! Fetch, decode, dispatch. The loop runs a guest thread until the next
//! instruction address reaches the callback sentinel, handling the
//! kernel-call trap, breakpoints, the host interrupt poll, and the
//! optional JIT dispatch on taken branches.

use crate::compliance;
use crate::instruction::{Field, Instruction};
use crate::instructions;
use crate::jit::JitManager;
use crate::state::ThreadState;
use crate::syscalls::SyscallTable;
use crate::table::{instruction_table, InstructionData, InstructionId, INSTRUCTION_COUNT};
use ocf_core::config::{CpuConfig, JitModeSetting};
use ocf_core::error::CpuError;
use ocf_memory::{Memory, ReservationRegistry, CALLBACK_ADDR};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

/// Handler signature: mutate the state, report trap-level failures
pub type HandlerFn = fn(&mut ThreadState, Instruction) -> Result<(), CpuError>;

/// Hook invoked from the loop with the running thread's state
pub type Hook = Box<dyn Fn(&mut ThreadState) + Send + Sync>;

/// Dense handler table indexed by [`InstructionId`]
pub struct HandlerTable {
    handlers: Vec<Option<HandlerFn>>,
}

impl HandlerTable {
    /// Build the table with every category registered
    pub fn new() -> Self {
        let mut table = Self {
            handlers: vec![None; INSTRUCTION_COUNT],
        };
        instructions::register_all(&mut table);
        table
    }

    /// Install (or replace) a handler; registration is idempotent
    pub fn register(&mut self, id: InstructionId, handler: HandlerFn) {
        self.handlers[id as usize] = Some(handler);
    }

    pub fn has_handler(&self, id: InstructionId) -> bool {
        self.handlers[id as usize].is_some()
    }

    pub fn get(&self, id: InstructionId) -> Option<HandlerFn> {
        self.handlers[id as usize]
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Execution mode of the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitMode {
    /// Interpret everything
    Disabled,
    /// Dispatch compiled blocks from branch targets
    Enabled,
    /// Run interpreter and JIT in lockstep and diff the state
    Debug,
}

impl From<JitModeSetting> for JitMode {
    fn from(setting: JitModeSetting) -> Self {
        match setting {
            JitModeSetting::Interpreter => JitMode::Disabled,
            JitModeSetting::Recompiler => JitMode::Enabled,
            JitModeSetting::Compliance => JitMode::Debug,
        }
    }
}

/// One execution trace record
#[derive(Debug, Clone, Copy)]
pub struct TraceRecord {
    pub cia: u32,
    pub word: u32,
    pub name: &'static str,
}

/// Ring buffer of recent instructions for post-mortem replay
pub struct Tracer {
    enabled: AtomicBool,
    capacity: usize,
    records: Mutex<VecDeque<TraceRecord>>,
}

impl Tracer {
    fn new(capacity: usize) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn record(&self, record: TraceRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot of the ring buffer, oldest first
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().iter().copied().collect()
    }
}

/// The Espresso interpreter
pub struct Interpreter {
    handlers: Arc<HandlerTable>,
    jit: Arc<JitManager>,
    mode: RwLock<JitMode>,
    breakpoints: RwLock<HashSet<u32>>,
    force_jit: RwLock<HashSet<u32>>,
    interrupt_hook: RwLock<Option<Hook>>,
    debug_hook: RwLock<Option<Hook>>,
    tracer: Tracer,
}

impl Interpreter {
    pub fn new(memory: Arc<Memory>) -> Self {
        Self::with_config(memory, &CpuConfig::default())
    }

    pub fn with_config(memory: Arc<Memory>, config: &CpuConfig) -> Self {
        let handlers = Arc::new(HandlerTable::new());
        let jit = Arc::new(JitManager::new(
            memory,
            Arc::clone(&handlers),
            config.jit_max_block,
        ));

        Self {
            handlers,
            jit,
            mode: RwLock::new(config.jit_mode.into()),
            breakpoints: RwLock::new(HashSet::new()),
            force_jit: RwLock::new(HashSet::new()),
            interrupt_hook: RwLock::new(None),
            debug_hook: RwLock::new(None),
            tracer: Tracer::new(4096),
        }
    }

    pub fn handlers(&self) -> &Arc<HandlerTable> {
        &self.handlers
    }

    pub fn jit(&self) -> &Arc<JitManager> {
        &self.jit
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn set_jit_mode(&self, mode: JitMode) {
        *self.mode.write() = mode;
    }

    pub fn jit_mode(&self) -> JitMode {
        *self.mode.read()
    }

    pub fn add_breakpoint(&self, addr: u32) {
        self.breakpoints.write().insert(addr);
    }

    pub fn remove_breakpoint(&self, addr: u32) {
        self.breakpoints.write().remove(&addr);
    }

    /// Force JIT dispatch at `addr` even when it is not a branch target
    pub fn add_force_jit(&self, addr: u32) {
        self.force_jit.write().insert(addr);
    }

    /// Install the non-blocking interrupt poll run once per iteration
    pub fn set_interrupt_hook(&self, hook: Hook) {
        *self.interrupt_hook.write() = Some(hook);
    }

    /// Install the debug control hook invoked at breakpoints (may block)
    pub fn set_debug_hook(&self, hook: Hook) {
        *self.debug_hook.write() = Some(hook);
    }

    /// Run `state` until the next instruction address is the callback
    /// sentinel.
    pub fn execute(&self, state: &mut ThreadState) -> Result<(), CpuError> {
        while state.nia != CALLBACK_ADDR {
            // Pending guest interrupts run first; the hook mutates state
            if let Some(hook) = self.interrupt_hook.read().as_ref() {
                hook(state);
                if state.nia == CALLBACK_ADDR {
                    break;
                }
            }

            let mode = self.jit_mode();

            // Enter compiled code from branch targets (and forced entries)
            if mode == JitMode::Enabled {
                let taken = state.nia != state.cia.wrapping_add(4);
                if taken || self.force_jit.read().contains(&state.nia) {
                    if let Some(block) = self.jit.get(state.nia) {
                        state.nia = self.jit.execute(state, &block)?;
                        continue;
                    }
                }
            }

            state.cia = state.nia;
            state.nia = state.cia.wrapping_add(4);

            if self.breakpoints.read().contains(&state.cia) {
                match self.debug_hook.read().as_ref() {
                    Some(hook) => hook(state),
                    None => {
                        state.nia = state.cia;
                        return Err(CpuError::Breakpoint { addr: state.cia });
                    }
                }
            }

            self.step(state, mode)?;
        }

        Ok(())
    }

    /// Execute exactly the instruction at `cia` (already fetched into the
    /// loop's pre-advanced `nia` convention).
    fn step(&self, state: &mut ThreadState, mode: JitMode) -> Result<(), CpuError> {
        let word = state.memory().read::<u32>(state.cia);
        let instr = Instruction(word);

        let data = match instruction_table().decode(word) {
            Some(data) => data,
            None => {
                error!("undecoded instruction at 0x{:08x}: 0x{:08x}", state.cia, word);
                state.nia = state.cia;
                return Err(CpuError::UndecodedInstruction {
                    addr: state.cia,
                    word,
                });
            }
        };

        if mode == JitMode::Debug {
            return compliance::step(&self.jit, &self.handlers, state, instr, data);
        }

        let handler = match self.handlers.get(data.id) {
            Some(handler) => handler,
            None => {
                error!("unimplemented handler for {} at 0x{:08x}", data.name, state.cia);
                state.nia = state.cia;
                return Err(CpuError::UnimplementedHandler { name: data.name });
            }
        };

        if self.tracer.is_enabled() {
            self.tracer.record(TraceRecord {
                cia: state.cia,
                word,
                name: data.name,
            });
            handler(state, instr)?;
            log_written_fields(state, instr, data);
        } else {
            handler(state, instr)?;
        }

        Ok(())
    }

    /// Call a guest function and regain control when it returns.
    ///
    /// Saves the caller's LR, points it at the callback sentinel, runs
    /// until the guest's final `blr` lands on it, then restores LR.
    pub fn execute_sub(&self, state: &mut ThreadState) -> Result<(), CpuError> {
        let saved_lr = state.lr;
        state.lr = CALLBACK_ADDR;
        let result = self.execute(state);
        state.lr = saved_lr;
        result
    }
}

/// Post-execution trace line naming the registers the instruction wrote
fn log_written_fields(state: &ThreadState, instr: Instruction, data: &InstructionData) {
    for field in data.write {
        match field {
            Field::rA => trace!("  r{} = 0x{:08x}", instr.ra(), state.gpr[instr.ra()]),
            Field::rD => trace!("  r{} = 0x{:08x}", instr.rd(), state.gpr[instr.rd()]),
            Field::frD => trace!("  fr{} = {}", instr.frd(), state.fpr[instr.frd()].value()),
            Field::crfD => trace!("  crf{} = 0b{:04b}", instr.crfd(), state.cr_field(instr.crfd())),
            _ => {}
        }
    }
}

/// Convenience constructor for the process services a thread needs
pub fn make_thread(
    memory: &Arc<Memory>,
    syscalls: &Arc<SyscallTable>,
    registry: &Arc<ReservationRegistry>,
) -> ThreadState {
    ThreadState::new(
        Arc::clone(memory),
        Arc::clone(syscalls),
        Arc::clone(registry),
    )
}
