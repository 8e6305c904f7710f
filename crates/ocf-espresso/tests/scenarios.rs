//! End-to-end execution scenarios driving the public core API

use ocf_espresso::interpreter::make_thread;
use ocf_espresso::{Interpreter, JitMode, SyscallTable, ThreadState, CALLBACK_ADDR};
use ocf_memory::{Memory, MemoryKind, ReservationRegistry};
use std::sync::Arc;

/// Minimal assembler for the handful of encodings the scenarios need
mod asm {
    pub fn addi(rd: u32, ra: u32, simm: i32) -> u32 {
        (14 << 26) | (rd << 21) | (ra << 16) | (simm as u32 & 0xFFFF)
    }

    pub fn addis(rd: u32, ra: u32, simm: i32) -> u32 {
        (15 << 26) | (rd << 21) | (ra << 16) | (simm as u32 & 0xFFFF)
    }

    pub fn ori(ra: u32, rs: u32, uimm: u32) -> u32 {
        (24 << 26) | (rs << 21) | (ra << 16) | (uimm & 0xFFFF)
    }

    pub fn add(rd: u32, ra: u32, rb: u32) -> u32 {
        (31 << 26) | (rd << 21) | (ra << 16) | (rb << 11) | (266 << 1)
    }

    pub fn stw(rs: u32, ra: u32, d: i32) -> u32 {
        (36 << 26) | (rs << 21) | (ra << 16) | (d as u32 & 0xFFFF)
    }

    pub fn lwz(rd: u32, ra: u32, d: i32) -> u32 {
        (32 << 26) | (rd << 21) | (ra << 16) | (d as u32 & 0xFFFF)
    }

    pub fn lwarx(rd: u32, ra: u32, rb: u32) -> u32 {
        (31 << 26) | (rd << 21) | (ra << 16) | (rb << 11) | (20 << 1)
    }

    pub fn stwcx(rs: u32, ra: u32, rb: u32) -> u32 {
        (31 << 26) | (rs << 21) | (ra << 16) | (rb << 11) | (150 << 1) | 1
    }

    pub fn b(offset: i32) -> u32 {
        (18 << 26) | (offset as u32 & 0x03FF_FFFC)
    }

    pub fn blr() -> u32 {
        (19 << 26) | (20 << 21) | (16 << 1)
    }

    pub fn kc(kcn: u32, implemented: bool) -> u32 {
        (1 << 26) | (kcn << 1) | implemented as u32
    }
}

struct Harness {
    memory: Arc<Memory>,
    syscalls: Arc<SyscallTable>,
    registry: Arc<ReservationRegistry>,
    interp: Interpreter,
}

impl Harness {
    fn new() -> Self {
        let memory = Memory::initialise().unwrap();
        let syscalls = Arc::new(SyscallTable::new());
        let registry = ReservationRegistry::new();
        let interp = Interpreter::new(Arc::clone(&memory));
        Self {
            memory,
            syscalls,
            registry,
            interp,
        }
    }

    fn thread(&self) -> ThreadState {
        make_thread(&self.memory, &self.syscalls, &self.registry)
    }

    fn load(&self, program: &[u32]) -> u32 {
        let addr = self.memory.alloc(MemoryKind::Application, 0x1000);
        for (i, &word) in program.iter().enumerate() {
            self.memory.write::<u32>(addr + i as u32 * 4, word);
        }
        addr
    }

    fn run(&self, state: &mut ThreadState, entry: u32) {
        state.lr = CALLBACK_ADDR;
        state.nia = entry;
        self.interp.execute(state).unwrap();
    }
}

#[test]
fn scenario_li_blr() {
    let h = Harness::new();
    let entry = h.load(&[asm::addi(3, 0, 42), asm::blr()]);

    let mut state = h.thread();
    h.run(&mut state, entry);
    assert_eq!(state.gpr[3], 42);
}

#[test]
fn scenario_add_chain() {
    let h = Harness::new();
    let entry = h.load(&[
        asm::addi(3, 0, 5),
        asm::addi(4, 0, 7),
        asm::add(5, 3, 4),
        asm::blr(),
    ]);

    let mut state = h.thread();
    h.run(&mut state, entry);
    assert_eq!(state.gpr[5], 12);
}

#[test]
fn scenario_store_load_big_endian() {
    let h = Harness::new();
    let data = h.memory.alloc(MemoryKind::Application, 0x1000);
    let entry = h.load(&[
        asm::addis(3, 0, 0x1234),
        asm::ori(3, 3, 0x5678),
        asm::stw(3, 4, 0),
        asm::lwz(5, 4, 0),
        asm::blr(),
    ]);

    let mut state = h.thread();
    state.gpr[4] = data;
    h.run(&mut state, entry);

    assert_eq!(h.memory.read_bytes(data, 4), vec![0x12, 0x34, 0x56, 0x78]);
    assert_eq!(state.gpr[5], 0x1234_5678);
}

#[test]
fn scenario_lwarx_stwcx() {
    let h = Harness::new();
    let data = h.memory.alloc(MemoryKind::Application, 0x1000);

    // lwarx r3, 0, r4; stwcx. r5, 0, r4; blr
    let entry = h.load(&[asm::lwarx(3, 0, 4), asm::stwcx(5, 0, 4), asm::blr()]);

    let mut state = h.thread();
    h.memory.write::<u32>(data, 0x11);
    state.gpr[4] = data;
    state.gpr[5] = 0x22;
    h.run(&mut state, entry);

    assert_eq!(state.gpr[3], 0x11);
    assert_eq!(state.cr_field(0) & 0b0010, 0b0010); // EQ: success
    assert_eq!(h.memory.read::<u32>(data), 0x22);

    // Repeat only the stwcx.: no reservation, must fail
    let retry = h.load(&[asm::stwcx(5, 0, 4), asm::blr()]);
    state.gpr[5] = 0x33;
    h.run(&mut state, retry);
    assert_eq!(state.cr_field(0) & 0b0010, 0);
    assert_eq!(h.memory.read::<u32>(data), 0x22);
}

#[test]
fn scenario_kernel_call() {
    let h = Harness::new();

    fn return_code(state: &mut ThreadState) {
        state.gpr[3] = 0xC0DE;
    }
    let index = h.syscalls.register("TestReturnCode", return_code);

    let entry = h.load(&[asm::kc(index, true), asm::blr()]);
    let mut state = h.thread();
    h.run(&mut state, entry);

    assert_eq!(state.gpr[3], 0xC0DE);
}

#[test]
fn scenario_kernel_call_advances_past_trap() {
    let h = Harness::new();

    fn noop(_state: &mut ThreadState) {}
    let index = h.syscalls.register("TestNoop", noop);

    // kc; addi r6, 0, 9; blr — the instruction after the trap runs
    let entry = h.load(&[asm::kc(index, true), asm::addi(6, 0, 9), asm::blr()]);
    let mut state = h.thread();
    h.run(&mut state, entry);
    assert_eq!(state.gpr[6], 9);
}

#[test]
fn scenario_unimplemented_kernel_call_traps() {
    let h = Harness::new();
    let index = h.syscalls.register_stub("GXInit");

    let entry = h.load(&[asm::kc(index, false), asm::blr()]);
    let mut state = h.thread();
    state.lr = CALLBACK_ADDR;
    state.nia = entry;

    let err = h.interp.execute(&mut state).unwrap_err();
    let text = format!("{}", err);
    assert!(text.contains("GXInit"), "{}", text);
    // nia did not advance past the trap
    assert_eq!(state.nia, entry);
}

#[test]
fn scenario_compliance_mode_matches_interpreter() {
    let program = |h: &Harness| {
        h.load(&[
            asm::addi(3, 0, 5),
            asm::addi(4, 0, 7),
            asm::add(5, 3, 4),
            asm::blr(),
        ])
    };

    let debug = Harness::new();
    debug.interp.set_jit_mode(JitMode::Debug);
    let entry = program(&debug);
    let mut debug_state = debug.thread();
    debug.run(&mut debug_state, entry);

    let plain = Harness::new();
    let entry = program(&plain);
    let mut plain_state = plain.thread();
    plain.run(&mut plain_state, entry);

    assert_eq!(debug_state.gpr[5], 12);
    assert_eq!(debug_state.gpr, plain_state.gpr);
    assert_eq!(debug_state.cr, plain_state.cr);
    assert_eq!(debug_state.xer, plain_state.xer);
}

#[test]
fn scenario_jit_mode_runs_branchy_code() {
    let h = Harness::new();
    h.interp.set_jit_mode(JitMode::Enabled);

    // Sum 1..=10 with a bdnz loop:
    //   li r3, 0; li r4, 10; mtctr r4
    // loop:
    //   add r3, r3, r4; addi r4, r4, -1; bdnz loop
    //   blr
    let mtctr = (31 << 26) | (4 << 21) | (0x120 << 11) | (467 << 1);
    let bdnz_back = (16 << 26) | (16 << 21) | ((-8i32 as u32) & 0xFFFC);
    let entry = h.load(&[
        asm::addi(3, 0, 0),
        asm::addi(4, 0, 10),
        mtctr,
        asm::add(3, 3, 4),
        asm::addi(4, 4, -1),
        bdnz_back,
        asm::blr(),
    ]);

    let mut state = h.thread();
    h.run(&mut state, entry);
    assert_eq!(state.gpr[3], 55);

    let stats = h.interp.jit().stats();
    assert!(stats.blocks_compiled > 0);
}

#[test]
fn scenario_execute_sub_roundtrip() {
    let h = Harness::new();
    // Guest function: double r3 and return
    let entry = h.load(&[asm::add(3, 3, 3), asm::blr()]);

    let mut state = h.thread();
    state.lr = 0xDEAD_0000; // caller's LR must survive
    state.gpr[3] = 21;
    state.nia = entry;
    h.interp.execute_sub(&mut state).unwrap();

    assert_eq!(state.gpr[3], 42);
    assert_eq!(state.lr, 0xDEAD_0000);
}

#[test]
fn scenario_two_threads_reservation_break() {
    use std::sync::mpsc;

    let h = Harness::new();
    let data = h.memory.alloc(MemoryKind::Application, 0x1000);
    h.memory.write::<u32>(data, 1);

    // Thread A: lwarx, then wait for B, then stwcx. — must fail
    let lwarx_entry = h.load(&[asm::lwarx(3, 0, 4), asm::blr()]);
    let stwcx_entry = h.load(&[asm::stwcx(5, 0, 4), asm::blr()]);
    // Thread B: plain store to the reserved address
    let store_entry = h.load(&[asm::stw(5, 4, 0), asm::blr()]);

    let mut thread_a = h.thread();
    thread_a.gpr[4] = data;
    thread_a.gpr[5] = 0xAAAA;
    h.run(&mut thread_a, lwarx_entry);
    assert_eq!(thread_a.gpr[3], 1);

    let (done_tx, done_rx) = mpsc::channel();
    let memory = Arc::clone(&h.memory);
    let syscalls = Arc::clone(&h.syscalls);
    let registry = Arc::clone(&h.registry);
    std::thread::spawn(move || {
        let interp = Interpreter::new(Arc::clone(&memory));
        let mut thread_b = make_thread(&memory, &syscalls, &registry);
        thread_b.gpr[4] = data;
        thread_b.gpr[5] = 0xBBBB;
        thread_b.lr = CALLBACK_ADDR;
        thread_b.nia = store_entry;
        interp.execute(&mut thread_b).unwrap();
        done_tx.send(()).unwrap();
    });
    done_rx.recv().unwrap();

    assert_eq!(h.memory.read::<u32>(data), 0xBBBB);

    // A's conditional store observes the broken reservation
    h.run(&mut thread_a, stwcx_entry);
    assert_eq!(thread_a.cr_field(0) & 0b0010, 0);
    assert_eq!(h.memory.read::<u32>(data), 0xBBBB);
}

#[test]
fn scenario_branch_and_link_subroutine() {
    let h = Harness::new();

    // main: li r3, 1; bl sub; addi r3, r3, 100; blr
    // sub:  addi r3, r3, 10; blr
    let entry = h.load(&[
        asm::addi(3, 0, 1),
        asm::b(12) | 1, // bl -> sub
        asm::addi(3, 3, 100),
        asm::blr(),
        asm::addi(3, 3, 10), // sub:
        asm::blr(),
    ]);

    let mut state = h.thread();
    h.run(&mut state, entry);
    assert_eq!(state.gpr[3], 111);
}

#[test]
fn scenario_jit_runs_kernel_call_block() {
    let h = Harness::new();
    h.interp.set_jit_mode(JitMode::Enabled);

    fn mark(state: &mut ThreadState) {
        state.gpr[7] = 0x77;
    }
    let index = h.syscalls.register("TestMark", mark);

    // Entry block starts with a kernel call (native codegen), then a
    // normal tail; everything must still execute correctly under JIT.
    let entry = h.load(&[asm::kc(index, true), asm::addi(3, 0, 6), asm::blr()]);
    let mut state = h.thread();
    h.run(&mut state, entry);

    assert_eq!(state.gpr[7], 0x77);
    assert_eq!(state.gpr[3], 6);
}
