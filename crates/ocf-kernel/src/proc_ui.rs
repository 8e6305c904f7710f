//! proc_ui foreground-state functions
//!
//! Minimal process-model stubs: the emulated application always runs in
//! the foreground.

use crate::args::{ret_u32, CallArgs};
use ocf_espresso::{SyscallTable, ThreadState};
use tracing::trace;

/// ProcUIStatus values
const STATUS_IN_FOREGROUND: u32 = 0;

fn proc_ui_init(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let save_callback = args.u32();
    trace!("ProcUIInit(callback=0x{:08x})", save_callback);
}

fn proc_ui_init_ex(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let save_callback = args.u32();
    let arg = args.u32();
    trace!("ProcUIInitEx(callback=0x{:08x}, arg=0x{:08x})", save_callback, arg);
}

fn proc_ui_shutdown(_state: &mut ThreadState) {
    trace!("ProcUIShutdown()");
}

fn proc_ui_process_messages(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let block = args.u32();
    trace!("ProcUIProcessMessages(block={})", block);
    ret_u32(state, STATUS_IN_FOREGROUND);
}

fn proc_ui_in_foreground(state: &mut ThreadState) {
    trace!("ProcUIInForeground()");
    ret_u32(state, 1);
}

pub fn register(table: &SyscallTable) {
    table.register("ProcUIInit", proc_ui_init);
    table.register("ProcUIInitEx", proc_ui_init_ex);
    table.register("ProcUIShutdown", proc_ui_shutdown);
    table.register("ProcUIProcessMessages", proc_ui_process_messages);
    table.register("ProcUIInForeground", proc_ui_in_foreground);
}
