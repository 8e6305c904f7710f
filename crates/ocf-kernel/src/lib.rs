//! Café OS kernel modules
//!
//! Host implementations of the guest OS routines the execution core
//! dispatches through the syscall table. Loaders resolve a module's
//! imported symbols against the table by exact mangled-name match; the
//! functions here register themselves under those names.

pub mod args;
pub mod coreinit_cache;
pub mod coreinit_time;
pub mod nn_act;
pub mod proc_ui;

use ocf_espresso::SyscallTable;
use tracing::info;

/// Register every kernel module into `table`.
pub fn register_all(table: &SyscallTable) {
    coreinit_cache::register(table);
    coreinit_time::register(table);
    nn_act::register(table);
    proc_ui::register(table);
    info!("registered {} kernel functions", table.len());
}
