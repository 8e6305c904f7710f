//! oxidized-cafe - Wii U emulator
//!
//! Entry point: brings up the guest memory window, the kernel function
//! table, and the Espresso execution core.

use ocf_espresso::{Interpreter, SyscallTable};
use ocf_memory::{Memory, ReservationRegistry};
use std::sync::Arc;

fn main() -> ocf_core::Result<()> {
    ocf_core::logging::init();

    tracing::info!("Starting oxidized-cafe");

    let config = ocf_core::Config::default();

    let memory = Memory::initialise()?;
    tracing::info!("guest memory window at {:p}", memory.base());

    let syscalls = Arc::new(SyscallTable::new());
    ocf_kernel::register_all(&syscalls);

    let registry = ReservationRegistry::new();
    let interpreter = Interpreter::with_config(Arc::clone(&memory), &config.cpu);

    tracing::info!(
        "Espresso core ready (jit mode {:?}); waiting for a loader to hand over an entry point",
        interpreter.jit_mode()
    );

    // The ELF/RPX loader and thread scheduler live outside this core; a
    // guest thread would be driven like this:
    //
    //   let mut state = ocf_espresso::interpreter::make_thread(&memory, &syscalls, &registry);
    //   state.nia = entry_point;
    //   interpreter.execute_sub(&mut state)?;
    let _ = registry;

    Ok(())
}
