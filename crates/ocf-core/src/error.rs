//! Error types for the oxidized-cafe emulator

use thiserror::Error;

/// Main error type for the emulator
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("CPU error: {0}")]
    Cpu(#[from] CpuError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

/// Memory-related errors
///
/// Allocation failure is not an error: `alloc` returns the null address
/// and the caller decides.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Out of memory reserving the guest address space")]
    OutOfMemory,

    #[error("Failed to map guest address space")]
    MappingFailed,
}

/// Espresso core errors
#[derive(Error, Debug)]
pub enum CpuError {
    #[error("Undecoded instruction at 0x{addr:08x}: 0x{word:08x}")]
    UndecodedInstruction { addr: u32, word: u32 },

    #[error("Unimplemented handler for {name}")]
    UnimplementedHandler { name: &'static str },

    #[error("Unimplemented kernel function {name}")]
    UnimplementedSyscall { name: String },

    #[error("JIT compliance divergence at 0x{addr:08x}:\n{report}")]
    ComplianceDivergence { addr: u32, report: String },

    #[error("Breakpoint at 0x{addr:08x}")]
    Breakpoint { addr: u32 },
}

/// Result type alias for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;
