//! Configuration system for the oxidized-cafe emulator

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cpu: CpuConfig,
    pub debug: DebugConfig,
}

/// CPU emulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Execution mode for the Espresso core
    pub jit_mode: JitModeSetting,
    /// Maximum number of instructions per compiled block
    pub jit_max_block: usize,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            jit_mode: JitModeSetting::default(),
            jit_max_block: 128,
        }
    }
}

/// Execution mode selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum JitModeSetting {
    /// Pure interpretation
    #[default]
    Interpreter,
    /// Recompile basic blocks on first entry
    Recompiler,
    /// Run interpreter and recompiler in lockstep, diffing state
    Compliance,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Keep an execution trace ring buffer
    pub trace: bool,
    /// Trace ring buffer capacity (records)
    pub trace_capacity: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            trace: false,
            trace_capacity: 4096,
        }
    }
}
