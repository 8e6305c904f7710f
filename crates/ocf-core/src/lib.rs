//! Core types for the oxidized-cafe Wii U emulator
//!
//! This crate provides the foundational types, error handling,
//! configuration, and logging infrastructure shared by the other crates.

pub mod bits;
pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{EmulatorError, Result};
