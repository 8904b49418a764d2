//! Orchestrator - the simulation cycle loop
//!
//! See `engine.rs` for the cycle itself, `config.rs` for its settings and
//! `runner.rs` for running it on a background thread.

pub mod config;
pub mod engine;
pub mod runner;

// Re-export main types for convenience
pub use config::{AccountConfig, BankConfig, ConfigError, SimulationConfig, ValidationConfig};
pub use engine::{CycleReport, Orchestrator, SimulationError};
pub use runner::{RunnerHandle, SimulationRunner};
