//! Bank Simulator Core
//!
//! Concurrent simulation of bank transactions across independent banks,
//! each with a bounded inbound queue and its own worker pool.
//!
//! # Architecture
//!
//! - **models**: Domain types (Transaction, Account, AccountRegistry)
//! - **arrivals**: Random transaction generation
//! - **queue**: Blocking FIFO used for bank queues and the output channel
//! - **routing**: Per-bank bounded queues (backpressure)
//! - **processor**: Per-bank dispatch loop and worker pool
//! - **validation**: Third-party validation gate
//! - **export**: JSON audit files
//! - **orchestrator**: The simulation cycle loop
//! - **display**: Interfaces consumed by a display shell
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64
//! 2. Every balance access happens under that account's own lock
//! 3. Transfers lock both accounts in ascending ID order (no deadlock)
//! 4. A bank queue never holds more than its capacity

// Module declarations
pub mod arrivals;
pub mod core;
pub mod display;
pub mod export;
pub mod models;
pub mod orchestrator;
pub mod processor;
pub mod queue;
pub mod rng;
pub mod routing;
pub mod validation;

// Re-exports for convenience
pub use arrivals::{GeneratorError, TransactionGenerator};
pub use core::CancellationToken;
pub use display::{BalanceConsumer, OutputChannel, SharedTotal};
pub use export::{AuditExporter, ExportError, ExportRecord};
pub use models::{
    account::{Account, AccountError},
    registry::AccountRegistry,
    transaction::{
        FailureReason, Transaction, TransactionError, TransactionStatus, TransactionType,
    },
};
pub use orchestrator::{
    CycleReport, Orchestrator, SimulationConfig, SimulationError, SimulationRunner,
};
pub use processor::{process_transaction, ProcessOutcome, TransactionProcessor, WorkerContext};
pub use queue::{BlockingQueue, QueueError};
pub use rng::RngManager;
pub use routing::{BankRouter, RoutingError};
pub use validation::{ValidationGate, ValidationRule};
