//! Domain models for the bank simulator

pub mod account;
pub mod registry;
pub mod transaction;

// Re-exports
pub use account::{Account, AccountError};
pub use registry::AccountRegistry;
pub use transaction::{
    FailureReason, Transaction, TransactionError, TransactionStatus, TransactionType,
};
