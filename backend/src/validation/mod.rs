//! Validation gate (third-party monitor)
//!
//! Every transaction passes through the gate before it touches an account.
//! The gate runs an ordered list of [`ValidationRule`]s; the first rejection
//! marks the transaction `Failed`, otherwise it is marked `Completed`.
//!
//! # Policy Interface
//!
//! Rules are the single extension point for new checks (fees, fraud
//! screening, limits). A rule can only narrow: it may reject, it can never
//! revive a transaction that already failed.
//!
//! ```rust
//! use bank_sim_core::validation::{ValidationGate, ValidationRule};
//! use bank_sim_core::{FailureReason, Transaction, TransactionStatus, TransactionType};
//!
//! struct NoRoundAmounts;
//!
//! impl ValidationRule for NoRoundAmounts {
//!     fn name(&self) -> &str {
//!         "no_round_amounts"
//!     }
//!
//!     fn check(&self, tx: &Transaction) -> Result<(), FailureReason> {
//!         if tx.amount() % 100 == 0 {
//!             return Err(FailureReason::Rejected("round amount".to_string()));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let gate = ValidationGate::new().with_rule(NoRoundAmounts);
//! let mut tx = Transaction::new("Account_1".to_string(), 300, TransactionType::Deposit).unwrap();
//! gate.validate(&mut tx);
//! assert_eq!(tx.status(), TransactionStatus::Failed);
//! ```

use crate::models::{FailureReason, Transaction};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// A single validation check
pub trait ValidationRule: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// `Err` rejects the transaction with the given reason
    fn check(&self, tx: &Transaction) -> Result<(), FailureReason>;
}

/// Rejects zero and negative amounts
#[derive(Debug, Clone, Copy, Default)]
pub struct PositiveAmount;

impl ValidationRule for PositiveAmount {
    fn name(&self) -> &str {
        "positive_amount"
    }

    fn check(&self, tx: &Transaction) -> Result<(), FailureReason> {
        if tx.amount() <= 0 {
            return Err(FailureReason::InvalidAmount);
        }
        Ok(())
    }
}

/// Rejects amounts above a fixed limit
#[derive(Debug, Clone, Copy)]
pub struct MaxAmount(pub i64);

impl ValidationRule for MaxAmount {
    fn name(&self) -> &str {
        "max_amount"
    }

    fn check(&self, tx: &Transaction) -> Result<(), FailureReason> {
        if tx.amount() > self.0 {
            return Err(FailureReason::Rejected(format!(
                "amount {} exceeds limit {}",
                tx.amount(),
                self.0
            )));
        }
        Ok(())
    }
}

/// Serialized rule pipeline shared by every processor
///
/// The rule list sits behind a mutex that is held for the whole of
/// `validate`, so at most one validation runs at a time across the system.
pub struct ValidationGate {
    rules: Mutex<Vec<Box<dyn ValidationRule>>>,
}

impl ValidationGate {
    /// Gate with only the [`PositiveAmount`] rule installed
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(vec![Box::new(PositiveAmount)]),
        }
    }

    /// Append a rule; rules run in insertion order
    pub fn with_rule(self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.lock().push(Box::new(rule));
        self
    }

    /// Names of the installed rules, in order
    pub fn rule_names(&self) -> Vec<String> {
        self.rules
            .lock()
            .iter()
            .map(|rule| rule.name().to_string())
            .collect()
    }

    /// Run every rule against `tx` and record the verdict on it
    ///
    /// Returns `true` when the transaction is left `Completed`.
    pub fn validate(&self, tx: &mut Transaction) -> bool {
        let rules = self.rules.lock();
        debug!(tx_id = %tx.id(), "Monitoring transaction: {}", tx);

        if tx.is_failed() {
            return false;
        }

        for rule in rules.iter() {
            if let Err(reason) = rule.check(tx) {
                warn!(tx_id = %tx.id(), rule = rule.name(), %reason, "Invalid transaction: {}", tx);
                tx.fail(reason);
                return false;
            }
        }

        if tx.complete().is_err() {
            // Already completed by an earlier pass; nothing to narrow.
            return tx.is_completed();
        }
        debug!(tx_id = %tx.id(), "Transaction accepted");
        true
    }
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationGate")
            .field("rules", &self.rule_names())
            .finish()
    }
}
