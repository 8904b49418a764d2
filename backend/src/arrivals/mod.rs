//! Transaction generator
//!
//! Synthesises random transactions against the known accounts and parks them
//! in an internal buffer until the orchestrator drains it.
//!
//! # Key Principles
//!
//! 1. **Single logical lock**: the account list, RNG and buffer live behind
//!    one mutex, so generation and draining never interleave.
//! 2. **Determinism**: same seed + same accounts → same transaction stream.
//! 3. **Distinct transfer endpoints**: a transfer target is resampled until
//!    it differs from the source.
//!
//! # Example
//!
//! ```
//! use bank_sim_core::arrivals::TransactionGenerator;
//! use bank_sim_core::RngManager;
//!
//! let generator = TransactionGenerator::new(
//!     vec!["Account_1".to_string(), "Account_2".to_string()],
//!     RngManager::new(42),
//! )
//! .unwrap();
//!
//! generator.generate_random_transaction();
//! generator.generate_random_transaction();
//!
//! let batch = generator.retrieve_and_clear_buffer();
//! assert_eq!(batch.len(), 2);
//! assert_eq!(generator.buffered(), 0);
//! ```

use crate::models::{Transaction, TransactionType};
use crate::rng::RngManager;
use parking_lot::Mutex;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Smallest generated amount (inclusive)
pub const MIN_AMOUNT: i64 = 50;

/// Largest generated amount (inclusive)
pub const MAX_AMOUNT: i64 = 500;

#[derive(Debug, Error, PartialEq)]
pub enum GeneratorError {
    #[error("Transaction generator needs at least one account")]
    NoAccounts,
}

struct GeneratorState {
    account_ids: Vec<String>,
    rng: RngManager,
    buffer: Vec<Transaction>,
}

/// Random transaction source with an internal buffer
pub struct TransactionGenerator {
    state: Mutex<GeneratorState>,
}

impl TransactionGenerator {
    /// Create a generator over `account_ids`
    ///
    /// Repeated IDs are collapsed, keeping the first occurrence.
    pub fn new(mut account_ids: Vec<String>, rng: RngManager) -> Result<Self, GeneratorError> {
        let mut seen = HashSet::new();
        account_ids.retain(|id| seen.insert(id.clone()));
        if account_ids.is_empty() {
            return Err(GeneratorError::NoAccounts);
        }
        Ok(Self {
            state: Mutex::new(GeneratorState {
                account_ids,
                rng,
                buffer: Vec::new(),
            }),
        })
    }

    /// Generate one transaction and append it to the buffer
    ///
    /// - Source: uniform over the accounts
    /// - Type: uniform over the three kinds (transfers only when there are
    ///   at least two accounts)
    /// - Amount: uniform in `[MIN_AMOUNT, MAX_AMOUNT]`
    ///
    /// Returns a copy of the buffered transaction.
    pub fn generate_random_transaction(&self) -> Transaction {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let count = state.account_ids.len();
        let from = state.account_ids[state.rng.index(count)].clone();

        let kinds: &[TransactionType] = if count > 1 {
            &TransactionType::ALL
        } else {
            &TransactionType::ALL[..2]
        };
        let kind = kinds[state.rng.index(kinds.len())];
        let amount = state.rng.range_inclusive(MIN_AMOUNT, MAX_AMOUNT);

        let target = (kind == TransactionType::Transfer).then(|| loop {
            let candidate = &state.account_ids[state.rng.index(count)];
            if *candidate != from {
                break candidate.clone();
            }
        });
        let tx = Transaction::build(from, target, amount, kind);

        debug!(tx_id = %tx.id(), "Generated transaction: {}", tx);
        state.buffer.push(tx.clone());
        tx
    }

    /// Take every buffered transaction, leaving the buffer empty
    pub fn retrieve_and_clear_buffer(&self) -> Vec<Transaction> {
        std::mem::take(&mut self.state.lock().buffer)
    }

    /// Number of transactions waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Account IDs this generator draws from
    pub fn account_ids(&self) -> Vec<String> {
        self.state.lock().account_ids.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_accounts_rejected() {
        let result = TransactionGenerator::new(Vec::new(), RngManager::new(1));
        assert_eq!(result.err(), Some(GeneratorError::NoAccounts));
    }

    #[test]
    fn test_repeated_ids_collapse_to_distinct_accounts() {
        let generator = TransactionGenerator::new(
            vec!["A".to_string(), "A".to_string()],
            RngManager::new(9),
        )
        .unwrap();
        assert_eq!(generator.account_ids(), vec!["A".to_string()]);
        for _ in 0..200 {
            let tx = generator.generate_random_transaction();
            assert_ne!(tx.transaction_type(), TransactionType::Transfer);
            assert_eq!(tx.account_id(), "A");
        }
    }

    #[test]
    fn test_single_account_never_transfers() {
        let generator =
            TransactionGenerator::new(vec!["Solo".to_string()], RngManager::new(3)).unwrap();
        for _ in 0..500 {
            let tx = generator.generate_random_transaction();
            assert_ne!(tx.transaction_type(), TransactionType::Transfer);
        }
    }

    #[test]
    fn test_same_seed_same_stream() {
        let ids = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let first = TransactionGenerator::new(ids.clone(), RngManager::new(42)).unwrap();
        let second = TransactionGenerator::new(ids, RngManager::new(42)).unwrap();
        for _ in 0..50 {
            let a = first.generate_random_transaction();
            let b = second.generate_random_transaction();
            assert_eq!(a.account_id(), b.account_id());
            assert_eq!(a.target_account_id(), b.target_account_id());
            assert_eq!(a.amount(), b.amount());
            assert_eq!(a.transaction_type(), b.transaction_type());
        }
    }
}
