//! Bank router
//!
//! One bounded inbound queue per bank. The orchestrator routes every
//! transaction into the queue of the bank that owns its source account;
//! a full queue blocks the router until a worker frees a slot.

use crate::core::CancellationToken;
use crate::models::{AccountRegistry, Transaction};
use crate::queue::{BlockingQueue, QueueError};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Handle to one bank's inbound queue
pub type BankQueue = Arc<BlockingQueue<Transaction>>;

#[derive(Debug, Error, PartialEq)]
pub enum RoutingError {
    #[error("Account {0} is not registered")]
    UnknownAccount(String),

    #[error("No queue for bank {0}")]
    UnknownBank(String),

    #[error("Routing cancelled")]
    Cancelled,
}

impl From<QueueError> for RoutingError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Cancelled => RoutingError::Cancelled,
        }
    }
}

/// Per-bank queues keyed by bank name
#[derive(Debug, Default)]
pub struct BankRouter {
    queues: BTreeMap<String, BankQueue>,
}

impl BankRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bounded queue for `bank` and return its handle
    ///
    /// Registering the same bank twice replaces the previous queue.
    pub fn add_bank(&mut self, bank: impl Into<String>, capacity: usize) -> BankQueue {
        let queue = Arc::new(BlockingQueue::bounded(capacity));
        self.queues.insert(bank.into(), Arc::clone(&queue));
        queue
    }

    pub fn queue(&self, bank: &str) -> Option<&BankQueue> {
        self.queues.get(bank)
    }

    /// Bank names, ascending
    pub fn banks(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    /// Route `tx` to the queue of its source account's bank
    ///
    /// Blocks while that queue is full.
    pub fn route(
        &self,
        tx: Transaction,
        registry: &AccountRegistry,
        token: &CancellationToken,
    ) -> Result<(), RoutingError> {
        let bank = registry
            .bank_of(tx.account_id())
            .ok_or_else(|| RoutingError::UnknownAccount(tx.account_id().to_string()))?;
        let queue = self
            .queues
            .get(bank)
            .ok_or_else(|| RoutingError::UnknownBank(bank.to_string()))?;

        debug!(bank, tx_id = %tx.id(), "Routing transaction");
        queue.put(tx, token)?;
        Ok(())
    }

    /// Transactions currently waiting in `bank`'s queue, oldest first
    pub fn waiting_transactions(&self, bank: &str) -> Vec<Transaction> {
        self.queues
            .get(bank)
            .map(|queue| queue.snapshot())
            .unwrap_or_default()
    }

    /// Queue length per bank
    pub fn occupancy(&self) -> Vec<(String, usize)> {
        self.queues
            .iter()
            .map(|(bank, queue)| (bank.clone(), queue.len()))
            .collect()
    }
}
