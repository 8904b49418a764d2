//! Transaction processor (one per bank)
//!
//! Each bank gets a dispatch thread and a fixed-size worker pool:
//!
//! ```text
//! bank queue ──take──► dispatch loop ──submit──► worker pool
//!                                                  │
//!                           validation gate ◄──────┤
//!                           account registry ◄─────┤
//!                           audit exporter ◄───────┘
//! ```
//!
//! The dispatch loop never waits for a transaction to finish; processing is
//! fully asynchronous inside the pool, so transactions of one bank may
//! complete out of queue order.
//!
//! # Worker Outcomes
//!
//! | Situation | Status | Exported |
//! |-----------|--------|----------|
//! | source account unknown | FAILED (`MissingSourceAccount`) | no |
//! | rejected by the gate | FAILED | no |
//! | insufficient funds | FAILED (`InsufficientFunds`) | yes, failed file |
//! | transfer target unknown | FAILED (`MissingTargetAccount`) | yes, failed file |
//! | credit would overflow | FAILED (`BalanceOverflow`) | yes, failed file |
//! | applied | COMPLETED | yes |
//!
//! The gate marks a transaction `Completed` when it passes; the account stage
//! can only narrow that to `Failed`.

pub mod pool;

pub use pool::{PoolError, ShutdownReport, WorkerPool};

use crate::core::CancellationToken;
use crate::export::AuditExporter;
use crate::models::{AccountRegistry, FailureReason, Transaction, TransactionType};
use crate::queue::QueueError;
use crate::routing::BankQueue;
use crate::validation::ValidationGate;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a worker did with one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Source account unknown; nothing applied or exported
    Dropped,

    /// Failed validation; nothing applied or exported
    Rejected,

    /// Reached the account stage; the transaction carries its final status
    Applied {
        /// False when the audit write failed
        exported: bool,
    },
}

/// Live counters for one processor
#[derive(Debug, Default)]
pub struct ProcessorStats {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    export_errors: AtomicU64,
    last_processed: AtomicI64,
}

/// Point-in-time copy of [`ProcessorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub export_errors: u64,
    /// Amount of the last transaction that reached the account stage
    pub last_processed: i64,
}

impl ProcessorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
            export_errors: self.export_errors.load(Ordering::SeqCst),
            last_processed: self.last_processed.load(Ordering::SeqCst),
        }
    }

    fn record(&self, outcome: ProcessOutcome, tx: &Transaction) {
        let counter = match outcome {
            ProcessOutcome::Dropped => &self.dropped,
            ProcessOutcome::Rejected => &self.rejected,
            ProcessOutcome::Applied { .. } if tx.is_completed() => &self.completed,
            ProcessOutcome::Applied { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        if let ProcessOutcome::Applied { exported } = outcome {
            self.last_processed.store(tx.amount(), Ordering::SeqCst);
            if !exported {
                self.export_errors.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Everything a worker needs, shared by all workers of every bank
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub registry: Arc<AccountRegistry>,
    pub gate: Arc<ValidationGate>,
    pub exporter: AuditExporter,
}

/// Validate, apply and export one transaction
///
/// Runs on a pool thread in production; callable directly in tests.
/// Export failures are logged and never undo the account mutation.
pub fn process_transaction(
    tx: &mut Transaction,
    bank: &str,
    ctx: &WorkerContext,
) -> ProcessOutcome {
    let Some(account) = ctx.registry.get(tx.account_id()) else {
        warn!(bank, tx_id = %tx.id(), account = %tx.account_id(), "FAILED: source account not found, transaction dropped");
        tx.fail(FailureReason::MissingSourceAccount);
        return ProcessOutcome::Dropped;
    };

    if !ctx.gate.validate(tx) {
        warn!(bank, tx_id = %tx.id(), "FAILED validation, not exported: {}", tx);
        return ProcessOutcome::Rejected;
    }

    match tx.transaction_type() {
        TransactionType::Deposit => {
            if let Err(err) = account.deposit(tx.amount()) {
                warn!(bank, tx_id = %tx.id(), %err, "FAILED deposit");
                tx.fail(FailureReason::BalanceOverflow);
            }
        }
        TransactionType::Withdrawal => account.withdraw(tx),
        TransactionType::Transfer => match tx.target_account_id().map(str::to_string) {
            Some(target) => {
                ctx.registry.transfer(account.id(), &target, tx);
            }
            None => tx.fail(FailureReason::MissingTargetAccount),
        },
    }

    if tx.is_failed() {
        warn!(bank, tx_id = %tx.id(), reason = ?tx.failure_reason(), "FAILED: {}", tx);
    } else {
        info!(bank, tx_id = %tx.id(), "Processed: {}", tx);
    }

    let exported = match ctx.exporter.export_transaction(tx, bank) {
        Ok(_) => true,
        Err(err) => {
            error!(bank, tx_id = %tx.id(), %err, "Export failed");
            false
        }
    };
    ProcessOutcome::Applied { exported }
}

/// Marks one queue item done when dropped
struct TaskDone(BankQueue);

impl Drop for TaskDone {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

/// Dispatch loop and worker pool for one bank
pub struct TransactionProcessor {
    bank: String,
    queue: BankQueue,
    pool: WorkerPool,
    ctx: WorkerContext,
    stats: Arc<ProcessorStats>,
    token: CancellationToken,
}

impl TransactionProcessor {
    /// Processor for `bank` with `workers` pool threads
    pub fn new(
        bank: impl Into<String>,
        queue: BankQueue,
        workers: usize,
        ctx: WorkerContext,
        token: CancellationToken,
    ) -> Result<Self, PoolError> {
        let bank = bank.into();
        let pool = WorkerPool::new(&bank, workers)?;
        Ok(Self {
            bank,
            queue,
            pool,
            ctx,
            stats: Arc::new(ProcessorStats::default()),
            token,
        })
    }

    pub fn bank(&self) -> &str {
        &self.bank
    }

    pub fn queue(&self) -> &BankQueue {
        &self.queue
    }

    pub fn stats(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.stats)
    }

    /// Hand one transaction to the pool
    ///
    /// The queue slot is released when the job finishes, panics, or is
    /// dropped unstarted.
    pub fn dispatch(&self, mut tx: Transaction) -> Result<(), PoolError> {
        let bank = self.bank.clone();
        let ctx = self.ctx.clone();
        let stats = Arc::clone(&self.stats);
        let done = TaskDone(Arc::clone(&self.queue));

        self.stats.dispatched.fetch_add(1, Ordering::SeqCst);
        self.pool.submit(move || {
            let _done = done;
            let outcome = process_transaction(&mut tx, &bank, &ctx);
            stats.record(outcome, &tx);
        })
    }

    /// Take from the bank queue and dispatch until cancelled
    pub fn run(&self) {
        info!(bank = %self.bank, workers = self.pool.size(), "Processor started");
        while !self.token.is_cancelled() {
            let tx = match self.queue.take(&self.token) {
                Ok(tx) => tx,
                Err(QueueError::Cancelled) => break,
            };
            debug!(bank = %self.bank, tx_id = %tx.id(), "Dequeued: {}", tx);
            if let Err(err) = self.dispatch(tx) {
                error!(bank = %self.bank, %err, "Dispatch failed");
                break;
            }
        }
        info!(bank = %self.bank, "Processor dispatch loop stopped");
    }

    /// Run the dispatch loop on a thread named `<bank>-dispatch`
    pub fn spawn(self) -> std::io::Result<ProcessorHandle> {
        let bank = self.bank.clone();
        let stats = Arc::clone(&self.stats);
        let queue = Arc::clone(&self.queue);
        let token = self.token.clone();
        let thread = std::thread::Builder::new()
            .name(format!("{}-dispatch", bank))
            .spawn(move || {
                self.run();
                self
            })?;
        Ok(ProcessorHandle {
            bank,
            stats,
            queue,
            token,
            thread: Some(thread),
        })
    }

    /// Stop accepting work and shut the pool down
    ///
    /// Transactions still waiting in the bank queue are left there.
    pub fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.token.cancel();
        let report = self.pool.shutdown(grace);
        info!(bank = %self.bank, ?report, "Processor shut down");
        report
    }
}

impl std::fmt::Debug for TransactionProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionProcessor")
            .field("bank", &self.bank)
            .field("pool", &self.pool)
            .finish()
    }
}

/// A processor running on its own dispatch thread
#[derive(Debug)]
pub struct ProcessorHandle {
    bank: String,
    stats: Arc<ProcessorStats>,
    queue: BankQueue,
    token: CancellationToken,
    thread: Option<JoinHandle<TransactionProcessor>>,
}

impl ProcessorHandle {
    pub fn bank(&self) -> &str {
        &self.bank
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn queue(&self) -> &BankQueue {
        &self.queue
    }

    /// Wait until everything routed to this bank so far has been processed
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.queue.join(timeout)
    }

    /// Cancel the dispatch loop, join it, then shut the pool down
    pub fn stop(mut self, grace: Duration) -> ShutdownReport {
        self.token.cancel();
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(processor)) => processor.shutdown(grace),
            Some(Err(_)) => {
                error!(bank = %self.bank, "Dispatch thread panicked");
                ShutdownReport::Forced {
                    discarded: 0,
                    detached: 0,
                }
            }
            None => ShutdownReport::Graceful,
        }
    }
}
