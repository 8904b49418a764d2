//! Orchestrator engine
//!
//! Drives the simulation as a repeating cycle:
//!
//! ```text
//! For each cycle:
//! 1. Seed every account with its starting deposit
//! 2. Generate N transactions, pausing after each (rate-limits generation only)
//! 3. Drain the generator buffer and route each transaction to its bank queue
//!    (blocks on backpressure)
//! 4. Sleep the settle interval while processors drain their queues
//! 5. Snapshot every balance into the output channel, then reset balances
//! ```
//!
//! The orchestrator is the only component that resets balances.
//!
//! # Example
//!
//! ```rust,no_run
//! use bank_sim_core::orchestrator::{Orchestrator, SimulationConfig};
//!
//! let mut orchestrator = Orchestrator::new(SimulationConfig::default()).unwrap();
//! orchestrator.start_processors().unwrap();
//!
//! let report = orchestrator.run_cycle().unwrap();
//! println!("cycle {}: routed {}", report.cycle, report.routed);
//!
//! orchestrator.shutdown();
//! ```

use crate::arrivals::{GeneratorError, TransactionGenerator};
use crate::core::CancellationToken;
use crate::display::OutputChannel;
use crate::export::AuditExporter;
use crate::models::{Account, AccountRegistry};
use crate::orchestrator::config::{ConfigError, SimulationConfig};
use crate::processor::{
    PoolError, ProcessorHandle, ShutdownReport, StatsSnapshot, TransactionProcessor, WorkerContext,
};
use crate::queue::{BlockingQueue, QueueError};
use crate::rng::RngManager;
use crate::routing::{BankRouter, RoutingError};
use crate::validation::{MaxAmount, ValidationGate};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while building or running a simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Processors already started")]
    AlreadyStarted,

    #[error("Simulation cancelled")]
    Cancelled,

    #[error("Simulation thread panicked")]
    Panicked,
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: usize,
    pub generated: usize,
    pub routed: usize,
    /// Transactions whose account or bank could not be resolved
    pub unroutable: usize,
    /// (account ID, balance) right before the reset, in account ID order
    pub balances: Vec<(String, i64)>,
}

/// Owns every simulation component and runs the cycle loop
pub struct Orchestrator {
    config: SimulationConfig,
    registry: Arc<AccountRegistry>,
    router: BankRouter,
    generator: TransactionGenerator,
    output: OutputChannel,
    token: CancellationToken,
    pending: Vec<TransactionProcessor>,
    running: Vec<ProcessorHandle>,
    cycles: usize,
}

impl Orchestrator {
    /// Build every component from `config`
    ///
    /// Processors are created here but their dispatch threads only start
    /// with [`Orchestrator::start_processors`].
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        Self::with_token(config, CancellationToken::new())
    }

    /// Like [`Orchestrator::new`] but observing an existing token
    pub fn with_token(
        config: SimulationConfig,
        token: CancellationToken,
    ) -> Result<Self, SimulationError> {
        config.validate()?;

        let registry = Arc::new(AccountRegistry::new(
            config
                .accounts
                .iter()
                .map(|account| Account::new(account.id.clone(), account.bank.clone())),
        ));

        let mut gate = ValidationGate::new();
        if let Some(limit) = config.validation.max_amount {
            gate = gate.with_rule(MaxAmount(limit));
        }
        let ctx = WorkerContext {
            registry: Arc::clone(&registry),
            gate: Arc::new(gate),
            exporter: AuditExporter::new(config.export_dir.clone()),
        };

        let mut router = BankRouter::new();
        let mut pending = Vec::with_capacity(config.banks.len());
        for bank in &config.banks {
            let queue = router.add_bank(bank.name.clone(), bank.queue_capacity);
            pending.push(TransactionProcessor::new(
                bank.name.clone(),
                queue,
                bank.workers,
                ctx.clone(),
                token.child(),
            )?);
        }

        let rng = match config.rng_seed {
            Some(seed) => RngManager::new(seed),
            None => RngManager::from_entropy(),
        };
        let generator = TransactionGenerator::new(registry.ids(), rng)?;

        info!(
            banks = config.banks.len(),
            accounts = config.accounts.len(),
            export_dir = %config.export_dir.display(),
            "Simulation initialized"
        );

        Ok(Self {
            config,
            registry,
            router,
            generator,
            output: Arc::new(BlockingQueue::unbounded()),
            token,
            pending,
            running: Vec::new(),
            cycles: 0,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &BankRouter {
        &self.router
    }

    pub fn generator(&self) -> &TransactionGenerator {
        &self.generator
    }

    /// Shared handle to the balance snapshot channel
    pub fn output_channel(&self) -> OutputChannel {
        Arc::clone(&self.output)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Completed cycles so far
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Per-bank processor counters (empty before `start_processors`)
    pub fn processor_stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.running
            .iter()
            .map(|handle| (handle.bank().to_string(), handle.stats()))
            .collect()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start one dispatch thread per bank
    pub fn start_processors(&mut self) -> Result<(), SimulationError> {
        if self.pending.is_empty() {
            return Err(SimulationError::AlreadyStarted);
        }
        for processor in self.pending.drain(..) {
            self.running.push(processor.spawn()?);
        }
        Ok(())
    }

    /// Wait until every routed transaction has been processed
    ///
    /// Not part of the cycle itself; useful before inspecting balances.
    pub fn wait_idle(&self, timeout: std::time::Duration) -> bool {
        self.running.iter().all(|handle| handle.wait_idle(timeout))
    }

    /// Run one full cycle
    pub fn run_cycle(&mut self) -> Result<CycleReport, SimulationError> {
        let cycle = self.cycles + 1;
        info!(cycle, "New simulation cycle started");

        self.seed_balances();

        let mut generated = 0;
        for _ in 0..self.config.transactions_per_cycle {
            self.generator.generate_random_transaction();
            generated += 1;
            if !self.token.sleep(self.config.generation_interval()) {
                return Err(SimulationError::Cancelled);
            }
        }

        let batch = self.generator.retrieve_and_clear_buffer();
        let mut routed = 0;
        let mut unroutable = 0;
        for tx in batch {
            debug!(tx_id = %tx.id(), "Generated: {}", tx);
            match self.router.route(tx, &self.registry, &self.token) {
                Ok(()) => routed += 1,
                Err(RoutingError::Cancelled) => return Err(SimulationError::Cancelled),
                Err(err) => {
                    warn!(cycle, %err, "Transaction could not be routed");
                    unroutable += 1;
                }
            }
        }

        for bank in self.router.banks() {
            for tx in self.router.waiting_transactions(bank) {
                debug!(bank, tx_id = %tx.id(), "Waiting: {}", tx);
            }
        }

        if !self.token.sleep(self.config.settle_interval()) {
            return Err(SimulationError::Cancelled);
        }

        let balances = self.snapshot_and_reset()?;
        self.cycles = cycle;
        Ok(CycleReport {
            cycle,
            generated,
            routed,
            unroutable,
            balances,
        })
    }

    /// Run cycles until cancelled, or until `max_cycles` when given
    pub fn run(&mut self, max_cycles: Option<usize>) -> Result<usize, SimulationError> {
        let mut completed = 0;
        while max_cycles.map_or(true, |max| completed < max) {
            match self.run_cycle() {
                Ok(_) => completed += 1,
                Err(SimulationError::Cancelled) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(completed)
    }

    /// Cancel everything and shut every processor down
    pub fn shutdown(&mut self) -> Vec<(String, ShutdownReport)> {
        self.token.cancel();
        let grace = self.config.shutdown_grace();
        let mut reports = Vec::new();
        for handle in self.running.drain(..) {
            let bank = handle.bank().to_string();
            reports.push((bank, handle.stop(grace)));
        }
        for processor in self.pending.drain(..) {
            let bank = processor.bank().to_string();
            reports.push((bank, processor.shutdown(grace)));
        }
        reports
    }

    fn seed_balances(&self) {
        for account in &self.config.accounts {
            if let Some(entry) = self.registry.get(&account.id) {
                if let Err(err) = entry.deposit(account.starting_deposit) {
                    warn!(account = %account.id, %err, "Starting deposit refused");
                }
            }
        }
    }

    fn snapshot_and_reset(&self) -> Result<Vec<(String, i64)>, SimulationError> {
        let mut balances = Vec::with_capacity(self.registry.len());
        for account in self.registry.accounts() {
            let balance = account.take_balance();
            info!(account = %account.id(), balance, "Current balance");
            balances.push((account.id().to_string(), balance));
        }
        for (_, balance) in &balances {
            self.output.put(*balance, &self.token).map_err(|err| match err {
                QueueError::Cancelled => SimulationError::Cancelled,
            })?;
        }
        Ok(balances)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cycles", &self.cycles)
            .field("banks", &self.router.banks().collect::<Vec<_>>())
            .field("accounts", &self.registry.ids())
            .finish()
    }
}
