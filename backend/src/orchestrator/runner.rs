//! Background runner
//!
//! Starts a simulation on its own thread so the caller (a display shell, the
//! CLI) stays free to consume the output channel.

use crate::core::CancellationToken;
use crate::display::OutputChannel;
use crate::orchestrator::config::SimulationConfig;
use crate::orchestrator::engine::{Orchestrator, SimulationError};
use std::thread::JoinHandle;
use tracing::{error, info};

/// Name of the thread running the cycle loop
pub const RUNNER_THREAD_NAME: &str = "bank-simulator";

/// Builds an orchestrator and runs it in the background
#[derive(Debug, Clone, Default)]
pub struct SimulationRunner {
    config: SimulationConfig,
    max_cycles: Option<usize>,
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            max_cycles: None,
        }
    }

    /// Stop after `cycles` cycles instead of running forever
    pub fn with_max_cycles(mut self, cycles: usize) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Build the simulation, start its processors, and run the cycle loop
    /// on a dedicated thread
    ///
    /// Configuration and startup errors are returned here; errors inside the
    /// loop surface from [`RunnerHandle::stop_and_join`].
    pub fn start(self) -> Result<RunnerHandle, SimulationError> {
        let mut orchestrator = Orchestrator::new(self.config)?;
        orchestrator.start_processors()?;

        let output = orchestrator.output_channel();
        let token = orchestrator.cancellation_token();
        let max_cycles = self.max_cycles;

        let thread = std::thread::Builder::new()
            .name(RUNNER_THREAD_NAME.to_string())
            .spawn(move || {
                let result = orchestrator.run(max_cycles);
                match &result {
                    Ok(cycles) => info!(cycles, "Simulation loop finished"),
                    Err(err) => error!(%err, "Simulation loop failed"),
                }
                orchestrator.shutdown();
                result
            })?;

        Ok(RunnerHandle {
            output,
            token,
            thread,
        })
    }
}

/// Handle to a running simulation
#[derive(Debug)]
pub struct RunnerHandle {
    output: OutputChannel,
    token: CancellationToken,
    thread: JoinHandle<Result<usize, SimulationError>>,
}

impl RunnerHandle {
    /// Balance snapshots produced by the running simulation
    pub fn output_channel(&self) -> OutputChannel {
        self.output.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to end on its own (only with a cycle limit)
    pub fn join(self) -> Result<usize, SimulationError> {
        self.thread
            .join()
            .unwrap_or(Err(SimulationError::Panicked))
    }

    /// Cancel the simulation and wait for its thread
    ///
    /// Returns the number of completed cycles.
    pub fn stop_and_join(self) -> Result<usize, SimulationError> {
        self.token.cancel();
        self.join()
    }
}
