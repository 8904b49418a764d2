//! Simulation configuration
//!
//! Every field has a default matching the reference setup, so a JSON file
//! only needs to list what it changes:
//!
//! ```json
//! {
//!   "settle_interval_ms": 500,
//!   "rng_seed": 7,
//!   "validation": { "max_amount": 450 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("At least one bank is required")]
    NoBanks,

    #[error("At least one account is required")]
    NoAccounts,

    #[error("Duplicate bank {0}")]
    DuplicateBank(String),

    #[error("Duplicate account {0}")]
    DuplicateAccount(String),

    #[error("Account {account} references unknown bank {bank}")]
    UnknownBank { account: String, bank: String },

    #[error("Bank {0} needs a queue capacity above zero")]
    ZeroCapacity(String),

    #[error("Bank {0} needs at least one worker")]
    ZeroWorkers(String),
}

/// Per-bank configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfig {
    pub name: String,

    /// Bound of the bank's inbound queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Size of the bank's worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl BankConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
        }
    }
}

/// Per-account configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub bank: String,

    /// Deposited at the start of every cycle
    #[serde(default)]
    pub starting_deposit: i64,
}

impl AccountConfig {
    pub fn new(id: impl Into<String>, bank: impl Into<String>, starting_deposit: i64) -> Self {
        Self {
            id: id.into(),
            bank: bank.into(),
            starting_deposit,
        }
    }
}

/// Extra validation gate rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject amounts above this limit
    #[serde(default)]
    pub max_amount: Option<i64>,
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub banks: Vec<BankConfig>,
    pub accounts: Vec<AccountConfig>,

    /// Transactions generated per cycle
    pub transactions_per_cycle: usize,

    /// Pause after each generated transaction
    pub generation_interval_ms: u64,

    /// Pause between routing and snapshotting
    pub settle_interval_ms: u64,

    /// How long pool shutdown waits before forcing
    pub shutdown_grace_ms: u64,

    /// Fixed RNG seed; random when absent
    pub rng_seed: Option<u64>,

    /// Directory receiving the JSON audit files
    pub export_dir: PathBuf,

    pub validation: ValidationConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            banks: vec![BankConfig::new("OTP"), BankConfig::new("KH")],
            accounts: vec![
                AccountConfig::new("Account_1", "OTP", 1000),
                AccountConfig::new("Account_2", "KH", 1000),
                AccountConfig::new("Account_3", "OTP", 501),
            ],
            transactions_per_cycle: 5,
            generation_interval_ms: 1000,
            settle_interval_ms: 2000,
            shutdown_grace_ms: 60_000,
            rng_seed: None,
            export_dir: PathBuf::from("exports"),
            validation: ValidationConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn generation_interval(&self) -> Duration {
        Duration::from_millis(self.generation_interval_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Check structural consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.banks.is_empty() {
            return Err(ConfigError::NoBanks);
        }
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }

        let mut banks = HashSet::new();
        for bank in &self.banks {
            if !banks.insert(bank.name.as_str()) {
                return Err(ConfigError::DuplicateBank(bank.name.clone()));
            }
            if bank.queue_capacity == 0 {
                return Err(ConfigError::ZeroCapacity(bank.name.clone()));
            }
            if bank.workers == 0 {
                return Err(ConfigError::ZeroWorkers(bank.name.clone()));
            }
        }

        let mut accounts = HashSet::new();
        for account in &self.accounts {
            if !accounts.insert(account.id.as_str()) {
                return Err(ConfigError::DuplicateAccount(account.id.clone()));
            }
            if !banks.contains(account.bank.as_str()) {
                return Err(ConfigError::UnknownBank {
                    account: account.id.clone(),
                    bank: account.bank.clone(),
                });
            }
        }
        Ok(())
    }
}

fn default_queue_capacity() -> usize {
    10
}

fn default_workers() -> usize {
    4
}
