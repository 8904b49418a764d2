//! Audit exporter
//!
//! Appends processed transactions to per-bank JSON array files:
//!
//! - `<bank>_transactions.json` for completed transactions
//! - `<bank>_failed_transactions.json` for failed ones
//!
//! Each append reads the whole array, pushes one record and rewrites the
//! file (through a uniquely named temporary sibling and a rename). That caps
//! throughput at low volumes; it is not a durability guarantee.
//!
//! # Critical Invariants
//!
//! 1. Appends are serialized across every exporter in the process that
//!    writes to the same directory, whether cloned or built separately.
//! 2. A missing or blank file reads as an empty array.
//! 3. A file that does not parse is never overwritten.

use crate::models::{Transaction, TransactionStatus, TransactionType};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error};

/// Timestamp layout of exported records (ISO-8601 local date-time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Cannot export a {0} transaction")]
    NotTerminal(TransactionStatus),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed export file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One exported transaction, as stored in the JSON arrays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub account_id: String,
    pub amount: i64,
    pub timestamp: String,
    pub transaction_type: TransactionType,
    pub target_account_id: Option<String>,
    pub status: TransactionStatus,
}

impl From<&Transaction> for ExportRecord {
    fn from(tx: &Transaction) -> Self {
        ExportRecord {
            account_id: tx.account_id().to_string(),
            amount: tx.amount(),
            timestamp: tx.timestamp().format(TIMESTAMP_FORMAT).to_string(),
            transaction_type: tx.transaction_type(),
            target_account_id: match tx.transaction_type() {
                TransactionType::Transfer => tx.target_account_id().map(str::to_string),
                _ => None,
            },
            status: tx.status(),
        }
    }
}

/// Export file name for a bank and terminal status
pub fn export_file_name(bank: &str, status: TransactionStatus) -> String {
    match status {
        TransactionStatus::Failed => format!("{}_failed_transactions.json", bank),
        _ => format!("{}_transactions.json", bank),
    }
}

/// Read every record from an export file
///
/// Missing and blank files yield an empty list.
pub fn read_records(path: &Path) -> Result<Vec<ExportRecord>, ExportError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ExportError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })
}

lazy_static! {
    /// One write lock per export directory, keyed by canonical path
    static ref DIR_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

fn lock_for_dir(dir: &Path) -> Arc<Mutex<()>> {
    let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    Arc::clone(DIR_LOCKS.lock().entry(key).or_default())
}

/// Appends transactions to JSON audit files in one directory
///
/// Every exporter for the same directory shares one write lock, so separately
/// constructed exporters never interleave their read-modify-write cycles.
#[derive(Debug, Clone)]
pub struct AuditExporter {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl AuditExporter {
    /// Exporter writing into `dir`, which is created if missing
    ///
    /// A directory that cannot be created is logged; the failure shows up
    /// again as an I/O error on the first export.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            error!(dir = %dir.display(), %err, "Cannot create export directory");
        }
        let write_lock = lock_for_dir(&dir);
        Self { dir, write_lock }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file a `status` transaction of `bank` goes to
    pub fn path_for(&self, bank: &str, status: TransactionStatus) -> PathBuf {
        self.dir.join(export_file_name(bank, status))
    }

    /// Append `tx` to the completed or failed file of `bank`
    ///
    /// Returns the path written.
    pub fn export_transaction(&self, tx: &Transaction, bank: &str) -> Result<PathBuf, ExportError> {
        if !tx.status().is_terminal() {
            return Err(ExportError::NotTerminal(tx.status()));
        }
        let path = self.path_for(bank, tx.status());
        let record = ExportRecord::from(tx);

        let _guard = self.write_lock.lock();
        let mut records = read_records(&path)?;
        records.push(record);
        write_records(&path, &records)?;

        debug!(bank, tx_id = %tx.id(), path = %path.display(), "Exported transaction");
        Ok(path)
    }
}

fn write_records(path: &Path, records: &[ExportRecord]) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(records).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}
