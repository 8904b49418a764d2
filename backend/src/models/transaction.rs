//! Transaction model
//!
//! Represents a single banking operation against one account.
//! Each transaction has:
//! - Source account ID (and a target account ID for transfers only)
//! - Amount (i64, not clamped on manual construction)
//! - Type (Deposit, Withdrawal, Transfer)
//! - Status (Pending, Completed, Failed)
//! - Creation timestamp (immutable)
//!
//! # Status Lifecycle
//!
//! ```text
//! Pending ──► Completed ──► Failed
//!    │                        ▲
//!    └────────────────────────┘
//! ```
//!
//! `Failed` is absorbing: nothing turns a failed transaction back into a
//! completed one. `Completed → Failed` happens only inside a worker, when the
//! validation gate accepted the transaction but the account rejected it.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of operation a transaction performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Credit the source account
    Deposit,

    /// Debit the source account if funds allow
    Withdrawal,

    /// Move funds from the source account to the target account
    Transfer,
}

impl TransactionType {
    /// All transaction types, in generation order
    pub const ALL: [TransactionType; 3] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::Transfer,
    ];

    /// Upper-case name used in logs and export files
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Created by the generator, not yet seen by a worker
    Pending,

    /// Accepted by the validation gate and applied to the account
    Completed,

    /// Rejected by the gate or by the account
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    /// True for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transaction ended up `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Amount was zero or negative
    InvalidAmount,

    /// Source balance lower than the amount
    InsufficientFunds,

    /// Transfer target not present in the registry
    MissingTargetAccount,

    /// Source account not present in the registry
    MissingSourceAccount,

    /// Crediting the amount would overflow a balance
    BalanceOverflow,

    /// Rejected by a custom validation rule
    Rejected(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidAmount => f.write_str("invalid amount"),
            FailureReason::InsufficientFunds => f.write_str("insufficient funds"),
            FailureReason::MissingTargetAccount => f.write_str("missing target account"),
            FailureReason::MissingSourceAccount => f.write_str("missing source account"),
            FailureReason::BalanceOverflow => f.write_str("balance overflow"),
            FailureReason::Rejected(why) => write!(f, "rejected: {}", why),
        }
    }
}

/// Errors that can occur during transaction operations
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Target account is only allowed on TRANSFER transactions, got {0}")]
    TargetNotAllowed(TransactionType),

    #[error("TRANSFER transactions need a target account")]
    MissingTarget,

    #[error("Transaction is {0}, expected PENDING")]
    NotPending(TransactionStatus),
}

/// A banking transaction
///
/// # Example
/// ```
/// use bank_sim_core::{Transaction, TransactionStatus, TransactionType};
///
/// let deposit = Transaction::new("Account_1".to_string(), 250, TransactionType::Deposit).unwrap();
/// assert_eq!(deposit.status(), TransactionStatus::Pending);
/// assert!(deposit.target_account_id().is_none());
///
/// let transfer = Transaction::transfer("Account_1".to_string(), "Account_2".to_string(), 100);
/// assert_eq!(transfer.target_account_id(), Some("Account_2"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier (UUID), used for log correlation
    id: String,

    /// Source account
    account_id: String,

    /// Target account, present iff `transaction_type` is `Transfer`
    target_account_id: Option<String>,

    amount: i64,

    transaction_type: TransactionType,

    status: TransactionStatus,

    failure_reason: Option<FailureReason>,

    /// Creation instant (local time)
    timestamp: NaiveDateTime,
}

impl Transaction {
    /// Create a deposit or withdrawal
    ///
    /// A `Transfer` type is rejected with `MissingTarget` because a
    /// transfer needs a target. Use [`Transaction::transfer`] for those.
    pub fn new(
        account_id: String,
        amount: i64,
        transaction_type: TransactionType,
    ) -> Result<Self, TransactionError> {
        if transaction_type == TransactionType::Transfer {
            return Err(TransactionError::MissingTarget);
        }
        Ok(Self::build(account_id, None, amount, transaction_type))
    }

    /// Create a transfer from `account_id` to `target_account_id`
    ///
    /// Source and target equality is not checked here; the generator
    /// guarantees distinct accounts for everything it produces.
    pub fn transfer(account_id: String, target_account_id: String, amount: i64) -> Self {
        Self::build(
            account_id,
            Some(target_account_id),
            amount,
            TransactionType::Transfer,
        )
    }

    /// Create a transaction of any type with an optional target
    ///
    /// Enforces that a target is given iff the type is `Transfer`.
    pub fn with_target(
        account_id: String,
        amount: i64,
        transaction_type: TransactionType,
        target_account_id: Option<String>,
    ) -> Result<Self, TransactionError> {
        match (transaction_type, target_account_id) {
            (TransactionType::Transfer, Some(target)) => {
                Ok(Self::transfer(account_id, target, amount))
            }
            (TransactionType::Transfer, None) => Err(TransactionError::MissingTarget),
            (other, Some(_)) => Err(TransactionError::TargetNotAllowed(other)),
            (other, None) => Self::new(account_id, amount, other),
        }
    }

    /// Target presence must already match the type.
    pub(crate) fn build(
        account_id: String,
        target_account_id: Option<String>,
        amount: i64,
        transaction_type: TransactionType,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id,
            target_account_id,
            amount,
            transaction_type,
            status: TransactionStatus::Pending,
            failure_reason: None,
            timestamp: Local::now().naive_local(),
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn target_account_id(&self) -> Option<&str> {
        self.target_account_id.as_deref()
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        self.failure_reason.as_ref()
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransactionStatus::Failed
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Replace the transfer target
    ///
    /// Only transfers carry a target; any other type is refused.
    pub fn set_target_account_id(&mut self, target: String) -> Result<(), TransactionError> {
        if self.transaction_type != TransactionType::Transfer {
            return Err(TransactionError::TargetNotAllowed(self.transaction_type));
        }
        self.target_account_id = Some(target);
        Ok(())
    }

    /// Replace the amount (no clamping, no validation)
    pub fn set_amount(&mut self, amount: i64) {
        self.amount = amount;
    }

    /// Mark as `Completed`
    ///
    /// Only a pending transaction can complete.
    pub fn complete(&mut self) -> Result<(), TransactionError> {
        if self.status != TransactionStatus::Pending {
            return Err(TransactionError::NotPending(self.status));
        }
        self.status = TransactionStatus::Completed;
        Ok(())
    }

    /// Mark as `Failed`
    ///
    /// Allowed from any state. The first recorded reason wins.
    pub fn fail(&mut self, reason: FailureReason) {
        self.status = TransactionStatus::Failed;
        if self.failure_reason.is_none() {
            self.failure_reason = Some(reason);
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} from {}",
            self.transaction_type, self.amount, self.status, self.account_id
        )?;
        if let Some(target) = &self.target_account_id {
            write!(f, " to {}", target)?;
        }
        Ok(())
    }
}
