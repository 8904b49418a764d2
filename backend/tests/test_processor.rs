//! Tests for per-bank transaction processing
//!
//! `process_transaction` is exercised directly for each outcome, then a
//! spawned processor is driven through its bank queue.

use bank_sim_core::export::read_records;
use bank_sim_core::processor::ShutdownReport;
use bank_sim_core::validation::MaxAmount;
use bank_sim_core::{
    process_transaction, Account, AccountRegistry, AuditExporter, BlockingQueue,
    CancellationToken, FailureReason, ProcessOutcome, Transaction, TransactionProcessor,
    TransactionStatus, TransactionType, ValidationGate, ValidationRule, WorkerContext,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn context(dir: &Path, gate: ValidationGate) -> WorkerContext {
    WorkerContext {
        registry: Arc::new(AccountRegistry::new(vec![
            Account::with_balance("Account_1".to_string(), "OTP".to_string(), 1000),
            Account::with_balance("Account_2".to_string(), "KH".to_string(), 1000),
            Account::with_balance("Account_3".to_string(), "OTP".to_string(), 501),
        ])),
        gate: Arc::new(gate),
        exporter: AuditExporter::new(dir),
    }
}

fn balance(ctx: &WorkerContext, id: &str) -> i64 {
    ctx.registry.get(id).unwrap().balance()
}

#[test]
fn test_deposit_completes_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let mut tx = Transaction::new("Account_1".to_string(), 200, TransactionType::Deposit).unwrap();

    let outcome = process_transaction(&mut tx, "OTP", &ctx);

    assert_eq!(outcome, ProcessOutcome::Applied { exported: true });
    assert_eq!(tx.status(), TransactionStatus::Completed);
    assert_eq!(balance(&ctx, "Account_1"), 1200);

    let path = ctx.exporter.path_for("OTP", TransactionStatus::Completed);
    let records = read_records(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amount, 200);
}

#[test]
fn test_non_positive_amount_rejected_without_export() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());

    for amount in [0, -50] {
        let mut tx =
            Transaction::new("Account_1".to_string(), amount, TransactionType::Deposit).unwrap();
        let outcome = process_transaction(&mut tx, "OTP", &ctx);

        assert_eq!(outcome, ProcessOutcome::Rejected);
        assert_eq!(tx.failure_reason(), Some(&FailureReason::InvalidAmount));
    }

    assert_eq!(balance(&ctx, "Account_1"), 1000);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_max_amount_rule_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new().with_rule(MaxAmount(300)));
    let mut tx =
        Transaction::new("Account_2".to_string(), 450, TransactionType::Withdrawal).unwrap();

    assert_eq!(process_transaction(&mut tx, "KH", &ctx), ProcessOutcome::Rejected);
    assert!(matches!(tx.failure_reason(), Some(FailureReason::Rejected(_))));
    assert_eq!(balance(&ctx, "Account_2"), 1000);
}

#[test]
fn test_insufficient_funds_exported_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let mut tx =
        Transaction::new("Account_3".to_string(), 502, TransactionType::Withdrawal).unwrap();

    let outcome = process_transaction(&mut tx, "OTP", &ctx);

    assert_eq!(outcome, ProcessOutcome::Applied { exported: true });
    assert_eq!(tx.failure_reason(), Some(&FailureReason::InsufficientFunds));
    assert_eq!(balance(&ctx, "Account_3"), 501);

    let failed = read_records(&ctx.exporter.path_for("OTP", TransactionStatus::Failed)).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, TransactionStatus::Failed);
    assert!(!ctx.exporter.path_for("OTP", TransactionStatus::Completed).exists());
}

#[test]
fn test_missing_target_fails_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let mut tx = Transaction::transfer("Account_1".to_string(), "Account_9".to_string(), 100);

    let outcome = process_transaction(&mut tx, "OTP", &ctx);

    assert_eq!(outcome, ProcessOutcome::Applied { exported: true });
    assert_eq!(tx.failure_reason(), Some(&FailureReason::MissingTargetAccount));
    assert_eq!(balance(&ctx, "Account_1"), 1000);

    let failed = read_records(&ctx.exporter.path_for("OTP", TransactionStatus::Failed)).unwrap();
    assert_eq!(failed[0].target_account_id.as_deref(), Some("Account_9"));
}

#[test]
fn test_cross_bank_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let mut tx = Transaction::transfer("Account_1".to_string(), "Account_2".to_string(), 300);

    process_transaction(&mut tx, "OTP", &ctx);

    assert!(tx.is_completed());
    assert_eq!(balance(&ctx, "Account_1"), 700);
    assert_eq!(balance(&ctx, "Account_2"), 1300);
}

#[test]
fn test_missing_source_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let mut tx = Transaction::new("Ghost".to_string(), 100, TransactionType::Deposit).unwrap();

    assert_eq!(process_transaction(&mut tx, "OTP", &ctx), ProcessOutcome::Dropped);
    assert_eq!(tx.failure_reason(), Some(&FailureReason::MissingSourceAccount));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_unwritable_export_counts_as_not_exported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, "file").unwrap();
    let ctx = context(&blocker, ValidationGate::new());
    let mut tx = Transaction::new("Account_1".to_string(), 100, TransactionType::Deposit).unwrap();

    let outcome = process_transaction(&mut tx, "OTP", &ctx);

    assert_eq!(outcome, ProcessOutcome::Applied { exported: false });
    assert_eq!(balance(&ctx, "Account_1"), 1100);
}

#[test]
fn test_spawned_processor_drains_queue() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let registry = Arc::clone(&ctx.registry);
    let token = CancellationToken::new();
    let queue = Arc::new(BlockingQueue::bounded(10));

    let processor =
        TransactionProcessor::new("OTP", Arc::clone(&queue), 4, ctx, token.clone()).unwrap();
    let handle = processor.spawn().unwrap();

    for _ in 0..20 {
        let tx = Transaction::new("Account_1".to_string(), 50, TransactionType::Deposit).unwrap();
        queue.put(tx, &token).unwrap();
    }
    let overdraw =
        Transaction::new("Account_3".to_string(), 5000, TransactionType::Withdrawal).unwrap();
    queue.put(overdraw, &token).unwrap();

    assert!(handle.wait_idle(Duration::from_secs(10)));
    assert_eq!(registry.get("Account_1").unwrap().balance(), 1000 + 20 * 50);
    assert_eq!(registry.get("Account_3").unwrap().balance(), 501);

    let stats = handle.stats();
    assert_eq!(stats.dispatched, 21);
    assert_eq!(stats.completed, 20);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.export_errors, 0);

    let completed = read_records(&dir.path().join("OTP_transactions.json")).unwrap();
    assert_eq!(completed.len(), 20);

    assert_eq!(handle.stop(Duration::from_secs(5)), ShutdownReport::Graceful);
}

#[test]
fn test_stop_idle_processor_is_graceful() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let queue = Arc::new(BlockingQueue::bounded(10));
    let processor =
        TransactionProcessor::new("KH", queue, 2, ctx, CancellationToken::new()).unwrap();

    let handle = processor.spawn().unwrap();
    assert_eq!(handle.bank(), "KH");
    assert_eq!(handle.stop(Duration::from_secs(1)), ShutdownReport::Graceful);
}

/// Panics on one specific amount
struct PanicsOn(i64);

impl ValidationRule for PanicsOn {
    fn name(&self) -> &str {
        "panics_on"
    }

    fn check(&self, tx: &Transaction) -> Result<(), FailureReason> {
        if tx.amount() == self.0 {
            panic!("rule failure on amount {}", self.0);
        }
        Ok(())
    }
}

#[test]
fn test_overflowing_deposit_fails_and_later_deposits_apply() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new());
    let registry = Arc::clone(&ctx.registry);
    let token = CancellationToken::new();
    let queue = Arc::new(BlockingQueue::bounded(10));
    let handle = TransactionProcessor::new("OTP", Arc::clone(&queue), 1, ctx, token.clone())
        .unwrap()
        .spawn()
        .unwrap();

    let huge =
        Transaction::new("Account_1".to_string(), i64::MAX, TransactionType::Deposit).unwrap();
    queue.put(huge, &token).unwrap();
    let small = Transaction::new("Account_1".to_string(), 50, TransactionType::Deposit).unwrap();
    queue.put(small, &token).unwrap();

    assert!(handle.wait_idle(Duration::from_secs(10)));
    assert_eq!(registry.get("Account_1").unwrap().balance(), 1050);

    let stats = handle.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);

    let failed = read_records(&dir.path().join("OTP_failed_transactions.json")).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].amount, i64::MAX);

    assert_eq!(handle.stop(Duration::from_secs(5)), ShutdownReport::Graceful);
}

#[test]
fn test_panicking_job_does_not_stall_the_bank() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), ValidationGate::new().with_rule(PanicsOn(13)));
    let registry = Arc::clone(&ctx.registry);
    let token = CancellationToken::new();
    let queue = Arc::new(BlockingQueue::bounded(10));
    let handle = TransactionProcessor::new("OTP", Arc::clone(&queue), 1, ctx, token.clone())
        .unwrap()
        .spawn()
        .unwrap();

    for amount in [13, 100, 13, 200] {
        let tx =
            Transaction::new("Account_1".to_string(), amount, TransactionType::Deposit).unwrap();
        queue.put(tx, &token).unwrap();
    }

    assert!(handle.wait_idle(Duration::from_secs(10)));
    assert_eq!(queue.unfinished(), 0);
    assert_eq!(registry.get("Account_1").unwrap().balance(), 1300);
    assert_eq!(handle.stats().completed, 2);

    assert_eq!(handle.stop(Duration::from_secs(5)), ShutdownReport::Graceful);
}

#[test]
fn test_stopping_one_bank_leaves_siblings_running() {
    let dir = tempfile::tempdir().unwrap();
    let parent = CancellationToken::new();
    let otp_queue = Arc::new(BlockingQueue::bounded(10));
    let kh_queue = Arc::new(BlockingQueue::bounded(10));
    let kh_ctx = context(dir.path(), ValidationGate::new());
    let registry = Arc::clone(&kh_ctx.registry);

    let otp = TransactionProcessor::new(
        "OTP",
        Arc::clone(&otp_queue),
        1,
        context(dir.path(), ValidationGate::new()),
        parent.child(),
    )
    .unwrap()
    .spawn()
    .unwrap();
    let kh = TransactionProcessor::new("KH", Arc::clone(&kh_queue), 1, kh_ctx, parent.child())
        .unwrap()
        .spawn()
        .unwrap();

    assert_eq!(otp.stop(Duration::from_secs(5)), ShutdownReport::Graceful);
    assert!(!parent.is_cancelled());

    let tx = Transaction::new("Account_2".to_string(), 75, TransactionType::Deposit).unwrap();
    kh_queue.put(tx, &parent).unwrap();
    assert!(kh.wait_idle(Duration::from_secs(10)));
    assert_eq!(registry.get("Account_2").unwrap().balance(), 1075);

    parent.cancel();
    assert_eq!(kh.stop(Duration::from_secs(5)), ShutdownReport::Graceful);
}
