//! Commit-time flush of staged audit records
//!
//! The [`FlushCoordinator`] is a [`StatementObserver`] that sits on one
//! connection. Change detection stages [`PendingAudit`] records on it while
//! the business transaction runs; when the coordinator sees the literal
//! `COMMIT` statement it hands the whole batch to the registered
//! [`FlushCallback`] and waits for it, so the audit inserts execute on the
//! same connection inside the same transaction. A failing callback fails the
//! statement, which aborts the commit. The literal `ROLLBACK` drops whatever
//! is staged, so rows for undone changes never reach a later commit.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::AuditResult;
use crate::observer::{StatementExecutor, StatementObserver};
use crate::record::PendingAudit;
use crate::sql::SqlParam;

/// Statement text that triggers a flush
///
/// Matched exactly; savepoint statements and `COMMIT` issued inside other
/// text never trigger.
pub const COMMIT_STATEMENT: &str = "COMMIT";

/// Statement text that discards the staged batch
pub const ROLLBACK_STATEMENT: &str = "ROLLBACK";

/// Writes a batch of staged records through the observed connection
#[async_trait]
pub trait FlushCallback: Send + Sync {
    async fn flush(
        &self,
        executor: &mut dyn StatementExecutor,
        batch: Vec<PendingAudit>,
    ) -> AuditResult<()>;
}

/// Buffers staged records for one unit of work and flushes them on commit
#[derive(Default)]
pub struct FlushCoordinator {
    pending: Mutex<Vec<PendingAudit>>,
    callback: RwLock<Option<Arc<dyn FlushCallback>>>,
}

impl FlushCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordinator with `callback` already registered
    pub fn with_callback(callback: Arc<dyn FlushCallback>) -> Self {
        let coordinator = Self::new();
        coordinator.set_flush_callback(Some(callback));
        coordinator
    }

    /// Register or clear the flush callback
    pub fn set_flush_callback(&self, callback: Option<Arc<dyn FlushCallback>>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    pub fn has_flush_callback(&self) -> bool {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn stage(&self, audit: PendingAudit) {
        self.pending_batch().push(audit);
    }

    pub fn stage_batch(&self, audits: impl IntoIterator<Item = PendingAudit>) {
        self.pending_batch().extend(audits);
    }

    /// Number of records waiting for the next commit
    pub fn pending_len(&self) -> usize {
        self.pending_batch().len()
    }

    /// Drop everything staged, e.g. after a rollback
    pub fn discard_pending(&self) -> usize {
        let mut pending = self.pending_batch();
        let discarded = pending.len();
        pending.clear();
        discarded
    }

    fn pending_batch(&self) -> std::sync::MutexGuard<'_, Vec<PendingAudit>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_callback(&self) -> Option<Arc<dyn FlushCallback>> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StatementObserver for FlushCoordinator {
    async fn on_statement_start(
        &self,
        executor: &mut dyn StatementExecutor,
        sql: &str,
        _params: &[SqlParam],
    ) -> AuditResult<()> {
        if sql == ROLLBACK_STATEMENT {
            let discarded = self.discard_pending();
            if discarded > 0 {
                tracing::debug!(records = discarded, "Discarding audit batch on rollback");
            }
            return Ok(());
        }
        if sql != COMMIT_STATEMENT {
            return Ok(());
        }
        let Some(callback) = self.current_callback() else {
            return Ok(());
        };

        // The batch is taken before awaiting so no lock is held across the flush.
        let batch = std::mem::take(&mut *self.pending_batch());
        let size = batch.len();
        tracing::debug!(records = size, "Flushing audit batch before commit");

        callback.flush(executor, batch).await.map_err(|e| {
            tracing::error!(records = size, error = %e, "Audit flush failed, aborting commit");
            e
        })
    }
}

impl std::fmt::Debug for FlushCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushCoordinator")
            .field("pending", &self.pending_len())
            .field("has_callback", &self.has_flush_callback())
            .finish()
    }
}
