//! Observed database transactions
//!
//! sqlx has no statement hooks, so [`ObservedTransaction`] announces each
//! statement it runs to an [`ObserverChain`] itself. `commit()` announces the
//! literal `COMMIT` first, which is where a
//! [`FlushCoordinator`](crate::flush::FlushCoordinator) writes its batch.
//! Rolling back announces the literal `ROLLBACK`, which drops the batch.

use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

use crate::error::AuditResult;
use crate::flush::{COMMIT_STATEMENT, ROLLBACK_STATEMENT};
use crate::observer::{ObserverChain, StatementExecutor, StatementObserver};
use crate::sql::Statement;

/// A transaction whose statements are announced to an [`ObserverChain`]
///
/// Finish it with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping it rolls back in the driver without telling observers, so staged
/// audit rows stay on the coordinator.
pub struct ObservedTransaction {
    tx: Transaction<'static, Postgres>,
    observers: Arc<ObserverChain>,
}

impl ObservedTransaction {
    pub async fn begin(pool: &PgPool, observers: Arc<ObserverChain>) -> AuditResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self { tx, observers })
    }

    /// Run a statement, notifying observers around it
    pub async fn execute(&mut self, statement: &Statement) -> AuditResult<u64> {
        let executor: &mut dyn StatementExecutor = &mut *self.tx;
        self.observers
            .on_statement_start(executor, statement.sql(), statement.params())
            .await?;

        let rows = StatementExecutor::execute(&mut *self.tx, statement).await?;

        self.observers.on_statement_end().await?;
        Ok(rows)
    }

    /// Commit, unless an observer rejects the commit
    ///
    /// When an observer fails on `COMMIT` the transaction is rolled back and
    /// the observer's error is returned.
    pub async fn commit(mut self) -> AuditResult<()> {
        let commit = Statement::raw(COMMIT_STATEMENT);
        let executor: &mut dyn StatementExecutor = &mut *self.tx;

        let announced = self
            .observers
            .on_statement_start(executor, commit.sql(), commit.params())
            .await;

        if let Err(e) = announced {
            if let Err(rollback_error) = self.rollback().await {
                tracing::warn!(error = %rollback_error, "Rollback after rejected commit failed");
            }
            return Err(e);
        }

        self.tx.commit().await?;
        self.observers.on_statement_end().await
    }

    /// Roll back, announcing `ROLLBACK` so observers drop staged work
    ///
    /// The rollback runs even when an observer fails; the first error is
    /// returned.
    pub async fn rollback(mut self) -> AuditResult<()> {
        let rollback = Statement::raw(ROLLBACK_STATEMENT);
        let executor: &mut dyn StatementExecutor = &mut *self.tx;
        let announced = self
            .observers
            .on_statement_start(executor, rollback.sql(), rollback.params())
            .await;

        self.tx.rollback().await?;
        announced?;
        self.observers.on_statement_end().await
    }
}

impl std::fmt::Debug for ObservedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedTransaction")
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}
