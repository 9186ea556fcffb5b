//! Statement observation
//!
//! Anything that needs to see the statements a unit of work runs implements
//! [`StatementObserver`]. Several observers are combined with an
//! [`ObserverChain`], which fans each notification out in insertion order, so
//! the flush coordinator can sit next to unrelated observers without either
//! knowing about the other.

use async_trait::async_trait;
use sqlx::PgConnection;
use std::sync::Arc;

use crate::error::AuditResult;
use crate::sql::{bind_params, SqlParam, Statement};

/// Runs statements on the connection being observed
///
/// Observers receive one so that whatever they execute lands in the same
/// transaction as the statement that triggered them. Statements run through
/// it are not themselves observed.
#[async_trait]
pub trait StatementExecutor: Send {
    /// Execute a statement, returning the number of affected rows
    async fn execute(&mut self, statement: &Statement) -> AuditResult<u64>;
}

#[async_trait]
impl StatementExecutor for PgConnection {
    async fn execute(&mut self, statement: &Statement) -> AuditResult<u64> {
        let query = bind_params!(sqlx::query(statement.sql()), statement.params());
        let result = query.execute(&mut *self).await?;
        Ok(result.rows_affected())
    }
}

/// Callback pair around every observed statement
#[async_trait]
pub trait StatementObserver: Send + Sync {
    /// Called before `sql` is sent to the database
    ///
    /// An error aborts the statement; for `COMMIT` that means the transaction
    /// is rolled back.
    async fn on_statement_start(
        &self,
        executor: &mut dyn StatementExecutor,
        sql: &str,
        params: &[SqlParam],
    ) -> AuditResult<()>;

    /// Called once the statement has completed
    async fn on_statement_end(&self) -> AuditResult<()> {
        Ok(())
    }
}

/// Ordered fan-out over several observers
#[derive(Default, Clone)]
pub struct ObserverChain {
    observers: Vec<Arc<dyn StatementObserver>>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Arc<dyn StatementObserver>) {
        self.observers.push(observer);
    }

    /// Remove `observer` by identity; returns whether it was present
    pub fn remove(&mut self, observer: &Arc<dyn StatementObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !same_observer(o, observer));
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

// Compare data pointers only; vtable pointers are not unique per type.
fn same_observer(a: &Arc<dyn StatementObserver>, b: &Arc<dyn StatementObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[async_trait]
impl StatementObserver for ObserverChain {
    async fn on_statement_start(
        &self,
        executor: &mut dyn StatementExecutor,
        sql: &str,
        params: &[SqlParam],
    ) -> AuditResult<()> {
        for observer in &self.observers {
            observer.on_statement_start(&mut *executor, sql, params).await?;
        }
        Ok(())
    }

    async fn on_statement_end(&self) -> AuditResult<()> {
        for observer in &self.observers {
            observer.on_statement_end().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObserverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverChain")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Executor that remembers what it was asked to run
    #[derive(Debug, Default)]
    pub(crate) struct RecordingExecutor {
        pub statements: Vec<Statement>,
    }

    #[async_trait]
    impl StatementExecutor for RecordingExecutor {
        async fn execute(&mut self, statement: &Statement) -> AuditResult<u64> {
            self.statements.push(statement.clone());
            Ok(1)
        }
    }

    struct Named {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl StatementObserver for Named {
        async fn on_statement_start(
            &self,
            _executor: &mut dyn StatementExecutor,
            sql: &str,
            _params: &[SqlParam],
        ) -> AuditResult<()> {
            self.log.lock().unwrap().push(format!("{}:start:{}", self.name, sql));
            Ok(())
        }

        async fn on_statement_end(&self) -> AuditResult<()> {
            self.log.lock().unwrap().push(format!("{}:end", self.name));
            Ok(())
        }
    }

    fn named(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn StatementObserver> {
        Arc::new(Named {
            name,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn test_fan_out_in_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ObserverChain::new();
        chain.add(named("a", &log));
        chain.add(named("b", &log));

        let mut executor = RecordingExecutor::default();
        chain.on_statement_start(&mut executor, "SELECT 1", &[]).await.unwrap();
        chain.on_statement_end().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:start:SELECT 1", "b:start:SELECT 1", "a:end", "b:end"]
        );
    }

    #[tokio::test]
    async fn test_remove_by_identity() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = named("a", &log);
        let lookalike = named("a", &log);

        let mut chain = ObserverChain::new();
        chain.add(Arc::clone(&first));
        chain.add(named("b", &log));

        assert!(!chain.remove(&lookalike));
        assert!(chain.remove(&first));
        assert!(!chain.remove(&first));
        assert_eq!(chain.len(), 1);

        let mut executor = RecordingExecutor::default();
        chain.on_statement_start(&mut executor, "COMMIT", &[]).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b:start:COMMIT"]);
    }
}
