//! # Unit of Work
//!
//! One logical database transaction (or a shared read-only connection) and
//! its completion state. Repository operations borrow a `UnitOfWork` and run
//! every statement through it; services decide when it commits.
//!
//! A write-mode unit of work that is dropped while still active is rolled
//! back: the underlying `DatabaseTransaction` queues its rollback on drop and
//! the event is logged at `warn`.

use std::fmt;

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, ExecResult,
    QueryResult, Statement, TransactionTrait,
};
use tracing::Span;

use crate::error::{RepositoryError, UNIT_OF_WORK_ERROR_PREFIX};
use crate::telemetry;

/// Completion state of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitOfWorkState::Active => write!(f, "active"),
            UnitOfWorkState::Committed => write!(f, "committed"),
            UnitOfWorkState::RolledBack => write!(f, "rolled back"),
        }
    }
}

enum Executor {
    Transaction(Option<DatabaseTransaction>),
    ReadOnly(DatabaseConnection),
}

/// Transactional scope for a group of repository calls.
pub struct UnitOfWork {
    executor: Executor,
    backend: DbBackend,
    state: UnitOfWorkState,
    span: Span,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("backend", &self.backend)
            .field("state", &self.state)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl UnitOfWork {
    /// Begin a unit of work on `db`.
    ///
    /// Write mode opens a transaction and fails if the driver cannot start
    /// one; read-only mode wraps the pooled connection without a transaction.
    pub async fn begin(
        db: &DatabaseConnection,
        read_only: bool,
        parent: &Span,
    ) -> Result<Self, RepositoryError> {
        let trace_id = telemetry::current_trace_id();
        let span = tracing::debug_span!(
            parent: parent,
            "unit_of_work",
            read_only,
            trace_id = trace_id.as_deref()
        );
        let backend = db.get_database_backend();

        let executor = if read_only {
            Executor::ReadOnly(db.clone())
        } else {
            let transaction = db.begin().await.map_err(|err| {
                tracing::error!(parent: &span, error = %err, "Failed to begin transaction");
                RepositoryError::database_error(err)
            })?;
            Executor::Transaction(Some(transaction))
        };

        let mode = if read_only { "read_only" } else { "write" };
        metrics::counter!("uow_begun_total", "mode" => mode).increment(1);
        tracing::debug!(parent: &span, "Unit of work started");

        Ok(Self {
            executor,
            backend,
            state: UnitOfWorkState::Active,
            span,
        })
    }

    /// Current completion state
    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.executor, Executor::ReadOnly(_))
    }

    /// Span repository events for this unit of work are emitted under
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Fail unless statements may still run through this unit of work.
    pub fn ensure_active(&self) -> Result<(), RepositoryError> {
        match self.state {
            UnitOfWorkState::Active => Ok(()),
            state => Err(RepositoryError::InvalidUnitOfWorkState(format!(
                "unit of work is already {state}"
            ))),
        }
    }

    /// Fail unless writes may run through this unit of work.
    pub fn ensure_writable(&self) -> Result<(), RepositoryError> {
        self.ensure_active()?;
        if self.is_read_only() {
            return Err(RepositoryError::InvalidUnitOfWorkState(
                "cannot write through a read-only unit of work".to_string(),
            ));
        }
        Ok(())
    }

    /// Commit all writes. Committing twice, or after a rollback, fails.
    pub async fn commit(&mut self) -> Result<(), RepositoryError> {
        if self.state != UnitOfWorkState::Active {
            return Err(RepositoryError::InvalidUnitOfWorkState(format!(
                "cannot commit a unit of work that is already {}",
                self.state
            )));
        }

        if let Executor::Transaction(transaction) = &mut self.executor
            && let Some(transaction) = transaction.take()
        {
            if let Err(err) = transaction.commit().await {
                self.state = UnitOfWorkState::RolledBack;
                metrics::counter!("uow_rolled_back_total", "reason" => "commit_failed")
                    .increment(1);
                tracing::error!(parent: &self.span, error = %err, "Commit failed");
                return Err(RepositoryError::database_error(err));
            }
        }

        self.state = UnitOfWorkState::Committed;
        metrics::counter!("uow_committed_total").increment(1);
        tracing::debug!(parent: &self.span, "Unit of work committed");
        Ok(())
    }

    /// Discard all writes. Idempotent: once completed, later calls are no-ops.
    pub async fn rollback(&mut self) -> Result<(), RepositoryError> {
        self.rollback_with_reason("explicit").await
    }

    /// Commit on `Ok`, roll back on `Err`, and hand the result back.
    pub async fn finish<T>(
        mut self,
        result: Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback_with_reason("error").await {
                    tracing::warn!(
                        parent: &self.span,
                        error = %rollback_err,
                        "Rollback after failed operation also failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn rollback_with_reason(&mut self, reason: &'static str) -> Result<(), RepositoryError> {
        if self.state != UnitOfWorkState::Active {
            tracing::debug!(
                parent: &self.span,
                state = %self.state,
                "Rollback requested on a completed unit of work, ignoring"
            );
            return Ok(());
        }

        self.state = UnitOfWorkState::RolledBack;
        metrics::counter!("uow_rolled_back_total", "reason" => reason).increment(1);

        if let Executor::Transaction(transaction) = &mut self.executor
            && let Some(transaction) = transaction.take()
        {
            transaction
                .rollback()
                .await
                .map_err(RepositoryError::database_error)?;
        }

        tracing::debug!(parent: &self.span, reason, "Unit of work rolled back");
        Ok(())
    }

    fn connection_error(&self, message: &str) -> DbErr {
        DbErr::Custom(format!("{UNIT_OF_WORK_ERROR_PREFIX}{message}"))
    }

    fn check_statement(&self, write: bool) -> Result<(), DbErr> {
        if self.state != UnitOfWorkState::Active {
            return Err(self.connection_error(&format!("unit of work is already {}", self.state)));
        }
        if write && self.is_read_only() {
            return Err(self.connection_error("cannot write through a read-only unit of work"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConnectionTrait for UnitOfWork {
    fn get_database_backend(&self) -> DbBackend {
        self.backend
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        self.check_statement(true)?;
        match &self.executor {
            Executor::Transaction(Some(transaction)) => transaction.execute(stmt).await,
            Executor::Transaction(None) => Err(self.connection_error("transaction is closed")),
            Executor::ReadOnly(db) => db.execute(stmt).await,
        }
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        self.check_statement(true)?;
        match &self.executor {
            Executor::Transaction(Some(transaction)) => transaction.execute_unprepared(sql).await,
            Executor::Transaction(None) => Err(self.connection_error("transaction is closed")),
            Executor::ReadOnly(db) => db.execute_unprepared(sql).await,
        }
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        self.check_statement(is_write_statement(&stmt.sql))?;
        match &self.executor {
            Executor::Transaction(Some(transaction)) => transaction.query_one(stmt).await,
            Executor::Transaction(None) => Err(self.connection_error("transaction is closed")),
            Executor::ReadOnly(db) => db.query_one(stmt).await,
        }
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        self.check_statement(is_write_statement(&stmt.sql))?;
        match &self.executor {
            Executor::Transaction(Some(transaction)) => transaction.query_all(stmt).await,
            Executor::Transaction(None) => Err(self.connection_error("transaction is closed")),
            Executor::ReadOnly(db) => db.query_all(stmt).await,
        }
    }

    fn support_returning(&self) -> bool {
        match &self.executor {
            Executor::Transaction(Some(transaction)) => transaction.support_returning(),
            Executor::Transaction(None) => false,
            Executor::ReadOnly(db) => db.support_returning(),
        }
    }
}

/// `INSERT ... RETURNING` and friends arrive as queries, not executions.
fn is_write_statement(sql: &str) -> bool {
    let verb = sql.split_whitespace().next().unwrap_or_default();
    ["INSERT", "UPDATE", "DELETE"]
        .iter()
        .any(|write| verb.eq_ignore_ascii_case(write))
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Active && !self.is_read_only() {
            metrics::counter!("uow_rolled_back_total", "reason" => "dropped").increment(1);
            tracing::warn!(
                parent: &self.span,
                "Unit of work dropped while active, rolling back"
            );
        }
    }
}
