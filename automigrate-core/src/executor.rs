//! Migration executor.
//!
//! The executor runs one migration attempt at a time per [`MigrationGate`]:
//! it reads the live schema, diffs it against the declared model, filters the
//! operations through the policy, renders SQL and applies the batch in a
//! single transaction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::connection::DatabaseConnection;
use crate::diff::SchemaDiffer;
use crate::error::{MigrateResult, MigrationError};
use crate::history::{self, MigrationRecord};
use crate::introspect::{IntrospectionConfig, SchemaIntrospector};
use crate::lock::MigrationGate;
use crate::model::ModelProvider;
use crate::operation::ChangeOperation;
use crate::options::MigrationOptions;
use crate::policy::OperationPolicy;
use crate::provider::Provider;
use crate::schema::DatabaseSchema;
use crate::sql::{self, MigrationCommand};

/// Step of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// No run in progress.
    Idle,
    /// Reading the live schema.
    Introspecting,
    /// Comparing live and declared schemas.
    Diffing,
    /// Applying the operation policy.
    Filtering,
    /// Rendering SQL.
    Generating,
    /// Executing the batch inside a transaction.
    AwaitingTransaction,
    /// Committing the transaction.
    Committing,
    /// Rolling back after a failure.
    RollingBack,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Introspecting => "introspecting",
            Self::Diffing => "diffing",
            Self::Filtering => "filtering",
            Self::Generating => "generating",
            Self::AwaitingTransaction => "awaiting_transaction",
            Self::Committing => "committing",
            Self::RollingBack => "rolling_back",
        };
        f.write_str(name)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The database already matches the model.
    NoChanges,
    /// The batch was committed.
    Applied,
    /// SQL was generated but not executed.
    ScriptOnly,
    /// The run failed; see [`MigrationOutcome::error`].
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoChanges => "no changes",
            Self::Applied => "applied",
            Self::ScriptOnly => "script only",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a migration run.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    /// How the run ended.
    pub status: OutcomeStatus,
    /// Operations that passed the policy.
    pub applied: Vec<ChangeOperation>,
    /// Operations the policy removed.
    pub skipped: Vec<ChangeOperation>,
    /// Rendered commands, excluding the audit record.
    pub commands: Vec<MigrationCommand>,
    /// Rendered script, when requested.
    pub script: Option<String>,
    /// Backup file written before the batch ran.
    pub backup: Option<PathBuf>,
    /// Audit record written with the batch.
    pub record: Option<MigrationRecord>,
    /// Failure message for a failed run.
    pub error: Option<String>,
    /// Wall time of the run.
    pub duration_ms: u64,
}

impl MigrationOutcome {
    fn new() -> Self {
        Self {
            status: OutcomeStatus::NoChanges,
            applied: Vec::new(),
            skipped: Vec::new(),
            commands: Vec::new(),
            script: None,
            backup: None,
            record: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Check if the run did not fail.
    pub fn is_success(&self) -> bool {
        self.status != OutcomeStatus::Failed
    }

    /// Check if the run changed the database.
    pub fn has_changes(&self) -> bool {
        self.status == OutcomeStatus::Applied
    }
}

/// Orchestrates migration runs against one connection.
pub struct MigrationExecutor {
    connection: Arc<dyn DatabaseConnection>,
    model: Arc<dyn ModelProvider>,
    gate: MigrationGate,
    provider: Provider,
    introspection: IntrospectionConfig,
}

impl MigrationExecutor {
    /// Create an executor.
    ///
    /// Fails with [`MigrationError::UnsupportedProvider`] when the connection
    /// reports a provider outside the supported set.
    pub fn new(
        connection: Arc<dyn DatabaseConnection>,
        model: Arc<dyn ModelProvider>,
        gate: MigrationGate,
    ) -> MigrateResult<Self> {
        let provider: Provider = connection.provider_name().parse()?;
        Ok(Self {
            connection,
            model,
            gate,
            provider,
            introspection: IntrospectionConfig::default(),
        })
    }

    /// Set the introspection configuration.
    pub fn with_introspection_config(mut self, config: IntrospectionConfig) -> Self {
        self.introspection = config;
        self
    }

    /// Provider of the connection.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Gate the executor runs under.
    pub fn gate(&self) -> &MigrationGate {
        &self.gate
    }

    /// Bring the database in line with the declared model.
    pub async fn migrate(&self, options: &MigrationOptions) -> MigrateResult<MigrationOutcome> {
        let span = info_span!("migrate", provider = %self.provider, dry_run = options.dry_run);
        self.run(options, true).instrument(span).await
    }

    /// Compute and render the pending changes without executing them.
    pub async fn plan(&self, options: &MigrationOptions) -> MigrateResult<MigrationOutcome> {
        let span = info_span!("plan", provider = %self.provider);
        self.run(options, false).instrument(span).await
    }

    /// Read the audit records of applied runs.
    pub async fn history(&self) -> MigrateResult<Vec<MigrationRecord>> {
        history::read_records(self.connection.as_ref(), self.provider).await
    }

    async fn run(&self, options: &MigrationOptions, execute: bool) -> MigrateResult<MigrationOutcome> {
        let started = Instant::now();
        let _guard = self.gate.acquire().await;

        let mut outcome = MigrationOutcome::new();
        let result = self.attempt(options, execute, &mut outcome).await;
        enter(MigrationPhase::Idle);
        outcome.duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(status) => {
                outcome.status = status;
                Ok(outcome)
            }
            Err(e) if options.halt_on_failure => Err(e),
            Err(e) => {
                outcome.status = OutcomeStatus::Failed;
                outcome.error = Some(e.to_string());
                Ok(outcome)
            }
        }
    }

    async fn attempt(
        &self,
        options: &MigrationOptions,
        execute: bool,
        outcome: &mut MigrationOutcome,
    ) -> MigrateResult<OutcomeStatus> {
        enter(MigrationPhase::Introspecting);
        if options.validate_connection {
            self.connection.ping().await.map_err(|e| match e {
                MigrationError::Connection(_) => e,
                other => MigrationError::connection(other.to_string()),
            })?;
        }
        let live = self.read_live_schema().await;
        let declared = self.model.declared_schema()?;

        enter(MigrationPhase::Diffing);
        let operations = SchemaDiffer::new(self.provider)
            .case_sensitive(options.case_sensitive_names)
            .diff(&live, &declared)?;

        enter(MigrationPhase::Filtering);
        let filtered = OperationPolicy::filter(operations, options);
        for op in &filtered.skipped {
            debug!(operation = %op, "Skipped by policy");
        }
        outcome.skipped = filtered.skipped;
        if filtered.allowed.is_empty() {
            info!("No pending model changes detected");
            return Ok(OutcomeStatus::NoChanges);
        }
        outcome.applied = filtered.allowed;

        enter(MigrationPhase::Generating);
        let commands = sql::generate(self.provider, &outcome.applied, &declared)?;
        debug!(commands = commands.len(), "Generated migration commands");
        outcome.commands = commands;

        if options.generate_script || !execute {
            let script = sql::render_script(self.provider, &outcome.commands);
            if let Some(path) = &options.script_path {
                write_script(path, &script).await?;
                info!(path = %path.display(), "Wrote migration script");
            }
            outcome.script = Some(script);
        }
        if options.dry_run || !execute {
            return Ok(OutcomeStatus::ScriptOnly);
        }

        if options.backup_database {
            outcome.backup = Some(self.backup(&options.backup_dir).await?);
        }

        let mut batch = sql::join_commands(self.provider, &outcome.commands);
        if options.use_auto_migration_record {
            let record = MigrationRecord::for_batch(&batch, outcome.applied.len());
            let mut commands = outcome.commands.clone();
            commands.extend(history::record_commands(self.provider, &record));
            batch = sql::join_commands(self.provider, &commands);
            outcome.record = Some(record);
        }

        self.apply(&batch).await?;
        info!(
            "Database migration completed successfully. Applied {} operations",
            outcome.applied.len()
        );
        Ok(OutcomeStatus::Applied)
    }

    async fn read_live_schema(&self) -> DatabaseSchema {
        let introspector = SchemaIntrospector::new(self.provider, self.introspection.clone());
        match introspector.introspect(self.connection.as_ref()).await {
            Ok(schema) => schema,
            Err(e) => {
                warn!(error = %e, "Failed to read database model, assuming empty database");
                DatabaseSchema::new()
            }
        }
    }

    async fn backup(&self, dir: &Path) -> MigrateResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            MigrationError::backup(format!("cannot create '{}': {}", dir.display(), e))
        })?;
        let dest = dir.join(format!(
            "{}-{}.bak",
            self.provider,
            Utc::now().format("%Y%m%d%H%M%S")
        ));
        self.connection.backup(&dest).await.map_err(|e| match e {
            MigrationError::Backup(_) => e,
            other => MigrationError::backup(other.to_string()),
        })?;
        info!(path = %dest.display(), "Backed up database");
        Ok(dest)
    }

    /// Execute the batch in one transaction, rolling back on failure.
    async fn apply(&self, batch: &str) -> MigrateResult<()> {
        enter(MigrationPhase::AwaitingTransaction);
        self.connection.begin().await.map_err(execution_error)?;

        let result = match self.connection.execute_batch(batch).await {
            Ok(()) => {
                enter(MigrationPhase::Committing);
                self.connection.commit().await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            enter(MigrationPhase::RollingBack);
            if let Err(rollback) = self.connection.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            error!(error = %e, "Migration transaction failed");
            return Err(execution_error(e));
        }
        Ok(())
    }
}

fn enter(phase: MigrationPhase) {
    debug!(%phase, "Migration phase");
}

fn execution_error(e: MigrationError) -> MigrationError {
    match e {
        MigrationError::Execution(_) => e,
        other => MigrationError::execution(other.to_string()),
    }
}

async fn write_script(path: &Path, script: &str) -> MigrateResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, script).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Row;
    use crate::schema::{Column, ColumnType, Table};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Connection that sees an empty database and records every call.
    #[derive(Default)]
    struct MockConnection {
        provider: String,
        fail_on: Option<String>,
        fail_ping: bool,
        fail_queries: bool,
        events: Mutex<Vec<String>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockConnection {
        fn sqlite() -> Self {
            Self {
                provider: "sqlite".to_string(),
                ..Default::default()
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }
    }

    #[async_trait::async_trait]
    impl DatabaseConnection for MockConnection {
        fn provider_name(&self) -> &str {
            &self.provider
        }

        async fn ping(&self) -> MigrateResult<()> {
            if self.fail_ping {
                return Err(MigrationError::connection("unreachable"));
            }
            Ok(())
        }

        async fn query(&self, _sql: &str) -> MigrateResult<Vec<Row>> {
            if self.fail_queries {
                return Err(MigrationError::database("no such database"));
            }
            Ok(Vec::new())
        }

        async fn begin(&self) -> MigrateResult<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.push("begin");
            Ok(())
        }

        async fn execute_batch(&self, sql: &str) -> MigrateResult<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.push(format!("execute:{}", sql));
            match &self.fail_on {
                Some(pattern) if sql.contains(pattern.as_str()) => {
                    Err(MigrationError::database("no such table: missing"))
                }
                _ => Ok(()),
            }
        }

        async fn commit(&self) -> MigrateResult<()> {
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.push("commit");
            Ok(())
        }

        async fn rollback(&self) -> MigrateResult<()> {
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.push("rollback");
            Ok(())
        }
    }

    fn users_model() -> Arc<dyn ModelProvider> {
        Arc::new(
            DatabaseSchema::new().with_table(
                Table::new("users")
                    .column(Column::new("id", ColumnType::Int).auto_increment())
                    .column(Column::new("name", ColumnType::VarChar(Some(100))))
                    .primary_key(["id"]),
            ),
        )
    }

    fn executor(conn: Arc<MockConnection>) -> MigrationExecutor {
        MigrationExecutor::new(conn, users_model(), MigrationGate::new()).unwrap()
    }

    #[test]
    fn test_unsupported_provider() {
        let conn = Arc::new(MockConnection {
            provider: "oracle".to_string(),
            ..Default::default()
        });
        let err = MigrationExecutor::new(conn, users_model(), MigrationGate::new())
            .err()
            .unwrap();
        assert!(matches!(err, MigrationError::UnsupportedProvider(name) if name == "oracle"));
    }

    #[tokio::test]
    async fn test_applies_new_table() {
        let conn = Arc::new(MockConnection::sqlite());
        let outcome = executor(conn.clone())
            .migrate(&MigrationOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Applied);
        assert_eq!(outcome.applied.len(), 1);
        assert!(outcome.record.is_some());

        let events = conn.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], "begin");
        assert!(events[1].contains("CREATE TABLE \"users\""));
        assert!(events[1].contains("\"__auto_migrations\""));
        assert_eq!(events[2], "commit");
    }

    #[tokio::test]
    async fn test_no_changes() {
        let conn = Arc::new(MockConnection::sqlite());
        let executor =
            MigrationExecutor::new(conn.clone(), Arc::new(DatabaseSchema::new()), MigrationGate::new())
                .unwrap();

        let outcome = executor.migrate(&MigrationOptions::default()).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::NoChanges);
        assert!(conn.events().is_empty());
    }

    #[tokio::test]
    async fn test_introspection_failure_assumes_empty_database() {
        let conn = Arc::new(MockConnection {
            fail_queries: true,
            ..MockConnection::sqlite()
        });
        let outcome = executor(conn)
            .migrate(&MigrationOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Applied);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_halts() {
        let conn = Arc::new(MockConnection {
            fail_on: Some("CREATE TABLE".to_string()),
            ..MockConnection::sqlite()
        });
        let err = executor(conn.clone())
            .migrate(&MigrationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Execution(_)));
        let events = conn.events();
        assert_eq!(events.last().map(String::as_str), Some("rollback"));
        assert!(!events.iter().any(|e| e == "commit"));
    }

    #[tokio::test]
    async fn test_failure_reported_without_halt() {
        let conn = Arc::new(MockConnection {
            fail_on: Some("CREATE TABLE".to_string()),
            ..MockConnection::sqlite()
        });
        let outcome = executor(conn)
            .migrate(&MigrationOptions::default().halt_on_failure(false))
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(!outcome.is_success());
        assert!(outcome.error.unwrap().contains("no such table"));
    }

    #[tokio::test]
    async fn test_connection_validation_failure() {
        let conn = Arc::new(MockConnection {
            fail_ping: true,
            ..MockConnection::sqlite()
        });
        let err = executor(conn.clone())
            .migrate(&MigrationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Connection(_)));

        let outcome = executor(conn.clone())
            .migrate(&MigrationOptions::default().validate_connection(false))
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Applied);
    }

    #[tokio::test]
    async fn test_dry_run_writes_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("migration.sql");
        let conn = Arc::new(MockConnection::sqlite());

        let outcome = executor(conn.clone())
            .migrate(&MigrationOptions::default().dry_run(true).script_path(&path))
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::ScriptOnly);
        assert!(conn.events().is_empty());
        let script = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Some(script.clone()), outcome.script);
        assert!(script.starts_with("-- automigrate script for sqlite"));
        assert!(script.contains("CREATE TABLE \"users\""));
    }

    #[tokio::test]
    async fn test_plan_never_executes() {
        let conn = Arc::new(MockConnection::sqlite());
        let outcome = executor(conn.clone())
            .plan(&MigrationOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::ScriptOnly);
        assert!(outcome.script.is_some());
        assert!(conn.events().is_empty());
    }

    #[tokio::test]
    async fn test_backup_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Arc::new(MockConnection::sqlite());
        let err = executor(conn.clone())
            .migrate(
                &MigrationOptions::default()
                    .backup_database(true)
                    .backup_dir(dir.path()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Backup(_)));
        assert!(conn.events().is_empty());
    }

    #[tokio::test]
    async fn test_without_audit_record() {
        let conn = Arc::new(MockConnection::sqlite());
        let outcome = executor(conn.clone())
            .migrate(&MigrationOptions::default().use_auto_migration_record(false))
            .await
            .unwrap();

        assert!(outcome.record.is_none());
        assert!(!conn.events()[1].contains("__auto_migrations"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_across_executors() {
        let conn = Arc::new(MockConnection::sqlite());
        let gate = MigrationGate::new();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let executor =
                    MigrationExecutor::new(conn.clone(), users_model(), gate.clone()).unwrap();
                tokio::spawn(async move { executor.migrate(&MigrationOptions::default()).await })
            })
            .collect();

        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            assert_eq!(outcome.status, OutcomeStatus::Applied);
        }
        assert_eq!(conn.peak.load(Ordering::SeqCst), 1);
        assert!(!gate.is_locked());
    }
}
