//! End-to-end migration runs against real SQLite databases.

use std::sync::Arc;

use automigrate_core::{
    ChangeOperation, Column, ColumnType, DatabaseConnection, DatabaseSchema, Entity, ForeignKey,
    Index, IntrospectionConfig, MigrationError, MigrationExecutor, MigrationGate,
    MigrationOptions, ModelBuilder, ModelProvider, OperationKind, OutcomeStatus, Provider,
    ReferentialAction, RowExt, SchemaIntrospector, Table,
};
use automigrate_sqlite::{SqliteConfig, SqliteConnection};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct User;

impl Entity for User {
    fn table() -> Table {
        Table::new("users")
            .column(Column::new("id", ColumnType::Int).auto_increment())
            .column(Column::new("name", ColumnType::VarChar(Some(100))))
            .primary_key(["id"])
    }
}

struct Post;

impl Entity for Post {
    fn table() -> Table {
        Table::new("posts")
            .column(Column::new("id", ColumnType::BigInt).auto_increment())
            .column(Column::new("user_id", ColumnType::Int))
            .column(Column::new("title", ColumnType::VarChar(Some(200))))
            .column(Column::new("published_at", ColumnType::DateTime).nullable())
            .primary_key(["id"])
            .foreign_key(
                ForeignKey::new(["user_id"], "users", ["id"]).on_delete(ReferentialAction::Cascade),
            )
            .unique(["user_id", "title"])
    }
}

async fn open(dir: &TempDir) -> Arc<SqliteConnection> {
    let config = SqliteConfig::file(dir.path().join("app.db"));
    Arc::new(SqliteConnection::open(config).await.unwrap())
}

fn executor(conn: &Arc<SqliteConnection>, model: impl ModelProvider + 'static) -> MigrationExecutor {
    MigrationExecutor::new(conn.clone(), Arc::new(model), MigrationGate::new()).unwrap()
}

fn users_model() -> DatabaseSchema {
    ModelBuilder::new().entity::<User>().build().unwrap()
}

async fn live_schema(conn: &SqliteConnection) -> DatabaseSchema {
    SchemaIntrospector::new(Provider::Sqlite, IntrospectionConfig::default())
        .introspect(conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_users_table_is_created_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;

    let outcome = executor(&conn, users_model())
        .migrate(&MigrationOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Applied);
    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].kind(), OperationKind::CreateTable);

    let live = live_schema(&conn).await;
    let users = live.table_named("users").unwrap();
    let columns: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["id", "name"]);
    assert_eq!(users.primary_key.as_ref().unwrap().columns, vec!["id".to_string()]);
    assert!(users.find_column("id").unwrap().auto_increment);
    assert!(!users.find_column("name").unwrap().nullable);
    assert!(live.table_named("__auto_migrations").is_none());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    let model = ModelBuilder::new().entity::<User>().entity::<Post>();
    let executor = executor(&conn, model);

    let first = executor.migrate(&MigrationOptions::default()).await.unwrap();
    assert_eq!(first.status, OutcomeStatus::Applied);
    assert_eq!(first.applied.len(), 2);

    let second = executor.migrate(&MigrationOptions::default()).await.unwrap();
    assert_eq!(second.status, OutcomeStatus::NoChanges);
    assert!(second.applied.is_empty());
    assert!(second.skipped.is_empty());

    let history = executor.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].operation_count, 2);
    assert_eq!(Some(&history[0]), first.record.as_ref());
}

#[tokio::test]
async fn test_foreign_keys_survive_introspection() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    executor(&conn, ModelBuilder::new().entity::<User>().entity::<Post>())
        .migrate(&MigrationOptions::default())
        .await
        .unwrap();

    let live = live_schema(&conn).await;
    let posts = live.table_named("posts").unwrap();
    assert_eq!(posts.foreign_keys.len(), 1);
    let fk = &posts.foreign_keys[0];
    assert_eq!(fk.referenced_table, "users");
    assert_eq!(fk.columns, vec!["user_id".to_string()]);
    assert_eq!(fk.referenced_columns, vec!["id".to_string()]);
    assert_eq!(fk.on_delete, ReferentialAction::Cascade);
    assert_eq!(posts.unique_constraints.len(), 1);
}

#[tokio::test]
async fn test_legacy_flag_is_kept_unless_drops_are_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    conn.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, legacy_flag INTEGER)",
    )
    .await
    .unwrap();

    let executor = executor(&conn, users_model());
    let outcome = executor.migrate(&MigrationOptions::default()).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::NoChanges);
    assert_eq!(
        outcome.skipped,
        vec![ChangeOperation::DropColumn {
            table: automigrate_core::TableRef::unqualified("users"),
            column: "legacy_flag".to_string(),
        }]
    );
    let live = live_schema(&conn).await;
    assert!(live.table_named("users").unwrap().find_column("legacy_flag").is_some());

    let outcome = executor
        .migrate(&MigrationOptions::default().allow_drop_column(true))
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Applied);
    let live = live_schema(&conn).await;
    assert!(live.table_named("users").unwrap().find_column("legacy_flag").is_none());
}

#[tokio::test]
async fn test_indexed_legacy_column_does_not_block_new_tables() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    conn.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, legacy_flag INTEGER)",
    )
    .await
    .unwrap();
    conn.execute("CREATE INDEX ix_legacy ON users(legacy_flag)").await.unwrap();

    let tags = Table::new("tags")
        .column(Column::new("id", ColumnType::Int).auto_increment())
        .column(Column::new("label", ColumnType::Text))
        .primary_key(["id"]);
    let model = DatabaseSchema::new().with_table(User::table()).with_table(tags);
    let options = MigrationOptions::default()
        .allow_drop_column(true)
        .halt_on_failure(false);

    let outcome = executor(&conn, model).migrate(&options).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Applied);
    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].kind(), OperationKind::CreateTable);
    let skipped: Vec<OperationKind> = outcome.skipped.iter().map(|op| op.kind()).collect();
    assert_eq!(skipped, vec![OperationKind::DropIndex, OperationKind::DropColumn]);

    let live = live_schema(&conn).await;
    assert!(live.table_named("tags").is_some());
    let users = live.table_named("users").unwrap();
    assert!(users.find_column("legacy_flag").is_some());
    assert_eq!(users.indexes.len(), 1);
}

#[tokio::test]
async fn test_new_not_null_column_gets_zero_default() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    let executor_v1 = executor(&conn, users_model());
    executor_v1.migrate(&MigrationOptions::default()).await.unwrap();
    conn.execute("INSERT INTO users (name) VALUES ('ada')").await.unwrap();

    let v2 = DatabaseSchema::new().with_table(
        User::table().column(Column::new("email", ColumnType::VarChar(Some(255)))),
    );
    let outcome = executor(&conn, v2.clone())
        .migrate(&MigrationOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Applied);
    assert_eq!(outcome.applied[0].kind(), OperationKind::AddColumn);

    let rows = conn.query("SELECT email FROM users").await.unwrap();
    assert_eq!(rows[0].get_str("email").as_deref(), Some(""));

    let again = executor(&conn, v2).migrate(&MigrationOptions::default()).await.unwrap();
    assert_eq!(again.status, OutcomeStatus::NoChanges);
}

#[tokio::test]
async fn test_drop_table_is_gated() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    conn.execute("CREATE TABLE old_sessions (token TEXT NOT NULL)").await.unwrap();

    let executor = executor(&conn, users_model());
    let outcome = executor.migrate(&MigrationOptions::default()).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Applied);
    assert!(outcome
        .skipped
        .iter()
        .any(|op| op.kind() == OperationKind::DropTable));
    assert!(live_schema(&conn).await.table_named("old_sessions").is_some());

    executor
        .migrate(&MigrationOptions::default().allow_drop_table(true))
        .await
        .unwrap();
    assert!(live_schema(&conn).await.table_named("old_sessions").is_none());
}

#[tokio::test]
async fn test_indexes_are_reported_as_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    let model = DatabaseSchema::new()
        .with_table(User::table().index(Index::new("users", ["name"])));

    let outcome = executor(&conn, model)
        .migrate(&MigrationOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Applied);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].kind(), OperationKind::CreateIndex);
    assert!(live_schema(&conn).await.table_named("users").unwrap().indexes.is_empty());
}

#[tokio::test]
async fn test_failed_batch_is_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    // A view is not a table, so introspection does not see it, but it blocks
    // the second CREATE TABLE.
    conn.execute("CREATE VIEW b AS SELECT 1 AS x").await.unwrap();

    let model = DatabaseSchema::new()
        .with_table(
            Table::new("a")
                .column(Column::new("id", ColumnType::Int))
                .primary_key(["id"]),
        )
        .with_table(
            Table::new("b")
                .column(Column::new("id", ColumnType::Int))
                .column(Column::new("a_id", ColumnType::Int))
                .primary_key(["id"])
                .foreign_key(ForeignKey::new(["a_id"], "a", ["id"])),
        );
    let executor = executor(&conn, model);

    let err = executor.migrate(&MigrationOptions::default()).await.unwrap_err();
    assert!(matches!(err, MigrationError::Execution(_)));

    let live = live_schema(&conn).await;
    assert!(live.table_named("a").is_none());
    assert!(executor.history().await.unwrap().is_empty());

    let outcome = executor
        .migrate(&MigrationOptions::default().halt_on_failure(false))
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.error.is_some());
    assert!(live_schema(&conn).await.table_named("a").is_none());
}

#[tokio::test]
async fn test_dry_run_leaves_database_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    let script_path = dir.path().join("migration.sql");

    let outcome = executor(&conn, users_model())
        .migrate(&MigrationOptions::default().dry_run(true).script_path(&script_path))
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::ScriptOnly);
    assert!(live_schema(&conn).await.is_empty());
    let script = std::fs::read_to_string(&script_path).unwrap();
    assert!(script.contains("CREATE TABLE \"users\""));
    assert!(!script.contains("__auto_migrations"));
}

#[tokio::test]
async fn test_backup_before_migration() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    let backups = dir.path().join("backups");

    let outcome = executor(&conn, users_model())
        .migrate(
            &MigrationOptions::default()
                .backup_database(true)
                .backup_dir(&backups),
        )
        .await
        .unwrap();

    let backup = outcome.backup.unwrap();
    assert!(backup.starts_with(&backups));
    assert!(backup.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(&dir).await;
    let gate = MigrationGate::new();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let executor = MigrationExecutor::new(
                conn.clone(),
                Arc::new(users_model()),
                gate.clone(),
            )
            .unwrap();
            tokio::spawn(async move { executor.migrate(&MigrationOptions::default()).await })
        })
        .collect();

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap().unwrap().status);
    }

    assert_eq!(
        statuses.iter().filter(|s| **s == OutcomeStatus::Applied).count(),
        1
    );
    assert_eq!(
        statuses.iter().filter(|s| **s == OutcomeStatus::NoChanges).count(),
        3
    );
    let history = executor(&conn, users_model()).history().await.unwrap();
    assert_eq!(history.len(), 1);
}
