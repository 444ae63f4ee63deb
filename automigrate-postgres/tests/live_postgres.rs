//! Migration runs against a live PostgreSQL server.
//!
//! These tests need `AUTOMIGRATE_TEST_PG_URL` pointing at a disposable
//! database and are ignored by default:
//!
//! ```text
//! AUTOMIGRATE_TEST_PG_URL=postgres://postgres@localhost/automigrate_test \
//!     cargo test -p automigrate-postgres -- --ignored
//! ```

use std::sync::Arc;

use automigrate_core::{
    Column, ColumnType, DatabaseConnection, DatabaseSchema, ForeignKey, IntrospectionConfig,
    MigrationExecutor, MigrationGate, MigrationOptions, OutcomeStatus, Provider,
    SchemaIntrospector, Table,
};
use automigrate_postgres::PgConnection;
use pretty_assertions::assert_eq;

async fn connect() -> Option<Arc<PgConnection>> {
    let url = std::env::var("AUTOMIGRATE_TEST_PG_URL").ok()?;
    let conn = PgConnection::connect_url(&url).await.unwrap();
    conn.execute("DROP SCHEMA IF EXISTS public CASCADE; CREATE SCHEMA public")
        .await
        .unwrap();
    Some(Arc::new(conn))
}

fn model() -> DatabaseSchema {
    DatabaseSchema::new()
        .with_table(
            Table::new("users")
                .column(Column::new("id", ColumnType::Int).auto_increment())
                .column(Column::new("name", ColumnType::VarChar(Some(100))))
                .column(Column::new("active", ColumnType::Boolean).default_value("TRUE"))
                .primary_key(["id"])
                .unique(["name"]),
        )
        .with_table(
            Table::new("posts")
                .column(Column::new("id", ColumnType::BigInt).auto_increment())
                .column(Column::new("user_id", ColumnType::Int))
                .column(Column::new("body", ColumnType::Text).nullable())
                .primary_key(["id"])
                .foreign_key(ForeignKey::new(["user_id"], "users", ["id"])),
        )
}

#[tokio::test]
#[ignore]
async fn test_migrate_is_idempotent() {
    let Some(conn) = connect().await else {
        return;
    };
    let executor =
        MigrationExecutor::new(conn.clone(), Arc::new(model()), MigrationGate::new()).unwrap();

    let first = executor.migrate(&MigrationOptions::default()).await.unwrap();
    assert_eq!(first.status, OutcomeStatus::Applied);

    let second = executor.migrate(&MigrationOptions::default()).await.unwrap();
    assert_eq!(second.status, OutcomeStatus::NoChanges);
    assert!(second.skipped.is_empty());

    assert_eq!(executor.history().await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_introspection_reads_keys() {
    let Some(conn) = connect().await else {
        return;
    };
    conn.execute_batch(
        "CREATE TABLE users (id SERIAL PRIMARY KEY, name VARCHAR(100) NOT NULL UNIQUE);
         CREATE TABLE posts (id BIGSERIAL PRIMARY KEY, user_id INTEGER NOT NULL REFERENCES users (id))",
    )
    .await
    .unwrap();

    let live = SchemaIntrospector::new(Provider::Postgres, IntrospectionConfig::default())
        .introspect(conn.as_ref())
        .await
        .unwrap();

    let users = live.table_named("users").unwrap();
    assert_eq!(users.schema, None);
    assert!(users.find_column("id").unwrap().auto_increment);
    assert_eq!(users.unique_constraints.len(), 1);
    assert!(live.sequences.is_empty());

    let posts = live.table_named("posts").unwrap();
    assert_eq!(posts.foreign_keys[0].referenced_table, "users");
}
