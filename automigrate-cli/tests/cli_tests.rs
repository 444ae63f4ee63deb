//! Integration tests for the automigrate CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const USERS_SCHEMA: &str = r#"
[[tables]]
name = "users"
primary_key = { columns = ["id"] }

[[tables.columns]]
name = "id"
type = "int"
auto_increment = true

[[tables.columns]]
name = "email"
type = "varchar(255)"
"#;

/// Get the automigrate binary
#[allow(deprecated)]
fn automigrate_cmd() -> Command {
    let mut cmd = Command::cargo_bin("automigrate").unwrap();
    cmd.env_remove("AUTOMIGRATE_DATABASE_URL")
        .env_remove("AUTOMIGRATE_LOG");
    cmd
}

/// Create a project with a SQLite database and the given model
fn project(schema: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let config = format!(
        "[database]\nurl = \"sqlite://{}\"\n\n[model]\npath = \"schema.toml\"\n",
        db.display()
    );
    fs::write(dir.path().join("automigrate.toml"), config).unwrap();
    fs::write(dir.path().join("schema.toml"), schema).unwrap();
    let config_path = dir.path().join("automigrate.toml");
    (dir, config_path)
}

fn run(config: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    automigrate_cmd()
        .arg("--config")
        .arg(config)
        .args(args)
        .assert()
}

#[test]
fn test_help_command() {
    automigrate_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Automatic schema migrations"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("introspect"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn test_version_command() {
    automigrate_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_config() {
    let dir = TempDir::new().unwrap();
    run(&dir.path().join("automigrate.toml"), &["migrate"])
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_plan_prints_script_without_applying() {
    let (dir, config) = project(USERS_SCHEMA);

    run(&config, &["plan"])
        .success()
        .stdout(predicate::str::contains("CREATE TABLE"))
        .stdout(predicate::str::contains("users"));

    let out = dir.path().join("plan.sql");
    run(&config, &["plan", "--output", out.to_str().unwrap()]).success();
    assert!(fs::read_to_string(&out).unwrap().contains("CREATE TABLE"));

    // Nothing was applied, so the plan is unchanged
    run(&config, &["history"])
        .success()
        .stdout(predicate::str::contains("No migrations have been applied"));
}

#[test]
fn test_migrate_then_history() {
    let (_dir, config) = project(USERS_SCHEMA);

    run(&config, &["migrate"])
        .success()
        .stdout(predicate::str::contains("applied"))
        .stdout(predicate::str::contains("CreateTable users"));

    run(&config, &["migrate"])
        .success()
        .stdout(predicate::str::contains("Database is up to date"));

    run(&config, &["history"])
        .success()
        .stdout(predicate::str::contains("1 migration(s)"));

    run(&config, &["plan"])
        .success()
        .stdout(predicate::str::contains("No pending model changes"));
}

#[test]
fn test_migrate_dry_run_writes_script() {
    let (dir, config) = project(USERS_SCHEMA);
    let script = dir.path().join("out/migration.sql");

    run(
        &config,
        &["migrate", "--dry-run", "--script", script.to_str().unwrap()],
    )
    .success()
    .stdout(predicate::str::contains("Dry run"));

    assert!(fs::read_to_string(&script).unwrap().contains("CREATE TABLE"));
    run(&config, &["history"])
        .success()
        .stdout(predicate::str::contains("No migrations have been applied"));
}

#[test]
fn test_drop_column_requires_flag() {
    let (dir, config) = project(USERS_SCHEMA);
    run(&config, &["migrate"]).success();

    let trimmed = USERS_SCHEMA.replace(
        "\n[[tables.columns]]\nname = \"email\"\ntype = \"varchar(255)\"\n",
        "\n",
    );
    fs::write(dir.path().join("schema.toml"), trimmed).unwrap();

    run(&config, &["migrate"])
        .success()
        .stdout(predicate::str::contains("skipped by policy"))
        .stdout(predicate::str::contains("DropColumn users.email"));

    run(&config, &["migrate", "--allow-drop-column"])
        .success()
        .stdout(predicate::str::contains("Applied 1 operation(s)"));
}

#[test]
fn test_introspect_formats() {
    let (dir, config) = project(USERS_SCHEMA);
    run(&config, &["migrate"]).success();

    run(&config, &["introspect"])
        .success()
        .stdout(predicate::str::contains("name = \"users\""))
        .stdout(predicate::str::contains("__auto_migrations").not());

    let out = dir.path().join("live.json");
    run(
        &config,
        &["introspect", "--format", "json", "--output", out.to_str().unwrap()],
    )
    .success();
    let json = fs::read_to_string(&out).unwrap();
    assert!(json.contains("\"tables\""));
    assert!(json.contains("\"email\""));
}

#[test]
fn test_unsupported_driver() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("automigrate.toml");
    fs::write(&config, "[database]\nurl = \"mysql://localhost/app\"\n").unwrap();
    fs::write(dir.path().join("schema.toml"), USERS_SCHEMA).unwrap();

    run(&config, &["migrate"])
        .failure()
        .stderr(predicate::str::contains("no driver for provider"));
}
