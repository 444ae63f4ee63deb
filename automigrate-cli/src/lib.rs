//! automigrate CLI - Command-line interface for the automigrate engine.
//!
//! This crate provides the `automigrate` binary, which reads
//! `automigrate.toml`, compares the declared model with the live database
//! and applies or prints the resulting migration.

pub mod cli;
pub mod commands;
pub mod config;
pub mod connect;
pub mod error;
pub mod logging;
pub mod output;
