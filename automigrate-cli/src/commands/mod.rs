//! CLI command implementations.

pub mod history;
pub mod introspect;
pub mod migrate;
pub mod plan;
pub mod version;
