//! SHIFTGATE Database — SurrealDB connection management, schema
//! migrations, and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Repository implementations for the `shiftgate-core` traits
//!
//! Compound mutations (a session insert plus its quota increment plus
//! the lifecycle event) are issued as single multi-statement queries,
//! which SurrealDB executes as one transaction.

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
