//! Postgres persistence for generation records.
//!
//! This crate provides:
//! - Connection pool setup and embedded migrations
//! - The `GenerationStore` trait used by the reconciliation flow
//! - `PgGenerationStore`, the sqlx-backed implementation with
//!   dual-representation task-id correlation and optimistic status updates

pub mod error;
pub mod generations;
pub mod pool;
pub mod store;

pub use error::{DbError, DbResult};
pub use generations::PgGenerationStore;
pub use pool::{connect, connect_from_env, run_migrations};
pub use store::GenerationStore;
