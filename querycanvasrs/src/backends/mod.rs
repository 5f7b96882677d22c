//! Executors backed by a real database engine.
//!
//! Each backend lives in its own file behind a feature flag; the simulated
//! executor in [`crate::executor`] is always available.

#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use duckdb::DuckDbExecutor;
