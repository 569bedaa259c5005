//! SQLite backend for the ridings warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Multi-statement operations (batch
//! upsert, audit state transitions, geo lookup replacement) run inside a
//! single transaction on that thread, which is what gives the atomicity the
//! [`Warehouse`](ridings_core::store::Warehouse) contract requires.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteWarehouse;

#[cfg(test)]
mod tests;
