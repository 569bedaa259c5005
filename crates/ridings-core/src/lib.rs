//! Core types and trait definitions for the ridings data warehouse.
//!
//! This crate is deliberately free of database and network dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod error;
pub mod geo;
pub mod indicator;
pub mod store;
pub mod table;

pub use error::{Error, Result};
