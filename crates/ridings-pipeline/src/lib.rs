//! The domain pipeline layer: one five-stage sequence — extract → validate →
//! normalise → [aggregate] → upsert — with the extraction audit lifecycle
//! woven through it.
//!
//! Runs against any [`Warehouse`](ridings_core::store::Warehouse) and any
//! [`Extractor`]. The real HTTP clients for the statistical sources are
//! external collaborators; this crate only defines the seam they plug into.

// Native async fns in traits; see ridings-core.
#![allow(async_fn_in_trait)]

pub mod def;
pub mod error;
pub mod extract;
pub mod runner;

pub use def::{PipelineDef, catalog, find_pipeline};
pub use error::{Error, Result};
pub use extract::{Extracted, Extractor, FileExtractor};
pub use runner::{RunOptions, RunReport, run_pipeline};

#[cfg(test)]
mod tests;
