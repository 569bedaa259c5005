//! Pure transforms between raw extracted tables and the canonical Indicator
//! shape: schema validation, normalisation, and LSOA→LAD geo aggregation.
//!
//! Nothing in this crate touches storage or the network. Every function takes
//! its inputs by reference and reports non-fatal findings (missing districts,
//! unmatched geography codes, suppressed values) in its return value rather
//! than raising.

mod cell;

pub mod aggregate;
pub mod error;
pub mod normalise;
pub mod validate;

pub use error::{Error, Result};
