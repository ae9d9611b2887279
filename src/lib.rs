//! Marker evaluation and failure diagnostics for a test runner.
//!
//! - [`repr`]: total, bounded rendering of arbitrary values.
//! - [`condition`]: skip/xfail condition evaluation, cached per evaluation context.
//! - [`location`]: report locations that survive working-directory changes.
//! - [`marker`]: the run / skip / expected-failure decision for an item.
//! - [`session`] ties them together; [`suite`] and [`cli`] drive it from YAML.

pub use crate::diagnostics::VerdictError;

pub mod cli;
pub mod condition;
pub mod config;
pub mod diagnostics;
pub mod location;
pub mod marker;
pub mod report;
pub mod repr;
pub mod session;
pub mod suite;
