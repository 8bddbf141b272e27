//! N2T monthly usage report
//!
//! Rollups over the resolver's request log for one month, joined against a
//! country reference table and world geometry, handed to a report sink.

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod join;
pub mod month;
pub mod naan;
pub mod reference;
pub mod report;
pub mod sink;

pub use error::{JoinIntegrityWarning, ReportError, Result};
pub use month::Month;
