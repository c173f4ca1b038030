//! Extract-clean-aggregate-emit pipeline behind the forestry observatory dashboards.
//!
//! Each [`units::TransformUnit`] reads one source table, maps rows through a
//! declarative field map, aggregates and summarizes them, and writes a
//! `{ metadata, kpi, ... }` JSON document for the front end.

pub mod aggregate;
pub mod clean;
pub mod config;
pub mod document;
pub mod error;
pub mod kpi;
pub mod mapper;
pub mod runner;
pub mod source;
pub mod units;

pub use config::{EtlConfig, Topic};
pub use error::EtlError;
pub use runner::{run_batch, BatchReport, UnitState};
