//! Aggregate definitions
//!
//! - `registry`: tagged aggregate definitions and the registry built at startup
//! - `results`: the name → value mapping post-aggregates read from
//! - `xrootd`: aggregates over xrootd file-access events

pub mod registry;
pub mod results;
pub mod xrootd;

pub use registry::{AggDefinition, AggInfo, AggKind, AggRegistry};
pub use results::AggResults;
