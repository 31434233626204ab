pub mod aggs;
pub mod config;
pub mod error;
pub mod runner;
pub mod source;

pub use aggs::{AggDefinition, AggKind, AggRegistry, AggResults};
pub use config::{AggConfig, ZeroDenominatorPolicy};
pub use error::{AggError, Result};
pub use runner::{AggReport, AggRunner};
