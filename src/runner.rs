//! Aggregate runner
//!
//! Runs every registered aggregate for the configured source over one event
//! table: raw aggregates first, in registration order, then post-aggregates
//! ordered so each one runs after the post-aggregates it reads from.

use crate::aggs::{AggDefinition, AggKind, AggRegistry, AggResults};
use crate::config::{AggConfig, ZeroDenominatorPolicy};
use crate::error::{AggError, Result};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct AggRunner {
    registry: AggRegistry,
    config: AggConfig,
}

/// Output of one run, as written by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct AggReport {
    pub source: String,
    pub computed_at: DateTime<Utc>,
    pub rows: usize,
    pub chunked: bool,
    pub results: AggResults,
}

impl AggRunner {
    pub fn new(registry: AggRegistry, config: AggConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &AggRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AggConfig {
        &self.config
    }

    /// Compute all aggregates for the configured source
    pub fn run(&self, df: &DataFrame) -> Result<AggResults> {
        let defs: Vec<&AggDefinition> = self.registry.for_source(&self.config.source).collect();
        if defs.is_empty() {
            return Err(AggError::UnknownSource(self.config.source.clone()));
        }

        info!(
            "Running {} {} aggregates over {} rows (chunked: {})",
            defs.len(),
            self.config.source,
            df.height(),
            self.config.chunked
        );

        let mut results = AggResults::new();

        for def in &defs {
            let value = match def.kind {
                AggKind::Raw(func) => func(df)?,
                AggKind::Chunked(func) => func(df, self.config.chunked)?,
                AggKind::Post { .. } => continue,
            };
            debug!("{} = {}", def.name, value);
            results.insert(def.name, value);
        }

        for def in post_agg_order(&defs)? {
            if let AggKind::Post { func, .. } = def.kind {
                let value = func(&results)?;
                self.check_finite(def.name, value)?;
                debug!("{} = {}", def.name, value);
                results.insert(def.name, value);
            }
        }

        info!("Computed {} aggregates", results.len());
        Ok(results)
    }

    pub fn report(&self, df: &DataFrame) -> Result<AggReport> {
        let results = self.run(df)?;
        Ok(AggReport {
            source: self.config.source.clone(),
            computed_at: Utc::now(),
            rows: df.height(),
            chunked: self.config.chunked,
            results,
        })
    }

    fn check_finite(&self, name: &str, value: f64) -> Result<()> {
        if value.is_finite() {
            return Ok(());
        }
        match self.config.zero_denominator {
            ZeroDenominatorPolicy::Propagate => {
                warn!("{} is {} (zero denominator)", name, value);
                Ok(())
            }
            ZeroDenominatorPolicy::Error => Err(AggError::NonFinite {
                name: name.to_string(),
                value,
            }),
        }
    }
}

/// Order post-aggregates so dependencies on other post-aggregates come first.
/// Registration order is kept among aggregates that are ready at the same time.
fn post_agg_order<'a>(defs: &[&'a AggDefinition]) -> Result<Vec<&'a AggDefinition>> {
    let mut pending: Vec<&AggDefinition> = defs.iter().copied().filter(|d| d.is_post_agg()).collect();
    let post_names: HashSet<&str> = pending.iter().map(|d| d.name).collect();

    let mut ordered = Vec::with_capacity(pending.len());
    let mut done: HashSet<&str> = HashSet::new();

    while !pending.is_empty() {
        let (ready, blocked): (Vec<&AggDefinition>, Vec<&AggDefinition>) =
            pending.into_iter().partition(|d| {
                d.depends_on()
                    .iter()
                    .all(|dep| done.contains(dep) || !post_names.contains(dep))
            });

        if ready.is_empty() {
            let names: Vec<&str> = blocked.iter().map(|d| d.name).collect();
            return Err(AggError::DependencyCycle(names.join(", ")));
        }

        done.extend(ready.iter().map(|d| d.name));
        ordered.extend(ready);
        pending = blocked;
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggs::xrootd;
    use polars::prelude::*;

    fn events() -> DataFrame {
        df! [
            "operation" => ["read", "read", "write"],
            "file_name" => ["a", "a", "b"],
            "file_size" => [100i64, 100, 200],
            "read_bytes" => [50i64, 30, 0],
            "app_info" => ["u1", "u2", "u1"],
        ]
        .unwrap()
    }

    fn default_runner(config: AggConfig) -> AggRunner {
        AggRunner::new(AggRegistry::with_defaults().unwrap(), config)
    }

    fn rows(df: &DataFrame) -> Result<f64> {
        Ok(df.height() as f64)
    }

    fn double_ratio(aggs: &AggResults) -> Result<f64> {
        Ok(aggs.get("ratio")? * 2.0)
    }

    fn ratio(aggs: &AggResults) -> Result<f64> {
        Ok(aggs.get("rows")? / 2.0)
    }

    #[test]
    fn test_run_produces_every_aggregate() {
        let results = default_runner(AggConfig::default()).run(&events()).unwrap();

        assert_eq!(results.len(), 8);
        assert_eq!(results.get(xrootd::NUM_UNIQUE_FILE_ACCESS).unwrap(), 3.0);
        assert_eq!(results.get(xrootd::NUM_UNIQUE_FILES).unwrap(), 2.0);
        assert_eq!(results.get(xrootd::REUSE_MULT_1).unwrap(), 1.5);
        assert_eq!(
            results.get(xrootd::REUSE_MULT_2).unwrap(),
            ((100.0 + 100.0 + 200.0) / 1e12) / (100.0 / 1e12)
        );
        assert_eq!(
            results.get(xrootd::REUSE_MULT_3).unwrap(),
            ((50.0 + 30.0 + 0.0) / 1e12) / (100.0 / 1e12)
        );
    }

    #[test]
    fn test_chunked_run_matches() {
        let single = default_runner(AggConfig::default()).run(&events()).unwrap();
        let chunked = default_runner(AggConfig { chunked: true, ..AggConfig::default() })
            .run(&events())
            .unwrap();
        assert_eq!(single, chunked);
    }

    #[test]
    fn test_zero_working_set_propagates_by_default() {
        let df = df! [
            "operation" => ["write"],
            "file_name" => ["a"],
            "file_size" => [10i64],
            "read_bytes" => [0i64],
            "app_info" => ["u1"],
        ]
        .unwrap();

        let results = default_runner(AggConfig::default()).run(&df).unwrap();
        assert_eq!(results.get(xrootd::WORKING_SET).unwrap(), 0.0);
        assert_eq!(results.get(xrootd::REUSE_MULT_2).unwrap(), f64::INFINITY);
        assert!(results.get(xrootd::REUSE_MULT_3).unwrap().is_nan());
    }

    #[test]
    fn test_zero_working_set_fails_with_error_policy() {
        let df = df! [
            "operation" => ["write"],
            "file_name" => ["a"],
            "file_size" => [10i64],
            "read_bytes" => [0i64],
            "app_info" => ["u1"],
        ]
        .unwrap();

        let config = AggConfig {
            zero_denominator: ZeroDenominatorPolicy::Error,
            ..AggConfig::default()
        };
        match default_runner(config).run(&df) {
            Err(AggError::NonFinite { name, value }) => {
                assert_eq!(name, xrootd::REUSE_MULT_2);
                assert!(value.is_infinite());
            }
            other => panic!("expected NonFinite, got {:?}", other),
        }
    }

    #[test]
    fn test_post_aggs_run_after_their_dependencies() {
        let mut registry = AggRegistry::new();
        registry
            .register(AggDefinition::post("double_ratio", "test", &["ratio"], double_ratio))
            .unwrap();
        registry
            .register(AggDefinition::post("ratio", "test", &["rows"], ratio))
            .unwrap();
        registry.register(AggDefinition::raw("rows", "test", rows)).unwrap();

        let config = AggConfig { source: "test".to_string(), ..AggConfig::default() };
        let results = AggRunner::new(registry, config).run(&events()).unwrap();

        assert_eq!(results.get("rows").unwrap(), 3.0);
        assert_eq!(results.get("ratio").unwrap(), 1.5);
        assert_eq!(results.get("double_ratio").unwrap(), 3.0);
    }

    #[test]
    fn test_dependency_cycle() {
        let mut registry = AggRegistry::new();
        registry
            .register(AggDefinition::post("ratio", "test", &["double_ratio"], ratio))
            .unwrap();
        registry
            .register(AggDefinition::post("double_ratio", "test", &["ratio"], double_ratio))
            .unwrap();

        let config = AggConfig { source: "test".to_string(), ..AggConfig::default() };
        let result = AggRunner::new(registry, config).run(&events());
        assert!(matches!(result, Err(AggError::DependencyCycle(_))));
    }

    #[test]
    fn test_missing_column_propagates() {
        let df = df! [
            "operation" => ["read"],
            "file_name" => ["a"],
            "file_size" => [1i64],
            "app_info" => ["u1"],
        ]
        .unwrap();

        let result = default_runner(AggConfig::default()).run(&df);
        assert!(matches!(result, Err(AggError::MissingColumn(name)) if name == "read_bytes"));
    }

    #[test]
    fn test_unknown_source() {
        let config = AggConfig { source: "eos".to_string(), ..AggConfig::default() };
        let result = default_runner(config).run(&events());
        assert!(matches!(result, Err(AggError::UnknownSource(name)) if name == "eos"));
    }

    #[test]
    fn test_report() {
        let report = default_runner(AggConfig::default()).report(&events()).unwrap();
        assert_eq!(report.source, "xrootd");
        assert_eq!(report.rows, 3);
        assert!(!report.chunked);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"]["num_unique_files"], serde_json::json!(2.0));
    }
}
