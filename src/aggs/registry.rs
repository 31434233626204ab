//! Aggregate registration
//!
//! Every aggregate is an [`AggDefinition`]: a plain function pointer plus the
//! tags the runner dispatches on. Definitions are collected into an
//! [`AggRegistry`] once at startup and never change afterwards.

use crate::aggs::results::AggResults;
use crate::error::{AggError, Result};
use polars::prelude::DataFrame;
use serde::Serialize;

pub type RawAggFn = fn(&DataFrame) -> Result<f64>;
pub type ChunkedAggFn = fn(&DataFrame, bool) -> Result<f64>;
pub type PostAggFn = fn(&AggResults) -> Result<f64>;

/// How an aggregate is computed
#[derive(Clone, Copy)]
pub enum AggKind {
    /// Reduces event rows to a scalar
    Raw(RawAggFn),
    /// Raw aggregate that can also be computed partition by partition
    Chunked(ChunkedAggFn),
    /// Derived from already computed results; `depends_on` lists the keys it reads
    Post {
        func: PostAggFn,
        depends_on: &'static [&'static str],
    },
}

#[derive(Clone, Copy)]
pub struct AggDefinition {
    pub name: &'static str,
    pub source_name: &'static str,
    pub kind: AggKind,
}

impl AggDefinition {
    pub const fn raw(name: &'static str, source_name: &'static str, func: RawAggFn) -> Self {
        Self { name, source_name, kind: AggKind::Raw(func) }
    }

    pub const fn chunked(name: &'static str, source_name: &'static str, func: ChunkedAggFn) -> Self {
        Self { name, source_name, kind: AggKind::Chunked(func) }
    }

    pub const fn post(
        name: &'static str,
        source_name: &'static str,
        depends_on: &'static [&'static str],
        func: PostAggFn,
    ) -> Self {
        Self { name, source_name, kind: AggKind::Post { func, depends_on } }
    }

    pub fn is_post_agg(&self) -> bool {
        matches!(self.kind, AggKind::Post { .. })
    }

    pub fn supports_chunking(&self) -> bool {
        matches!(self.kind, AggKind::Chunked(_))
    }

    pub fn depends_on(&self) -> &'static [&'static str] {
        match self.kind {
            AggKind::Post { depends_on, .. } => depends_on,
            _ => &[],
        }
    }

    pub fn info(&self) -> AggInfo {
        AggInfo {
            name: self.name.to_string(),
            source_name: self.source_name.to_string(),
            is_post_agg: self.is_post_agg(),
            supports_chunking: self.supports_chunking(),
            depends_on: self.depends_on().iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl std::fmt::Debug for AggDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggDefinition")
            .field("name", &self.name)
            .field("source_name", &self.source_name)
            .field("is_post_agg", &self.is_post_agg())
            .field("supports_chunking", &self.supports_chunking())
            .finish()
    }
}

/// Serializable view of a definition's tags, used for `--list`
#[derive(Debug, Clone, Serialize)]
pub struct AggInfo {
    pub name: String,
    pub source_name: String,
    pub is_post_agg: bool,
    pub supports_chunking: bool,
    pub depends_on: Vec<String>,
}

/// Aggregate definitions in registration order
#[derive(Debug, Default, Clone)]
pub struct AggRegistry {
    defs: Vec<AggDefinition>,
}

impl AggRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every aggregate this crate ships
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        crate::aggs::xrootd::register_xrootd(&mut registry)?;
        Ok(registry)
    }

    pub fn register(&mut self, def: AggDefinition) -> Result<()> {
        if self.get(def.name).is_some() {
            return Err(AggError::DuplicateAgg(def.name.to_string()));
        }
        self.defs.push(def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AggDefinition> {
        self.defs.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggDefinition> {
        self.defs.iter()
    }

    pub fn for_source<'a>(&'a self, source_name: &'a str) -> impl Iterator<Item = &'a AggDefinition> {
        self.defs.iter().filter(move |d| d.source_name == source_name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
