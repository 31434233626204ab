//! XRootD aggregations
//!
//! Raw aggregates reduce an xrootd access table to one number; volumes are
//! reported in terabytes. The `reuse_mult_*` post-aggregates are ratios of
//! those numbers and are left as `inf`/`NaN` when the denominator is zero.

use crate::aggs::registry::{AggDefinition, AggRegistry};
use crate::aggs::results::AggResults;
use crate::error::Result;
use crate::source::{
    require_columns, require_numeric, APP_INFO, FILE_NAME, FILE_SIZE, OPERATION, READ_BYTES,
};
use polars::prelude::*;
use tracing::debug;

pub const SOURCE_NAME: &str = "xrootd";

pub const WORKING_SET: &str = "working_set";
pub const TOTAL_NAIVE_READS: &str = "total_naive_reads";
pub const TOTAL_ACTUAL_READS: &str = "total_actual_reads";
pub const NUM_UNIQUE_FILE_ACCESS: &str = "num_unique_file_access";
pub const NUM_UNIQUE_FILES: &str = "num_unique_files";
pub const REUSE_MULT_1: &str = "reuse_mult_1";
pub const REUSE_MULT_2: &str = "reuse_mult_2";
pub const REUSE_MULT_3: &str = "reuse_mult_3";

const BYTES_PER_TB: f64 = 1e12;

/// Rows per partition when `working_set` runs chunked
pub const WORKING_SET_CHUNK_ROWS: usize = 100_000;

pub fn register_xrootd(registry: &mut AggRegistry) -> Result<()> {
    registry.register(AggDefinition::chunked(WORKING_SET, SOURCE_NAME, working_set))?;
    registry.register(AggDefinition::raw(TOTAL_NAIVE_READS, SOURCE_NAME, total_naive_reads))?;
    registry.register(AggDefinition::raw(TOTAL_ACTUAL_READS, SOURCE_NAME, total_actual_reads))?;
    registry.register(AggDefinition::raw(NUM_UNIQUE_FILE_ACCESS, SOURCE_NAME, num_unique_file_access))?;
    registry.register(AggDefinition::raw(NUM_UNIQUE_FILES, SOURCE_NAME, num_unique_files))?;
    registry.register(AggDefinition::post(
        REUSE_MULT_1,
        SOURCE_NAME,
        &[NUM_UNIQUE_FILE_ACCESS, NUM_UNIQUE_FILES],
        reuse_mult_1,
    ))?;
    registry.register(AggDefinition::post(
        REUSE_MULT_2,
        SOURCE_NAME,
        &[TOTAL_NAIVE_READS, WORKING_SET],
        reuse_mult_2,
    ))?;
    registry.register(AggDefinition::post(
        REUSE_MULT_3,
        SOURCE_NAME,
        &[TOTAL_ACTUAL_READS, WORKING_SET],
        reuse_mult_3,
    ))?;
    Ok(())
}

/// Volume of distinct `(file_name, file_size)` pairs touched by reads, in TB.
///
/// With `chunked` the table is reduced partition by partition and the
/// partial results merged; the value is the same either way.
pub fn working_set(df: &DataFrame, chunked: bool) -> Result<f64> {
    if chunked {
        working_set_with_chunk_rows(df, WORKING_SET_CHUNK_ROWS)
    } else {
        require_columns(df, &[OPERATION, FILE_NAME])?;
        require_numeric(df, FILE_SIZE)?;
        sum_distinct_sizes(distinct_read_files(df.clone().lazy()))
    }
}

pub fn working_set_with_chunk_rows(df: &DataFrame, chunk_rows: usize) -> Result<f64> {
    require_columns(df, &[OPERATION, FILE_NAME])?;
    require_numeric(df, FILE_SIZE)?;
    let chunk_rows = chunk_rows.max(1);

    let mut partials = Vec::new();
    let mut offset = 0;
    while offset < df.height() {
        let chunk = df.slice(offset as i64, chunk_rows);
        // Materialise each partial so only its distinct pairs are kept around
        partials.push(distinct_read_files(chunk.lazy()).collect()?.lazy());
        offset += chunk_rows;
    }
    debug!("working_set reduced {} rows in {} chunks", df.height(), partials.len());

    if partials.is_empty() {
        return Ok(0.0);
    }
    let merged = concat(partials, UnionArgs::default())?;
    sum_distinct_sizes(merged)
}

/// Total nominal size of every accessed file, in TB. Not restricted to reads.
pub fn total_naive_reads(df: &DataFrame) -> Result<f64> {
    Ok(sum_column(df, FILE_SIZE)? / BYTES_PER_TB)
}

/// Bytes actually transferred, in TB
pub fn total_actual_reads(df: &DataFrame) -> Result<f64> {
    Ok(sum_column(df, READ_BYTES)? / BYTES_PER_TB)
}

/// Number of distinct `(file_name, app_info)` pairs
pub fn num_unique_file_access(df: &DataFrame) -> Result<f64> {
    require_columns(df, &[FILE_NAME, APP_INFO])?;
    let out = df
        .clone()
        .lazy()
        .filter(col(FILE_NAME).is_not_null())
        .group_by([col(FILE_NAME)])
        .agg([col(APP_INFO).drop_nulls().n_unique().alias("distinct_apps")])
        .select([col("distinct_apps").cast(DataType::Float64).sum()])
        .collect()?;
    first_value(&out, "distinct_apps")
}

pub fn num_unique_files(df: &DataFrame) -> Result<f64> {
    require_columns(df, &[FILE_NAME])?;
    let out = df
        .clone()
        .lazy()
        .select([col(FILE_NAME).drop_nulls().n_unique()])
        .collect()?;
    first_value(&out, FILE_NAME)
}

/// Distinct accessing contexts per unique file
pub fn reuse_mult_1(aggs: &AggResults) -> Result<f64> {
    Ok(aggs.get(NUM_UNIQUE_FILE_ACCESS)? / aggs.get(NUM_UNIQUE_FILES)?)
}

/// Nominal read volume over working set; above 1 means files were re-read
pub fn reuse_mult_2(aggs: &AggResults) -> Result<f64> {
    Ok(aggs.get(TOTAL_NAIVE_READS)? / aggs.get(WORKING_SET)?)
}

/// Transferred volume over working set
pub fn reuse_mult_3(aggs: &AggResults) -> Result<f64> {
    Ok(aggs.get(TOTAL_ACTUAL_READS)? / aggs.get(WORKING_SET)?)
}

fn distinct_read_files(lf: LazyFrame) -> LazyFrame {
    lf.filter(col(OPERATION).eq(lit("read")))
        .select([col(FILE_NAME), col(FILE_SIZE)])
        .unique(None, UniqueKeepStrategy::Any)
}

fn sum_distinct_sizes(pairs: LazyFrame) -> Result<f64> {
    let out = pairs
        .unique(None, UniqueKeepStrategy::Any)
        .select([col(FILE_SIZE).cast(DataType::Float64).sum()])
        .collect()?;
    Ok(first_value(&out, FILE_SIZE)? / BYTES_PER_TB)
}

fn sum_column(df: &DataFrame, column: &str) -> Result<f64> {
    require_numeric(df, column)?;
    let out = df
        .clone()
        .lazy()
        .select([col(column).cast(DataType::Float64).sum()])
        .collect()?;
    first_value(&out, column)
}

fn first_value(df: &DataFrame, column: &str) -> Result<f64> {
    let series = df.column(column)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.get(0).unwrap_or(0.0))
}
