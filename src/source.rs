//! Event table loading
//!
//! Reads xrootd access records into a polars `DataFrame`. The aggregates only
//! look at the columns listed in [`EVENT_COLUMNS`]; anything else in the file
//! is carried along and ignored.

use crate::error::{AggError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

pub const OPERATION: &str = "operation";
pub const FILE_NAME: &str = "file_name";
pub const FILE_SIZE: &str = "file_size";
pub const READ_BYTES: &str = "read_bytes";
pub const APP_INFO: &str = "app_info";

/// Columns an xrootd event table must carry.
pub const EVENT_COLUMNS: [&str; 5] = [OPERATION, FILE_NAME, FILE_SIZE, READ_BYTES, APP_INFO];

/// Load an event table from a `.csv` or `.parquet` file
pub fn load_events(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(AggError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Event file not found: {}", path.display()),
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let df = match extension.as_str() {
        "csv" => LazyCsvReader::new(path).finish()?.collect()?,
        "parquet" => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?.collect()?,
        _ => return Err(AggError::UnsupportedInput(path.display().to_string())),
    };

    info!("Loaded {} events from {}", df.height(), path.display());
    debug!("Event columns: {:?}", df.get_column_names());

    Ok(df)
}

/// Fail with `MissingColumn` for the first of `columns` absent from `df`
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    let present = df.get_column_names();
    for name in columns {
        if !present.contains(name) {
            return Err(AggError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Fail with `NonNumericColumn` unless `column` holds a numeric dtype
pub fn require_numeric(df: &DataFrame, column: &str) -> Result<()> {
    require_columns(df, &[column])?;
    let dtype = df.column(column)?.dtype();
    // An all-null column has no values to misread
    if dtype.is_numeric() || *dtype == DataType::Null {
        return Ok(());
    }
    Err(AggError::NonNumericColumn {
        name: column.to_string(),
        dtype: dtype.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_columns_reports_first_missing() {
        let df = df! [
            "operation" => ["read"],
            "file_name" => ["a"],
        ]
        .unwrap();

        assert!(require_columns(&df, &[OPERATION, FILE_NAME]).is_ok());
        match require_columns(&df, &EVENT_COLUMNS) {
            Err(AggError::MissingColumn(name)) => assert_eq!(name, FILE_SIZE),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let df = df! [
            "operation" => ["read"],
            "file_name" => ["a"],
            "file_size" => [1i64],
            "read_bytes" => [1i64],
            "app_info" => ["u1"],
            "server_host" => ["eos01"],
        ]
        .unwrap();

        assert!(require_columns(&df, &EVENT_COLUMNS).is_ok());
    }

    #[test]
    fn test_require_numeric() {
        let df = df! [
            "file_size" => [100i64, 200],
            "read_bytes" => [0.5f64, 1.5],
            "app_info" => ["u1", "u2"],
        ]
        .unwrap();

        assert!(require_numeric(&df, FILE_SIZE).is_ok());
        assert!(require_numeric(&df, READ_BYTES).is_ok());
        assert!(matches!(
            require_numeric(&df, APP_INFO),
            Err(AggError::NonNumericColumn { name, .. }) if name == APP_INFO
        ));
        assert!(matches!(
            require_numeric(&df, OPERATION),
            Err(AggError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let path = std::env::temp_dir().join("monit_aggs_unsupported.txt");
        std::fs::write(&path, "operation,file_name\n").unwrap();

        let result = load_events(&path);
        assert!(matches!(result, Err(AggError::UnsupportedInput(_))));

        std::fs::remove_file(&path).ok();
    }
}
