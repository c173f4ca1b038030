use std::path::PathBuf;

use thiserror::Error;

/// Failures the batch runner needs to tell apart from generic IO errors.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("unit '{unit}': no input matching {patterns:?} in {dir}")]
    MissingInput {
        unit: String,
        dir: PathBuf,
        patterns: Vec<String>,
    },
    #[error("unsupported input format for {0}")]
    UnsupportedFormat(PathBuf),
    #[error("workbook {0} has no worksheets")]
    EmptyWorkbook(PathBuf),
    #[error("unknown unit '{name}' (known units: {known})")]
    UnknownUnit { name: String, known: String },
    #[error("invalid --as-of date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}
