//! Labeled text datasets: schema, TSV loading and train/test splitting.

use std::path::PathBuf;

use thiserror::Error;

pub mod loader;
pub mod schema;
pub mod split;

pub use loader::{load_tsv, read_tsv};
pub use schema::{Dataset, Example, LabelLiterals, RecordSchema};
pub use split::{Split, train_test_split};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse dataset {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path}:{line}: found {found} columns, expected at least {expected}")]
    MissingColumns {
        path: PathBuf,
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("{path}:{line}: column {column} value {value:?} is not a boolean label")]
    InvalidLabel {
        path: PathBuf,
        line: usize,
        column: usize,
        value: String,
    },
    #[error("Test fraction must be in (0, 1), got {0}")]
    InvalidFraction(f64),
    #[error("Dataset has {0} rows; at least 2 are needed to split")]
    TooSmallToSplit(usize),
}
