//! # Score Table Loading
//!
//! Reads a tab-separated file holding one outcome column and one column of
//! precomputed positive-class probabilities per scoring system (for example
//! APACHE IV or a model scored elsewhere). Every column other than the
//! outcome and the optional `id` column becomes an [`ExternalAdapter`], so
//! the evaluators can compare all of them uniformly.
//!
//! - The row order of the file is the cohort order. Adapters ignore the
//!   feature matrix, so the labels stay aligned only because they come from
//!   the same file.
//! - Missing, non-numeric or non-finite entries are rejected; imputation is
//!   not this module's job.

use crate::classifier::{ClassifierError, ExternalAdapter, NamedModel, SharedClassifier};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub const ID_COLUMN: &str = "id";
pub const DEFAULT_LABEL_COLUMN: &str = "outcome";

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error("Missing or null values were found in the column '{0}'.")]
    MissingValuesFound(String),
    #[error("Non-finite values (NaN or Infinity) were found in the column '{0}'.")]
    NonFiniteValuesFound(String),
    #[error("Outcome column '{column}' has value {value} at row {row}; outcomes must be 0 or 1.")]
    NonBinaryLabel {
        column: String,
        row: usize,
        value: f64,
    },
    #[error("The input file contains no data rows.")]
    EmptyTable,
    #[error("The input file has no score columns besides '{0}' and 'id'.")]
    NoScoreColumns(String),
    #[error("Score column '{column}' is not a probability vector: {source}")]
    InvalidScores {
        column: String,
        #[source]
        source: ClassifierError,
    },
}

/// One scoring system's probabilities, wrapped for the evaluators.
#[derive(Debug, Clone)]
pub struct ScoreColumn {
    pub name: String,
    pub adapter: Arc<ExternalAdapter>,
}

/// A validated cohort: identifiers, outcomes and one score column per model.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    pub ids: Vec<String>,
    pub labels: Array1<f64>,
    pub columns: Vec<ScoreColumn>,
}

impl ScoreTable {
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    /// The score columns as a named model panel, in file order.
    pub fn models(&self) -> Vec<NamedModel> {
        self.columns
            .iter()
            .map(|c| {
                let model: SharedClassifier = c.adapter.clone();
                NamedModel::new(c.name.clone(), model)
            })
            .collect()
    }

    pub fn model(&self, name: &str) -> Option<SharedClassifier> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| -> SharedClassifier { c.adapter.clone() })
    }

    /// A feature matrix with one row per patient and no columns. Stored
    /// scores ignore features, so this only carries the row count.
    pub fn placeholder_features(&self) -> Array2<f64> {
        Array2::zeros((self.n_rows(), 0))
    }
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: format!("{:?}", series.dtype()),
    };
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let values: Vec<f64> = casted.f64()?.rechunk().into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

fn build_ids(df: &DataFrame, n: usize) -> Result<Vec<String>, DataError> {
    let has_ids = df.get_column_names().iter().any(|c| c.as_str() == ID_COLUMN);
    if !has_ids {
        return Ok((1..=n).map(|i| i.to_string()).collect());
    }
    let casted = df.column(ID_COLUMN)?.cast(&DataType::String)?;
    let ids = casted
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => (i + 1).to_string(),
        })
        .collect();
    Ok(ids)
}

/// Loads and validates a score table from a tab-separated file.
pub fn load_score_table(path: &Path, label_column: &str) -> Result<ScoreTable, DataError> {
    log::info!("Loading scores from '{}'", path.display());
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyTable);
    }

    let column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    if !column_names.iter().any(|c| c == label_column) {
        return Err(DataError::ColumnNotFound(label_column.to_string()));
    }

    let labels = extract_numeric_column(&df, label_column)?;
    if let Some((row, &value)) = labels
        .iter()
        .enumerate()
        .find(|&(_, &v)| v != 0.0 && v != 1.0)
    {
        return Err(DataError::NonBinaryLabel {
            column: label_column.to_string(),
            row: row + 1,
            value,
        });
    }

    let mut columns = Vec::new();
    for name in column_names
        .iter()
        .filter(|c| c.as_str() != label_column && c.as_str() != ID_COLUMN)
    {
        let scores = Array1::from_vec(extract_numeric_column(&df, name)?);
        let adapter = ExternalAdapter::new(scores).map_err(|source| DataError::InvalidScores {
            column: name.clone(),
            source,
        })?;
        columns.push(ScoreColumn {
            name: name.clone(),
            adapter: Arc::new(adapter),
        });
    }
    if columns.is_empty() {
        return Err(DataError::NoScoreColumns(label_column.to_string()));
    }

    let ids = build_ids(&df, df.height())?;
    log::info!(
        "Loaded {} patients ({} events) and {} score columns",
        df.height(),
        labels.iter().filter(|&&y| y == 1.0).count(),
        columns.len()
    );
    Ok(ScoreTable {
        ids,
        labels: Array1::from_vec(labels),
        columns,
    })
}
