//! # The Probabilistic Classifier Capability
//!
//! Every model the evaluation layer compares, whether a fitted estimator, a
//! sequential composition of two estimators, or a vector of scores produced
//! by an external scoring system, is used through one trait:
//! [`ProbabilisticClassifier::predict_proba`]. It returns a two-column table
//! of `(P(negative), P(positive))` row-aligned with the feature matrix.

use crate::model::ModelError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("A probability table must have exactly two columns (negative, positive); found {0}.")]
    NotTwoColumns(usize),
    #[error("The {model} model returned {found} rows for a feature matrix with {expected} rows.")]
    RowCountMismatch {
        model: String,
        found: usize,
        expected: usize,
    },
    #[error("Label vector has {labels} rows but the feature matrix has {rows} rows.")]
    LabelCountMismatch { labels: usize, rows: usize },
    #[error("Probability at row {index} is {value}; expected a finite value within [0, 1].")]
    InvalidProbability { index: usize, value: f64 },
    #[error("Cutoff must lie within [0, 1]; got {0}.")]
    InvalidCutoff(f64),
    #[error("The {0} model has not been fitted; fit it before composing a sequential classifier.")]
    NotFitted(&'static str),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Anything that can score a feature matrix with two-class probabilities.
pub trait ProbabilisticClassifier {
    /// Returns an `(n_rows, 2)` table whose rows sum to one.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError>;

    /// The positive-class column of [`Self::predict_proba`].
    fn positive_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ClassifierError> {
        let table = self.predict_proba(x)?;
        positive_column(&table)
    }

    /// Whether the classifier is ready to predict. Estimators that can exist
    /// in an unfitted state override this.
    fn is_fitted(&self) -> bool {
        true
    }
}

/// A classifier that can be shared between a comparison panel and a
/// sequential composition.
pub type SharedClassifier = Arc<dyn ProbabilisticClassifier + Send + Sync>;

/// A classifier paired with the display name used in tables and legends.
#[derive(Clone)]
pub struct NamedModel {
    pub name: String,
    pub model: SharedClassifier,
}

impl NamedModel {
    pub fn new(name: impl Into<String>, model: SharedClassifier) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }
}

impl fmt::Debug for NamedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedModel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Builds the `(1 - p, p)` table for a vector of positive-class probabilities.
pub fn probability_table(positive: ArrayView1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((positive.len(), 2), |(i, j)| {
        if j == 0 { 1.0 - positive[i] } else { positive[i] }
    })
}

pub fn positive_column(table: &Array2<f64>) -> Result<Array1<f64>, ClassifierError> {
    if table.ncols() != 2 {
        return Err(ClassifierError::NotTwoColumns(table.ncols()));
    }
    Ok(table.column(1).to_owned())
}

/// Scores `x` with `model` and checks the result is row-aligned with `x`.
pub fn aligned_positive_proba(
    model: &dyn ProbabilisticClassifier,
    name: &str,
    x: ArrayView2<f64>,
) -> Result<Array1<f64>, ClassifierError> {
    let positive = model.positive_proba(x)?;
    if positive.len() != x.nrows() {
        return Err(ClassifierError::RowCountMismatch {
            model: name.to_string(),
            found: positive.len(),
            expected: x.nrows(),
        });
    }
    Ok(positive)
}

/// Positive-class probabilities for every model in a panel, in panel order.
pub fn predict_panel(
    models: &[NamedModel],
    x: ArrayView2<f64>,
) -> Result<Vec<Array1<f64>>, ClassifierError> {
    models
        .iter()
        .map(|named| aligned_positive_proba(named.model.as_ref(), &named.name, x))
        .collect()
}

fn validate_probabilities(values: ArrayView1<f64>) -> Result<(), ClassifierError> {
    match values
        .iter()
        .enumerate()
        .find(|&(_, &p)| !(0.0..=1.0).contains(&p))
    {
        Some((index, &value)) => Err(ClassifierError::InvalidProbability { index, value }),
        None => Ok(()),
    }
}

/// Adapts precomputed positive-class probabilities from an external scoring
/// system (for example APACHE IV) to the classifier interface.
///
/// The stored scores belong to one fixed cohort ordering, so the feature
/// matrix passed to [`ProbabilisticClassifier::predict_proba`] is ignored.
/// Keeping the labels aligned with that ordering is the caller's job.
#[derive(Debug, Clone)]
pub struct ExternalAdapter {
    probabilities: Array1<f64>,
}

impl ExternalAdapter {
    pub fn new(probabilities: Array1<f64>) -> Result<Self, ClassifierError> {
        validate_probabilities(probabilities.view())?;
        Ok(Self { probabilities })
    }

    pub fn probabilities(&self) -> ArrayView1<'_, f64> {
        self.probabilities.view()
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

impl ProbabilisticClassifier for ExternalAdapter {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        if x.nrows() != self.probabilities.len() {
            log::warn!(
                "External scores cover {} rows but the feature matrix has {}; returning the stored scores unchanged",
                self.probabilities.len(),
                x.nrows()
            );
        }
        Ok(probability_table(self.probabilities.view()))
    }
}
