//! # Net Reclassification Improvement
//!
//! Pairwise NRI compares an alternative model against a reference model on
//! the same cohort. Among events a higher alternative probability is an
//! improvement; among non-events a lower one is. Exact ties count in neither
//! direction.
//!
//! The all-pairs grid evaluates every unordered pair once and fills the
//! mirrored entry with the negated value, so both tables are antisymmetric
//! with a zero diagonal.

use crate::classifier::{
    ClassifierError, NamedModel, ProbabilisticClassifier, aligned_positive_proba, predict_panel,
};
use crate::metrics::{self, MetricError};
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NriError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error("The cohort has no events; the event component of NRI is undefined.")]
    ZeroEvents,
    #[error("The cohort has no non-events; the non-event component of NRI is undefined.")]
    ZeroNonEvents,
    #[error("Model predictions have different lengths ({reference} vs {alternative}).")]
    PredictionLengthMismatch { reference: usize, alternative: usize },
}

/// NRI of an alternative model relative to a reference, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NriResult {
    /// `100 * z_pos / n_events + 100 * z_neg / n_non_events`, in [-200, 200].
    pub additive: f64,
    /// `100 * (z_pos + z_neg) / n`, in [-100, 100].
    pub absolute: f64,
}

/// NRI of `alternative` relative to `reference` from precomputed
/// positive-class probabilities.
pub fn nri_from_scores(
    reference: ArrayView1<f64>,
    alternative: ArrayView1<f64>,
    labels: ArrayView1<f64>,
) -> Result<NriResult, NriError> {
    if reference.len() != alternative.len() {
        return Err(NriError::PredictionLengthMismatch {
            reference: reference.len(),
            alternative: alternative.len(),
        });
    }
    metrics::validate_inputs(reference, labels)?;
    metrics::validate_inputs(alternative, labels)?;

    let (n_events, n_non_events) = metrics::class_counts(labels);
    if n_events == 0 {
        return Err(NriError::ZeroEvents);
    }
    if n_non_events == 0 {
        return Err(NriError::ZeroNonEvents);
    }

    let mut z_pos: i64 = 0;
    let mut z_neg: i64 = 0;
    for ((&p1, &p2), &y) in reference.iter().zip(alternative.iter()).zip(labels.iter()) {
        if y == 1.0 {
            z_pos += (p2 > p1) as i64 - (p1 > p2) as i64;
        } else {
            z_neg += (p2 < p1) as i64 - (p1 < p2) as i64;
        }
    }

    let z_pos = z_pos as f64;
    let z_neg = z_neg as f64;
    let n_total = labels.len() as f64;
    Ok(NriResult {
        additive: (z_pos / n_events as f64) * 100.0 + (z_neg / n_non_events as f64) * 100.0,
        absolute: (z_pos + z_neg) / n_total * 100.0,
    })
}

/// NRI of `alternative` relative to `reference` on a shared cohort.
pub fn nri(
    reference: &dyn ProbabilisticClassifier,
    alternative: &dyn ProbabilisticClassifier,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<NriResult, NriError> {
    check_label_count(x, y)?;
    let p1 = aligned_positive_proba(reference, "reference", x)?;
    let p2 = aligned_positive_proba(alternative, "alternative", x)?;
    nri_from_scores(p1.view(), p2.view(), y)
}

fn check_label_count(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ClassifierError> {
    if y.len() != x.nrows() {
        return Err(ClassifierError::LabelCountMismatch {
            labels: y.len(),
            rows: x.nrows(),
        });
    }
    Ok(())
}

/// A square table labeled by model name on both axes. Entry `(i, j)` is the
/// NRI of model `j` relative to model `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NriMatrix {
    pub names: Vec<String>,
    pub values: Array2<f64>,
}

impl NriMatrix {
    fn zeros(names: Vec<String>) -> Self {
        let k = names.len();
        Self {
            names,
            values: Array2::zeros((k, k)),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// NRI of `alternative` relative to `reference`, looked up by name.
    pub fn get(&self, reference: &str, alternative: &str) -> Option<f64> {
        let i = self.position(reference)?;
        let j = self.position(alternative)?;
        Some(self.values[[i, j]])
    }

    /// Whole-number display copy, rounding halves to even.
    pub fn rounded(&self) -> Self {
        Self {
            names: self.names.clone(),
            values: self.values.mapv(f64::round_ties_even),
        }
    }
}

/// Additive and absolute NRI tables over the same model panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NriGrid {
    pub additive: NriMatrix,
    pub absolute: NriMatrix,
}

/// All-pairs NRI over a named panel of classifiers.
pub fn nri_grid(
    models: &[NamedModel],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    round: bool,
) -> Result<NriGrid, NriError> {
    check_label_count(x, y)?;
    let predictions = predict_panel(models, x)?;
    let grid = nri_grid_from_scores(models, &predictions, y)?;
    if round {
        Ok(NriGrid {
            additive: grid.additive.rounded(),
            absolute: grid.absolute.rounded(),
        })
    } else {
        Ok(grid)
    }
}

fn nri_grid_from_scores(
    models: &[NamedModel],
    predictions: &[Array1<f64>],
    y: ArrayView1<f64>,
) -> Result<NriGrid, NriError> {
    let names: Vec<String> = models.iter().map(|m| m.name.clone()).collect();
    let mut additive = NriMatrix::zeros(names.clone());
    let mut absolute = NriMatrix::zeros(names);

    for (i, j) in (0..predictions.len()).tuple_combinations() {
        let result = nri_from_scores(predictions[i].view(), predictions[j].view(), y)?;
        log::debug!(
            "NRI of '{}' relative to '{}': additive {:.2}, absolute {:.2}",
            models[j].name,
            models[i].name,
            result.additive,
            result.absolute
        );
        additive.values[[i, j]] = result.additive;
        additive.values[[j, i]] = -result.additive;
        absolute.values[[i, j]] = result.absolute;
        absolute.values[[j, i]] = -result.absolute;
    }
    Ok(NriGrid { additive, absolute })
}
