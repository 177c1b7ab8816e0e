//! Observed/predicted event-rate ratios with bootstrap intervals.

use crate::bootstrap::{BootstrapConfig, BootstrapError, Metric, bootstrap_ci};
use crate::classifier::{ClassifierError, NamedModel, predict_panel};
use crate::metrics::{self, MetricError};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OPR intervals are always reported at 95%, whatever level the other
/// summaries use.
pub const OPR_CI_LEVEL: f64 = 0.95;

#[derive(Error, Debug)]
pub enum OprError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("Observed/predicted ratio for model '{model}' failed: {source}")]
    Metric {
        model: String,
        #[source]
        source: MetricError,
    },
    #[error("Bootstrap interval for model '{model}' failed: {source}")]
    Bootstrap {
        model: String,
        #[source]
        source: BootstrapError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OprRow {
    pub name: String,
    pub ratio: f64,
    pub lower: f64,
    pub upper: f64,
}

/// One row per model, in panel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OprTable {
    pub rows: Vec<OprRow>,
}

impl OprTable {
    pub const COLUMNS: [&'static str; 3] = ["OPR", "2.5%", "97.5%"];

    pub fn get(&self, name: &str) -> Option<&OprRow> {
        self.rows.iter().find(|row| row.name == name)
    }
}

/// `mean(y) / mean(p)`; above one means the model under-predicts risk.
pub fn op_ratio(scores: ArrayView1<f64>, labels: ArrayView1<f64>) -> Result<f64, MetricError> {
    metrics::observed_predicted_ratio(scores, labels)
}

pub fn opr_table(
    models: &[NamedModel],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    bootstrap: &BootstrapConfig,
) -> Result<OprTable, OprError> {
    if y.len() != x.nrows() {
        return Err(ClassifierError::LabelCountMismatch {
            labels: y.len(),
            rows: x.nrows(),
        }
        .into());
    }
    let config = bootstrap.with_ci_level(OPR_CI_LEVEL);
    let predictions = predict_panel(models, x)?;

    let mut rows = Vec::with_capacity(models.len());
    for (named, p) in models.iter().zip(&predictions) {
        let ratio = op_ratio(p.view(), y).map_err(|source| OprError::Metric {
            model: named.name.clone(),
            source,
        })?;
        let interval = bootstrap_ci(p.view(), y, Metric::ObservedPredictedRatio, &config)
            .map_err(|source| OprError::Bootstrap {
                model: named.name.clone(),
                source,
            })?;
        log::info!(
            "OPR for '{}': {:.3} [{:.3}, {:.3}]",
            named.name,
            ratio,
            interval.lower,
            interval.upper
        );
        rows.push(OprRow {
            name: named.name.clone(),
            ratio,
            lower: interval.lower,
            upper: interval.upper,
        });
    }
    Ok(OprTable { rows })
}
