//! # Curve Summaries for Model Panels
//!
//! Computes the coordinates and headline statistic of the ROC, precision-recall
//! and calibration overlays for every model in a panel. Rendering is left to
//! the caller; everything here is plain numbers plus a legend string.

use crate::bootstrap::{BootstrapConfig, BootstrapError, ConfidenceInterval, Metric, bootstrap_ci};
use crate::classifier::{ClassifierError, NamedModel, predict_panel};
use crate::metrics::{
    self, BinStrategy, CalibrationCurve, MetricError, PrecisionRecallCurve, RocCurve,
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The `y = x` line drawn under ROC and calibration overlays.
pub const REFERENCE_DIAGONAL: ([f64; 2], [f64; 2]) = ([0.0, 1.0], [0.0, 1.0]);

#[derive(Error, Debug)]
pub enum CurveError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("Curve for model '{model}' failed: {source}")]
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

fn legend(name: &str, statistic: &str, value: f64, interval: Option<&ConfidenceInterval>) -> String {
    match interval {
        Some(ci) => format!(
            "{name}\n({statistic} = {value:.3} [{:.3}, {:.3}])",
            ci.lower, ci.upper
        ),
        None => format!("{name}\n({statistic} = {value:.3})"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocSummary {
    pub name: String,
    pub curve: RocCurve,
    pub auroc: f64,
    pub interval: Option<ConfidenceInterval>,
}

impl RocSummary {
    pub fn legend_label(&self) -> String {
        legend(&self.name, "AUC", self.auroc, self.interval.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrSummary {
    pub name: String,
    pub curve: PrecisionRecallCurve,
    pub average_precision: f64,
    pub interval: Option<ConfidenceInterval>,
}

impl PrSummary {
    pub fn legend_label(&self) -> String {
        legend(&self.name, "AP", self.average_precision, self.interval.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub name: String,
    pub curve: CalibrationCurve,
}

impl CalibrationSummary {
    pub fn legend_label(&self) -> String {
        self.name.clone()
    }
}

fn panel_scores(
    models: &[NamedModel],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<Vec<Array1<f64>>, CurveError> {
    if y.len() != x.nrows() {
        return Err(ClassifierError::LabelCountMismatch {
            labels: y.len(),
            rows: x.nrows(),
        }
        .into());
    }
    Ok(predict_panel(models, x)?)
}

fn optional_interval(
    name: &str,
    scores: ArrayView1<f64>,
    y: ArrayView1<f64>,
    metric: Metric,
    ci: Option<&BootstrapConfig>,
) -> Result<Option<ConfidenceInterval>, CurveError> {
    ci.map(|config| bootstrap_ci(scores, y, metric, config))
        .transpose()
        .map_err(|source| CurveError::Bootstrap {
            model: name.to_string(),
            source,
        })
}

fn metric_failure(name: &str) -> impl FnOnce(MetricError) -> CurveError + '_ {
    move |source| CurveError::Metric {
        model: name.to_string(),
        source,
    }
}

/// ROC coordinates and AUROC per model, with a bootstrap interval when `ci`
/// is given.
pub fn roc_summaries(
    models: &[NamedModel],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    drop_intermediate: bool,
    ci: Option<&BootstrapConfig>,
) -> Result<Vec<RocSummary>, CurveError> {
    let scores = panel_scores(models, x, y)?;
    models
        .iter()
        .zip(&scores)
        .map(|(named, p)| {
            let name = named.name.as_str();
            let curve =
                metrics::roc_curve(p.view(), y, drop_intermediate).map_err(metric_failure(name))?;
            let auroc = metrics::roc_auc(p.view(), y).map_err(metric_failure(name))?;
            let interval = optional_interval(name, p.view(), y, Metric::Auroc, ci)?;
            Ok(RocSummary {
                name: named.name.clone(),
                curve,
                auroc,
                interval,
            })
        })
        .collect()
}

/// Precision-recall coordinates and average precision per model.
pub fn pr_summaries(
    models: &[NamedModel],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    ci: Option<&BootstrapConfig>,
) -> Result<Vec<PrSummary>, CurveError> {
    let scores = panel_scores(models, x, y)?;
    models
        .iter()
        .zip(&scores)
        .map(|(named, p)| {
            let name = named.name.as_str();
            let curve = metrics::precision_recall_curve(p.view(), y).map_err(metric_failure(name))?;
            let average_precision =
                metrics::average_precision(p.view(), y).map_err(metric_failure(name))?;
            let interval = optional_interval(name, p.view(), y, Metric::AveragePrecision, ci)?;
            Ok(PrSummary {
                name: named.name.clone(),
                curve,
                average_precision,
                interval,
            })
        })
        .collect()
}

pub fn calibration_summaries(
    models: &[NamedModel],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    n_bins: usize,
    strategy: BinStrategy,
) -> Result<Vec<CalibrationSummary>, CurveError> {
    let scores = panel_scores(models, x, y)?;
    models
        .iter()
        .zip(&scores)
        .map(|(named, p)| {
            let curve = metrics::calibration_curve(p.view(), y, n_bins, strategy)
                .map_err(metric_failure(&named.name))?;
            Ok(CalibrationSummary {
                name: named.name.clone(),
                curve,
            })
        })
        .collect()
}
