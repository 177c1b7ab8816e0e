//! # Bootstrap Confidence Intervals
//!
//! Percentile intervals for any scalar metric over paired (prediction, label)
//! arrays. Each resample draws `n` row indices uniformly with replacement,
//! evaluates the metric on the resampled pairs, and the interval bounds are
//! read directly from the sorted distribution at `floor(q * n_bootstraps)`.
//! There is no interpolation between adjacent order statistics.
//!
//! Resamples run in parallel. Resample `i` owns a generator seeded from the
//! configured seed and `i` alone, so the interval does not depend on how the
//! work is scheduled. A metric failure in any resample aborts the whole
//! computation; the lowest failing resample index is reported.

use crate::metrics::{self, MetricError};
use ndarray::{ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_N_BOOTSTRAPS: usize = 2000;
pub const DEFAULT_CI_LEVEL: f64 = 0.95;
pub const DEFAULT_SEED: u64 = 42;

/// Odd 64-bit constant used to spread resample indices across seed space.
const RESAMPLE_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Confidence level must lie strictly between 0 and 1; got {0}.")]
    InvalidConfidenceLevel(f64),
    #[error("At least one bootstrap resample is required.")]
    NoResamples,
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error("Bootstrap resample {resample} failed: {source}")]
    ResampleFailed {
        resample: usize,
        #[source]
        source: MetricError,
    },
}

/// Resampling settings. The seed is fixed by default so repeated runs over
/// the same inputs produce identical intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub n_bootstraps: usize,
    pub ci_level: f64,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_bootstraps: DEFAULT_N_BOOTSTRAPS,
            ci_level: DEFAULT_CI_LEVEL,
            seed: DEFAULT_SEED,
        }
    }
}

impl BootstrapConfig {
    pub fn with_n_bootstraps(mut self, n: usize) -> Self {
        self.n_bootstraps = n;
        self
    }

    pub fn with_ci_level(mut self, level: f64) -> Self {
        self.ci_level = level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), BootstrapError> {
        if !(self.ci_level > 0.0 && self.ci_level < 1.0) {
            return Err(BootstrapError::InvalidConfidenceLevel(self.ci_level));
        }
        if self.n_bootstraps == 0 {
            return Err(BootstrapError::NoResamples);
        }
        Ok(())
    }

    /// Lower and upper tail probabilities, e.g. `(0.025, 0.975)` at 95%.
    pub fn tail_quantiles(&self) -> (f64, f64) {
        let lower = (1.0 - self.ci_level) / 2.0;
        (lower, 1.0 - lower)
    }

    /// Positions of the interval bounds in the sorted bootstrap distribution.
    pub fn percentile_indices(&self) -> (usize, usize) {
        let (lower_q, upper_q) = self.tail_quantiles();
        let n = self.n_bootstraps as f64;
        let last = self.n_bootstraps.saturating_sub(1);
        (
            ((lower_q * n) as usize).min(last),
            ((upper_q * n) as usize).min(last),
        )
    }
}

/// A two-sided percentile interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// The scalar metrics the evaluation layer bootstraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Auroc,
    AveragePrecision,
    ObservedPredictedRatio,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Auroc => "AUROC",
            Metric::AveragePrecision => "average precision",
            Metric::ObservedPredictedRatio => "observed/predicted ratio",
        }
    }

    pub fn evaluate(
        &self,
        scores: ArrayView1<f64>,
        labels: ArrayView1<f64>,
    ) -> Result<f64, MetricError> {
        match self {
            Metric::Auroc => metrics::roc_auc(scores, labels),
            Metric::AveragePrecision => metrics::average_precision(scores, labels),
            Metric::ObservedPredictedRatio => metrics::observed_predicted_ratio(scores, labels),
        }
    }
}

/// Bootstrap interval for one of the built-in metrics.
pub fn bootstrap_ci(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
    metric: Metric,
    config: &BootstrapConfig,
) -> Result<ConfidenceInterval, BootstrapError> {
    log::debug!(
        "Bootstrapping {} with {} resamples (level {}, seed {})",
        metric.name(),
        config.n_bootstraps,
        config.ci_level,
        config.seed
    );
    bootstrap_ci_with(scores, labels, |s, y| metric.evaluate(s, y), config)
}

/// Bootstrap interval for an arbitrary metric function.
pub fn bootstrap_ci_with<F>(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
    metric: F,
    config: &BootstrapConfig,
) -> Result<ConfidenceInterval, BootstrapError>
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> Result<f64, MetricError> + Sync,
{
    let distribution = bootstrap_distribution(scores, labels, metric, config)?;
    let (lower_idx, upper_idx) = config.percentile_indices();
    let interval = ConfidenceInterval {
        lower: distribution[lower_idx],
        upper: distribution[upper_idx],
        level: config.ci_level,
    };
    log::debug!(
        "Bootstrap interval [{:.4}, {:.4}] from order statistics {} and {}",
        interval.lower,
        interval.upper,
        lower_idx,
        upper_idx
    );
    Ok(interval)
}

/// The full bootstrap distribution of `metric`, sorted ascending.
pub fn bootstrap_distribution<F>(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
    metric: F,
    config: &BootstrapConfig,
) -> Result<Vec<f64>, BootstrapError>
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> Result<f64, MetricError> + Sync,
{
    config.validate()?;
    metrics::validate_inputs(scores, labels)?;
    let n = scores.len();

    let outcomes: Vec<Result<f64, MetricError>> = (0..config.n_bootstraps)
        .into_par_iter()
        .map(|resample| {
            let indices = resample_indices(config.seed, resample, n);
            let resampled_scores = scores.select(Axis(0), &indices);
            let resampled_labels = labels.select(Axis(0), &indices);
            metric(resampled_scores.view(), resampled_labels.view())
        })
        .collect();

    let mut distribution = Vec::with_capacity(outcomes.len());
    for (resample, outcome) in outcomes.into_iter().enumerate() {
        let value = outcome.map_err(|source| BootstrapError::ResampleFailed { resample, source })?;
        distribution.push(value);
    }
    distribution.sort_by(f64::total_cmp);
    Ok(distribution)
}

/// Row indices for one resample, drawn uniformly from `[0, n)`.
pub fn resample_indices(seed: u64, resample: usize, n: usize) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed ^ (resample as u64).wrapping_mul(RESAMPLE_STRIDE));
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}
