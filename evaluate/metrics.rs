//! # Discrimination and Calibration Metrics
//!
//! Scalar metrics and curve coordinates computed from a vector of predicted
//! positive-class probabilities and a row-aligned vector of binary outcomes.
//!
//! - Inputs are validated once per call: equal lengths, a non-empty cohort,
//!   finite scores and labels that are exactly `0.0` or `1.0`.
//! - Degenerate cohorts are reported as errors. A single-class cohort has no
//!   ROC curve, a cohort without events has no precision-recall curve, and a
//!   zero mean prediction has no observed/predicted ratio. Callers never see
//!   a silent `NaN`.
//! - Threshold sweeps follow the usual convention: distinct scores in
//!   descending order, with cumulative counts taken at the last row of every
//!   run of tied scores.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Failures raised while computing a metric over (prediction, label) pairs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Cannot compute a metric over an empty cohort.")]
    EmptyInput,
    #[error("Prediction vector has {predictions} rows but the label vector has {labels} rows.")]
    LengthMismatch { predictions: usize, labels: usize },
    #[error("Label at row {index} is {value}; outcomes must be exactly 0 or 1.")]
    NonBinaryLabel { index: usize, value: f64 },
    #[error("Prediction at row {index} is {value}; predictions must be finite.")]
    NonFinitePrediction { index: usize, value: f64 },
    #[error("Prediction at row {index} is {value}; uniform calibration bins require values within [0, 1].")]
    ProbabilityOutOfRange { index: usize, value: f64 },
    #[error("Only one outcome class is present in the cohort; {metric} is undefined.")]
    SingleClass { metric: &'static str },
    #[error("No positive outcomes are present in the cohort; {metric} is undefined.")]
    NoPositives { metric: &'static str },
    #[error("Mean predicted probability is zero; the observed/predicted ratio is undefined.")]
    ZeroMeanPrediction,
    #[error("Calibration curves need at least one bin.")]
    InvalidBinCount,
}

/// Checks the shared preconditions of every metric in this module.
pub fn validate_inputs(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
) -> Result<(), MetricError> {
    if scores.len() != labels.len() {
        return Err(MetricError::LengthMismatch {
            predictions: scores.len(),
            labels: labels.len(),
        });
    }
    if scores.is_empty() {
        return Err(MetricError::EmptyInput);
    }
    if let Some((index, &value)) = labels
        .iter()
        .enumerate()
        .find(|&(_, &v)| v != 0.0 && v != 1.0)
    {
        return Err(MetricError::NonBinaryLabel { index, value });
    }
    if let Some((index, &value)) = scores.iter().enumerate().find(|&(_, v)| !v.is_finite()) {
        return Err(MetricError::NonFinitePrediction { index, value });
    }
    Ok(())
}

/// Returns `(n_events, n_non_events)` for a validated label vector.
pub fn class_counts(labels: ArrayView1<f64>) -> (usize, usize) {
    let events = labels.iter().filter(|&&y| y == 1.0).count();
    (events, labels.len() - events)
}

/// Cumulative false/true positive counts at every distinct score threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCounts {
    pub fps: Vec<f64>,
    pub tps: Vec<f64>,
    /// Distinct scores in descending order.
    pub thresholds: Vec<f64>,
}

pub fn binary_clf_curve(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
) -> Result<ThresholdCounts, MetricError> {
    validate_inputs(scores, labels)?;
    let n = scores.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let mut counts = ThresholdCounts {
        fps: Vec::new(),
        tps: Vec::new(),
        thresholds: Vec::new(),
    };
    let mut tp = 0.0;
    let mut fp = 0.0;
    for (k, &idx) in order.iter().enumerate() {
        if labels[idx] == 1.0 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let closes_run = k + 1 == n || scores[order[k + 1]] != scores[idx];
        if closes_run {
            counts.fps.push(fp);
            counts.tps.push(tp);
            counts.thresholds.push(scores[idx]);
        }
    }
    Ok(counts)
}

/// ROC coordinates, starting at the origin with an infinite threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Computes the ROC curve.
///
/// With `drop_intermediate`, interior points that are collinear with their
/// neighbours (zero second difference in both counts) are removed. They do
/// not change the shape or the area of the curve.
pub fn roc_curve(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
    drop_intermediate: bool,
) -> Result<RocCurve, MetricError> {
    let counts = binary_clf_curve(scores, labels)?;
    let (events, non_events) = class_counts(labels);
    if events == 0 || non_events == 0 {
        return Err(MetricError::SingleClass { metric: "ROC curve" });
    }

    let m = counts.thresholds.len();
    let keep: Vec<usize> = if drop_intermediate && m > 2 {
        (0..m)
            .filter(|&i| {
                i == 0
                    || i == m - 1
                    || counts.fps[i - 1] - 2.0 * counts.fps[i] + counts.fps[i + 1] != 0.0
                    || counts.tps[i - 1] - 2.0 * counts.tps[i] + counts.tps[i + 1] != 0.0
            })
            .collect()
    } else {
        (0..m).collect()
    };

    let mut curve = RocCurve {
        fpr: Vec::with_capacity(keep.len() + 1),
        tpr: Vec::with_capacity(keep.len() + 1),
        thresholds: Vec::with_capacity(keep.len() + 1),
    };
    curve.fpr.push(0.0);
    curve.tpr.push(0.0);
    curve.thresholds.push(f64::INFINITY);

    let total_neg = non_events as f64;
    let total_pos = events as f64;
    for i in keep {
        curve.fpr.push(counts.fps[i] / total_neg);
        curve.tpr.push(counts.tps[i] / total_pos);
        curve.thresholds.push(counts.thresholds[i]);
    }
    Ok(curve)
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Exactly tied scores receive their average rank, which makes the result
/// equal to the trapezoidal area under the full ROC curve.
pub fn roc_auc(scores: ArrayView1<f64>, labels: ArrayView1<f64>) -> Result<f64, MetricError> {
    validate_inputs(scores, labels)?;
    let (events, non_events) = class_counts(labels);
    if events == 0 || non_events == 0 {
        return Err(MetricError::SingleClass { metric: "AUROC" });
    }
    let n = scores.len();

    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&i, &j| scores[i].partial_cmp(&scores[j]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && scores[idx[j]] == scores[idx[i]] {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0 + 1.0;
        for &row in &idx[i..j] {
            ranks[row] = avg_rank;
        }
        i = j;
    }

    let sum_ranks_pos: f64 = ranks
        .iter()
        .zip(labels.iter())
        .filter(|&(_, &y)| y == 1.0)
        .map(|(&r, _)| r)
        .sum();

    let n_pos = events as f64;
    let n_neg = non_events as f64;
    Ok((sum_ranks_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Precision-recall coordinates ordered by increasing threshold.
///
/// The final point is always `(precision = 1, recall = 0)` and has no
/// threshold, so `thresholds` is one element shorter than the coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub thresholds: Vec<f64>,
}

pub fn precision_recall_curve(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
) -> Result<PrecisionRecallCurve, MetricError> {
    let counts = binary_clf_curve(scores, labels)?;
    let (events, _) = class_counts(labels);
    if events == 0 {
        return Err(MetricError::NoPositives {
            metric: "precision-recall curve",
        });
    }
    let total_pos = events as f64;
    let m = counts.thresholds.len();

    let mut curve = PrecisionRecallCurve {
        precision: Vec::with_capacity(m + 1),
        recall: Vec::with_capacity(m + 1),
        thresholds: Vec::with_capacity(m),
    };
    for i in (0..m).rev() {
        let tp = counts.tps[i];
        curve.precision.push(tp / (tp + counts.fps[i]));
        curve.recall.push(tp / total_pos);
        curve.thresholds.push(counts.thresholds[i]);
    }
    curve.precision.push(1.0);
    curve.recall.push(0.0);
    Ok(curve)
}

/// Average precision: the recall-weighted mean of precision over all
/// thresholds, without interpolation between operating points.
pub fn average_precision(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
) -> Result<f64, MetricError> {
    let counts = binary_clf_curve(scores, labels)?;
    let (events, _) = class_counts(labels);
    if events == 0 {
        return Err(MetricError::NoPositives {
            metric: "average precision",
        });
    }
    let total_pos = events as f64;

    let mut ap = 0.0;
    let mut previous_recall = 0.0;
    for (&tp, &fp) in counts.tps.iter().zip(counts.fps.iter()) {
        let recall = tp / total_pos;
        let precision = tp / (tp + fp);
        ap += (recall - previous_recall) * precision;
        previous_recall = recall;
    }
    Ok(ap)
}

/// Ratio of the observed event rate to the mean predicted probability.
pub fn observed_predicted_ratio(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
) -> Result<f64, MetricError> {
    validate_inputs(scores, labels)?;
    let n = scores.len() as f64;
    let observed = labels.sum() / n;
    let predicted = scores.sum() / n;
    if predicted == 0.0 {
        return Err(MetricError::ZeroMeanPrediction);
    }
    Ok(observed / predicted)
}

/// How calibration bin edges are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinStrategy {
    /// Equal-width bins over [0, 1].
    #[default]
    Uniform,
    /// Equal-frequency bins at the empirical quantiles of the predictions.
    Quantile,
}

/// Reliability diagram coordinates. Empty bins are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    pub mean_predicted: Vec<f64>,
    pub fraction_positive: Vec<f64>,
    pub counts: Vec<usize>,
}

pub fn calibration_curve(
    scores: ArrayView1<f64>,
    labels: ArrayView1<f64>,
    n_bins: usize,
    strategy: BinStrategy,
) -> Result<CalibrationCurve, MetricError> {
    validate_inputs(scores, labels)?;
    if n_bins == 0 {
        return Err(MetricError::InvalidBinCount);
    }

    let edges = match strategy {
        BinStrategy::Uniform => {
            if let Some((index, &value)) = scores
                .iter()
                .enumerate()
                .find(|&(_, &p)| !(0.0..=1.0).contains(&p))
            {
                return Err(MetricError::ProbabilityOutOfRange { index, value });
            }
            let step = 1.0 / n_bins as f64;
            let mut edges: Vec<f64> = (0..=n_bins).map(|i| i as f64 * step).collect();
            edges[n_bins] = 1.0;
            edges
        }
        BinStrategy::Quantile => {
            let mut sorted = scores.to_vec();
            sorted.sort_by(f64::total_cmp);
            (0..=n_bins)
                .map(|i| interpolated_percentile(&sorted, i as f64 / n_bins as f64))
                .collect()
        }
    };
    let inner = &edges[1..n_bins];

    let mut bin_pred_sum = vec![0.0; n_bins];
    let mut bin_true_sum = vec![0.0; n_bins];
    let mut bin_counts = vec![0usize; n_bins];
    for (&p, &y) in scores.iter().zip(labels.iter()) {
        let bin = inner.partition_point(|&edge| edge < p);
        bin_pred_sum[bin] += p;
        bin_true_sum[bin] += y;
        bin_counts[bin] += 1;
    }

    let mut curve = CalibrationCurve {
        mean_predicted: Vec::new(),
        fraction_positive: Vec::new(),
        counts: Vec::new(),
    };
    for bin in 0..n_bins {
        if bin_counts[bin] > 0 {
            let count = bin_counts[bin] as f64;
            curve.mean_predicted.push(bin_pred_sum[bin] / count);
            curve.fraction_positive.push(bin_true_sum[bin] / count);
            curve.counts.push(bin_counts[bin]);
        }
    }
    Ok(curve)
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn interpolated_percentile(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = position - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_validate_inputs_rejects_length_mismatch() {
        let scores = array![0.1, 0.2, 0.3];
        let labels = array![0.0, 1.0];
        assert_eq!(
            validate_inputs(scores.view(), labels.view()),
            Err(MetricError::LengthMismatch {
                predictions: 3,
                labels: 2
            })
        );
    }

    #[test]
    fn test_validate_inputs_rejects_non_binary_labels() {
        let scores = array![0.1, 0.2];
        let labels = array![0.0, 0.5];
        match validate_inputs(scores.view(), labels.view()) {
            Err(MetricError::NonBinaryLabel { index, value }) => {
                assert_eq!(index, 1);
                assert_abs_diff_eq!(value, 0.5);
            }
            other => panic!("Expected NonBinaryLabel, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_inputs_rejects_empty_and_nan() {
        let empty = ndarray::Array1::<f64>::zeros(0);
        assert_eq!(
            validate_inputs(empty.view(), empty.view()),
            Err(MetricError::EmptyInput)
        );
        let scores = array![0.1, f64::NAN];
        let labels = array![0.0, 1.0];
        assert!(matches!(
            validate_inputs(scores.view(), labels.view()),
            Err(MetricError::NonFinitePrediction { index: 1, .. })
        ));
    }

    #[test]
    fn test_binary_clf_curve_groups_ties() {
        let scores = array![0.1, 0.4, 0.35, 0.8, 0.4];
        let labels = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let counts = binary_clf_curve(scores.view(), labels.view()).unwrap();
        assert_eq!(counts.thresholds, vec![0.8, 0.4, 0.35, 0.1]);
        assert_eq!(counts.tps, vec![1.0, 2.0, 3.0, 3.0]);
        assert_eq!(counts.fps, vec![0.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let perfect = array![0.1, 0.2, 0.8, 0.9];
        let inverted = array![0.9, 0.8, 0.2, 0.1];
        assert_abs_diff_eq!(roc_auc(perfect.view(), labels.view()).unwrap(), 1.0);
        assert_abs_diff_eq!(roc_auc(inverted.view(), labels.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_roc_auc_counts_ties_as_half() {
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let labels = array![0.0, 0.0, 1.0, 1.0];
        assert_abs_diff_eq!(roc_auc(scores.view(), labels.view()).unwrap(), 0.75);

        let tied = array![0.5, 0.5, 0.5, 0.5];
        assert_abs_diff_eq!(roc_auc(tied.view(), labels.view()).unwrap(), 0.5);
    }

    #[test]
    fn test_roc_auc_matches_trapezoidal_area() {
        let scores = array![0.05, 0.3, 0.3, 0.6, 0.45, 0.9, 0.12, 0.3];
        let labels = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let curve = roc_curve(scores.view(), labels.view(), false).unwrap();
        let area: f64 = curve
            .fpr
            .windows(2)
            .zip(curve.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum();
        let auc = roc_auc(scores.view(), labels.view()).unwrap();
        assert_abs_diff_eq!(auc, area, epsilon = 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_is_an_error() {
        let scores = array![0.1, 0.2, 0.3];
        let labels = array![1.0, 1.0, 1.0];
        assert_eq!(
            roc_auc(scores.view(), labels.view()),
            Err(MetricError::SingleClass { metric: "AUROC" })
        );
    }

    #[test]
    fn test_roc_curve_coordinates() {
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let curve = roc_curve(scores.view(), labels.view(), false).unwrap();
        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(curve.thresholds[0].is_infinite());
        assert_eq!(&curve.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
    }

    #[test]
    fn test_roc_curve_drops_collinear_points() {
        let scores = array![0.9, 0.8, 0.7, 0.6, 0.1];
        let labels = array![1.0, 1.0, 1.0, 0.0, 0.0];
        let full = roc_curve(scores.view(), labels.view(), false).unwrap();
        let thinned = roc_curve(scores.view(), labels.view(), true).unwrap();
        assert_eq!(full.fpr.len(), 6);
        assert_eq!(thinned.tpr, vec![0.0, 1.0 / 3.0, 1.0, 1.0]);
        assert_eq!(thinned.fpr, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_precision_recall_curve_shape() {
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let curve = precision_recall_curve(scores.view(), labels.view()).unwrap();
        assert_eq!(curve.thresholds, vec![0.1, 0.35, 0.4, 0.8]);
        assert_eq!(curve.recall, vec![1.0, 1.0, 0.5, 0.5, 0.0]);
        assert_abs_diff_eq!(curve.precision[0], 0.5);
        assert_abs_diff_eq!(curve.precision[1], 2.0 / 3.0);
        assert_abs_diff_eq!(curve.precision[2], 0.5);
        assert_abs_diff_eq!(curve.precision[3], 1.0);
        assert_abs_diff_eq!(curve.precision[4], 1.0);
    }

    #[test]
    fn test_average_precision_known_value() {
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let ap = average_precision(scores.view(), labels.view()).unwrap();
        assert_abs_diff_eq!(ap, 0.5 * 1.0 + 0.5 * (2.0 / 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_average_precision_without_events_fails() {
        let scores = array![0.1, 0.4];
        let labels = array![0.0, 0.0];
        assert!(matches!(
            average_precision(scores.view(), labels.view()),
            Err(MetricError::NoPositives { .. })
        ));
    }

    #[test]
    fn test_observed_predicted_ratio_balanced_cohort() {
        let scores = array![0.8, 0.2, 0.8, 0.2];
        let labels = array![1.0, 0.0, 1.0, 0.0];
        let ratio = observed_predicted_ratio(scores.view(), labels.view()).unwrap();
        assert_abs_diff_eq!(ratio, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_observed_predicted_ratio_zero_prediction() {
        let scores = array![0.0, 0.0];
        let labels = array![1.0, 0.0];
        assert_eq!(
            observed_predicted_ratio(scores.view(), labels.view()),
            Err(MetricError::ZeroMeanPrediction)
        );
    }

    #[test]
    fn test_calibration_curve_uniform_bins() {
        let scores = array![0.05, 0.1, 0.15, 0.55, 0.65, 0.95];
        let labels = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let curve =
            calibration_curve(scores.view(), labels.view(), 2, BinStrategy::Uniform).unwrap();
        assert_eq!(curve.counts, vec![3, 3]);
        assert_abs_diff_eq!(curve.mean_predicted[0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.fraction_positive[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.mean_predicted[1], (0.55 + 0.65 + 0.95) / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.fraction_positive[1], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_calibration_curve_drops_empty_bins_and_keeps_edges_left_closed() {
        // A value sitting exactly on an inner edge belongs to the lower bin.
        let scores = array![0.1, 0.1, 0.95];
        let labels = array![0.0, 1.0, 1.0];
        let curve =
            calibration_curve(scores.view(), labels.view(), 10, BinStrategy::Uniform).unwrap();
        assert_eq!(curve.counts, vec![2, 1]);
        assert_abs_diff_eq!(curve.mean_predicted[0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.fraction_positive[1], 1.0);
    }

    #[test]
    fn test_calibration_curve_quantile_bins_are_equal_frequency() {
        let scores = array![0.01, 0.02, 0.03, 0.04, 0.5, 0.6, 0.7, 0.8];
        let labels = array![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
        let curve =
            calibration_curve(scores.view(), labels.view(), 2, BinStrategy::Quantile).unwrap();
        assert_eq!(curve.counts, vec![4, 4]);
        assert_abs_diff_eq!(curve.fraction_positive[0], 0.25);
        assert_abs_diff_eq!(curve.fraction_positive[1], 0.75);
    }

    #[test]
    fn test_calibration_curve_rejects_out_of_range_and_zero_bins() {
        let labels = array![0.0, 1.0];
        let scores = array![0.2, 1.2];
        assert!(matches!(
            calibration_curve(scores.view(), labels.view(), 10, BinStrategy::Uniform),
            Err(MetricError::ProbabilityOutOfRange { index: 1, .. })
        ));
        let ok_scores = array![0.2, 0.4];
        assert_eq!(
            calibration_curve(ok_scores.view(), labels.view(), 0, BinStrategy::Uniform),
            Err(MetricError::InvalidBinCount)
        );
    }
}
