//! # Evaluation Reports
//!
//! Runs every evaluator over one model panel and writes the results: curve
//! coordinates, the OPR table and both NRI matrices as tab-separated files,
//! plus a JSON summary of the headline numbers.

use crate::bootstrap::ConfidenceInterval;
use crate::classifier::NamedModel;
use crate::config::{ConfigError, EvaluationConfig};
use crate::curves::{
    self, CalibrationSummary, CurveError, PrSummary, RocSummary, calibration_summaries,
    pr_summaries, roc_summaries,
};
use crate::metrics;
use crate::nri::{NriError, NriGrid, NriMatrix, nri_grid};
use crate::opr::{OprError, OprTable, opr_table};
use csv::WriterBuilder;
use ndarray::{ArrayView1, ArrayView2};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to create or write report file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write tab-separated output: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to serialize the JSON summary: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error(transparent)]
    Nri(#[from] NriError),
    #[error(transparent)]
    Opr(#[from] OprError),
}

/// Headline numbers for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub auroc: f64,
    pub auroc_ci: Option<ConfidenceInterval>,
    pub average_precision: f64,
    pub average_precision_ci: Option<ConfidenceInterval>,
    pub observed_predicted_ratio: f64,
    pub observed_predicted_ci: ConfidenceInterval,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary<'a> {
    pub n_patients: usize,
    pub n_events: usize,
    pub config: &'a EvaluationConfig,
    pub models: Vec<ModelSummary>,
    pub nri: &'a NriGrid,
}

/// Everything computed for one panel of models on one cohort.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub n_patients: usize,
    pub n_events: usize,
    pub config: EvaluationConfig,
    pub roc: Vec<RocSummary>,
    pub pr: Vec<PrSummary>,
    pub calibration: Vec<CalibrationSummary>,
    pub opr: OprTable,
    pub nri: NriGrid,
}

impl EvaluationReport {
    pub fn compute(
        models: &[NamedModel],
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        config: &EvaluationConfig,
    ) -> Result<Self, ReportError> {
        config.validate()?;
        let ci = Some(&config.bootstrap);
        log::info!(
            "Evaluating {} models on {} patients ({} bootstrap resamples)",
            models.len(),
            y.len(),
            config.bootstrap.n_bootstraps
        );

        let roc = roc_summaries(models, x, y, config.drop_intermediate, ci)?;
        let pr = pr_summaries(models, x, y, ci)?;
        let calibration = calibration_summaries(
            models,
            x,
            y,
            config.calibration_bins,
            config.calibration_strategy,
        )?;
        let opr = opr_table(models, x, y, &config.bootstrap)?;
        let nri = nri_grid(models, x, y, config.round_nri)?;

        let (n_events, _) = metrics::class_counts(y);
        Ok(Self {
            n_patients: y.len(),
            n_events,
            config: config.clone(),
            roc,
            pr,
            calibration,
            opr,
            nri,
        })
    }

    pub fn summary(&self) -> EvaluationSummary<'_> {
        let models = self
            .roc
            .iter()
            .zip(&self.pr)
            .zip(&self.opr.rows)
            .map(|((roc, pr), opr)| ModelSummary {
                name: roc.name.clone(),
                auroc: roc.auroc,
                auroc_ci: roc.interval,
                average_precision: pr.average_precision,
                average_precision_ci: pr.interval,
                observed_predicted_ratio: opr.ratio,
                observed_predicted_ci: ConfidenceInterval {
                    lower: opr.lower,
                    upper: opr.upper,
                    level: crate::opr::OPR_CI_LEVEL,
                },
            })
            .collect();
        EvaluationSummary {
            n_patients: self.n_patients,
            n_events: self.n_events,
            config: &self.config,
            models,
            nri: &self.nri,
        }
    }

    /// Writes every report file into `out_dir`, creating it if needed, and
    /// returns the paths written.
    pub fn write_all(&self, out_dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
        fs::create_dir_all(out_dir)?;
        let mut written = Vec::new();

        let mut emit = |name: &str, result: Result<(), ReportError>| -> Result<(), ReportError> {
            result?;
            written.push(out_dir.join(name));
            Ok(())
        };
        emit("roc_curves.tsv", write_roc_coordinates(&out_dir.join("roc_curves.tsv"), &self.roc))?;
        emit("pr_curves.tsv", write_pr_coordinates(&out_dir.join("pr_curves.tsv"), &self.pr))?;
        emit(
            "calibration_curves.tsv",
            write_calibration_coordinates(&out_dir.join("calibration_curves.tsv"), &self.calibration),
        )?;
        emit("opr.tsv", write_opr_table(&out_dir.join("opr.tsv"), &self.opr))?;
        emit(
            "nri_additive.tsv",
            write_nri_matrix(&out_dir.join("nri_additive.tsv"), &self.nri.additive),
        )?;
        emit(
            "nri_absolute.tsv",
            write_nri_matrix(&out_dir.join("nri_absolute.tsv"), &self.nri.absolute),
        )?;
        emit(
            "summary.json",
            write_json_summary(&out_dir.join("summary.json"), &self.summary()),
        )?;

        log::info!("Wrote {} report files to '{}'", written.len(), out_dir.display());
        Ok(written)
    }
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<fs::File>, ReportError> {
    Ok(WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?)
}

/// Square matrix with model names as both the header row and first column.
pub fn write_nri_matrix(path: &Path, matrix: &NriMatrix) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    let mut header = vec![String::new()];
    header.extend(matrix.names.iter().cloned());
    wtr.write_record(&header)?;
    for (name, row) in matrix.names.iter().zip(matrix.values.rows()) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_opr_table(path: &Path, table: &OprTable) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    let mut header = vec!["model"];
    header.extend(OprTable::COLUMNS);
    wtr.write_record(&header)?;
    for row in &table.rows {
        wtr.write_record([
            row.name.clone(),
            row.ratio.to_string(),
            row.lower.to_string(),
            row.upper.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_roc_coordinates(path: &Path, summaries: &[RocSummary]) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["model", "fpr", "tpr", "threshold"])?;
    for summary in summaries {
        let curve = &summary.curve;
        for ((fpr, tpr), threshold) in curve.fpr.iter().zip(&curve.tpr).zip(&curve.thresholds) {
            wtr.write_record([
                summary.name.clone(),
                fpr.to_string(),
                tpr.to_string(),
                threshold.to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// The terminal `(recall 0, precision 1)` point has no threshold and is
/// written with an empty threshold field.
pub fn write_pr_coordinates(path: &Path, summaries: &[PrSummary]) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["model", "recall", "precision", "threshold"])?;
    for summary in summaries {
        let curve = &summary.curve;
        for (k, (recall, precision)) in curve.recall.iter().zip(&curve.precision).enumerate() {
            let threshold = curve
                .thresholds
                .get(k)
                .map(|t| t.to_string())
                .unwrap_or_default();
            wtr.write_record([
                summary.name.clone(),
                recall.to_string(),
                precision.to_string(),
                threshold,
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_calibration_coordinates(
    path: &Path,
    summaries: &[CalibrationSummary],
) -> Result<(), ReportError> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["model", "mean_predicted", "fraction_positive", "count"])?;
    for summary in summaries {
        let curve = &summary.curve;
        for ((mean, fraction), count) in curve
            .mean_predicted
            .iter()
            .zip(&curve.fraction_positive)
            .zip(&curve.counts)
        {
            wtr.write_record([
                summary.name.clone(),
                mean.to_string(),
                fraction.to_string(),
                count.to_string(),
            ])?;
        }
    }
    // Reference diagonal for the overlay.
    let (xs, ys) = curves::REFERENCE_DIAGONAL;
    for (x, y) in xs.iter().zip(ys.iter()) {
        wtr.write_record([
            "reference".to_string(),
            x.to_string(),
            y.to_string(),
            String::new(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json_summary(path: &Path, summary: &EvaluationSummary<'_>) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}
