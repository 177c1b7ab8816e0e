use crate::classifier::{ClassifierError, ProbabilisticClassifier, probability_table};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Custom error type for model loading, saving, and prediction.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Model lists {names} feature names but carries {coefficients} coefficients.")]
    CoefficientCountMismatch { names: usize, coefficients: usize },
    #[error("Prediction data has {found} feature columns, but the model was fitted on {expected}.")]
    FeatureCountMismatch { found: usize, expected: usize },
    #[error(
        "Feature '{feature}' is missing or non-finite at row {row}. Impute upstream before scoring."
    )]
    NonFiniteFeature { row: usize, feature: String },
}

/// A fitted logistic regression: `P(event) = sigmoid(intercept + x·beta)`.
///
/// Fitting happens elsewhere; this artifact only carries the estimated
/// coefficients, in the column order given by `feature_names`, and applies
/// them to new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

impl LogisticModel {
    pub fn new(
        feature_names: Vec<String>,
        intercept: f64,
        coefficients: Array1<f64>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            feature_names,
            intercept,
            coefficients,
        };
        model.check_shape()?;
        Ok(model)
    }

    fn check_shape(&self) -> Result<(), ModelError> {
        if self.feature_names.len() != self.coefficients.len() {
            return Err(ModelError::CoefficientCountMismatch {
                names: self.feature_names.len(),
                coefficients: self.coefficients.len(),
            });
        }
        Ok(())
    }

    /// Predicts event probabilities for new patients.
    ///
    /// # Arguments
    /// * `x`: Feature matrix with shape `[n_patients, n_features]`, columns in
    ///   `feature_names` order. Missing values must already be imputed.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.coefficients.len() {
            return Err(ModelError::FeatureCountMismatch {
                found: x.ncols(),
                expected: self.coefficients.len(),
            });
        }
        if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFiniteFeature {
                row,
                feature: self.feature_names[col].clone(),
            });
        }

        let eta = x.dot(&self.coefficients) + self.intercept;
        // Clamp eta to prevent overflow in exp()
        let eta_clamped = eta.mapv(|e| e.clamp(-700.0, 700.0));
        Ok(eta_clamped.mapv(|e| 1.0 / (1.0 + f64::exp(-e))))
    }

    /// Saves the model to a file in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads a model from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model: Self = toml::from_str(&toml_string)?;
        model.check_shape()?;
        Ok(model)
    }
}

impl ProbabilisticClassifier for LogisticModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        let positive = self.predict(x)?;
        Ok(probability_table(positive.view()))
    }
}
