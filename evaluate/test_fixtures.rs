//! Test fixtures for the evaluation layer.
//!
//! Builds seeded synthetic cohorts whose outcomes follow a known logistic
//! model, so tests can compare evaluators against a ground-truth classifier.

use crate::model::LogisticModel;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// A synthetic cohort together with the model that generated it.
#[derive(Clone)]
pub struct SyntheticCohort {
    /// Feature matrix (n_patients × n_features), standard normal columns.
    pub x: Array2<f64>,
    /// Binary outcomes drawn from the generating model.
    pub y: Array1<f64>,
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

impl SyntheticCohort {
    pub fn n(&self) -> usize {
        self.y.len()
    }

    /// Outcome probabilities under the generating model.
    pub fn true_probabilities(&self) -> Array1<f64> {
        let eta = self.x.dot(&self.coefficients) + self.intercept;
        eta.mapv(|e| 1.0 / (1.0 + (-e).exp()))
    }

    /// The generating model as a classifier.
    pub fn true_model(&self) -> LogisticModel {
        let names = (1..=self.coefficients.len())
            .map(|i| format!("x{i}"))
            .collect();
        LogisticModel::new(names, self.intercept, self.coefficients.clone())
            .expect("fixture coefficients match fixture names")
    }
}

/// Builder for synthetic cohorts with a configurable event rate and signal.
pub struct SyntheticCohortBuilder {
    n_samples: usize,
    n_features: usize,
    intercept: f64,
    signal_strength: f64,
    seed: u64,
}

impl SyntheticCohortBuilder {
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            n_features: 3,
            intercept: -1.5,
            signal_strength: 1.0,
            seed: 42,
        }
    }

    /// Number of feature columns.
    pub fn with_features(mut self, k: usize) -> Self {
        self.n_features = k.max(1);
        self
    }

    /// Baseline log-odds; more negative values give rarer events.
    pub fn with_intercept(mut self, intercept: f64) -> Self {
        self.intercept = intercept;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = s;
        self
    }

    pub fn build(self) -> SyntheticCohort {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = self.n_samples;

        let x: Array2<f64> = Array2::from_shape_fn((n, self.n_features), |_| rng.sample(StandardNormal));
        let coefficients = Array1::from_iter(
            (0..self.n_features).map(|j| self.signal_strength / (1.0 + j as f64)),
        );

        let eta = x.dot(&coefficients) + self.intercept;
        let y = eta.mapv(|e| {
            let p = 1.0 / (1.0 + (-e).exp());
            if rng.gen_bool(p) { 1.0 } else { 0.0 }
        });

        SyntheticCohort {
            x,
            y,
            intercept: self.intercept,
            coefficients,
        }
    }
}
