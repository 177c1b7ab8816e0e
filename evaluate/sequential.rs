//! # Sequential (Cascaded) Classification
//!
//! A base model triages every patient. Patients whose base probability is at
//! or above the cutoff are rescored by a model specialized for the high-risk
//! subpopulation; everyone else keeps the base probability. Both sub-models
//! are fitted before composition and the composition itself never trains.

use crate::classifier::{
    ClassifierError, ProbabilisticClassifier, SharedClassifier, aligned_positive_proba,
    probability_table,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::fmt;

pub const DEFAULT_CUTOFF: f64 = 0.10;

/// Which sub-model scores a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Base,
    HighRisk,
}

/// Rows flagged by the base model, with their original positions.
#[derive(Debug, Clone)]
pub struct HighRiskCohort {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    pub indices: Vec<usize>,
}

#[derive(Clone)]
pub struct SequentialClassifier {
    base: SharedClassifier,
    high_risk: SharedClassifier,
    cutoff: f64,
}

impl fmt::Debug for SequentialClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialClassifier")
            .field("cutoff", &self.cutoff)
            .finish_non_exhaustive()
    }
}

impl SequentialClassifier {
    pub fn new(
        base: SharedClassifier,
        high_risk: SharedClassifier,
        cutoff: f64,
    ) -> Result<Self, ClassifierError> {
        if !(0.0..=1.0).contains(&cutoff) {
            return Err(ClassifierError::InvalidCutoff(cutoff));
        }
        if !base.is_fitted() {
            return Err(ClassifierError::NotFitted("base"));
        }
        if !high_risk.is_fitted() {
            return Err(ClassifierError::NotFitted("high-risk"));
        }
        Ok(Self {
            base,
            high_risk,
            cutoff,
        })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn base_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ClassifierError> {
        aligned_positive_proba(self.base.as_ref(), "base", x)
    }

    fn routes_for(&self, base: ArrayView1<f64>) -> Vec<Route> {
        base.iter()
            .map(|&p| {
                if p >= self.cutoff {
                    Route::HighRisk
                } else {
                    Route::Base
                }
            })
            .collect()
    }

    /// Per-row routing decision made by the base model.
    pub fn route(&self, x: ArrayView2<f64>) -> Result<Vec<Route>, ClassifierError> {
        let base = self.base_proba(x)?;
        Ok(self.routes_for(base.view()))
    }

    /// The rows the high-risk model is responsible for, i.e. the subset a
    /// high-risk model is trained on.
    pub fn high_risk_cohort(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<HighRiskCohort, ClassifierError> {
        if y.len() != x.nrows() {
            return Err(ClassifierError::LabelCountMismatch {
                labels: y.len(),
                rows: x.nrows(),
            });
        }
        let indices: Vec<usize> = self
            .route(x)?
            .into_iter()
            .enumerate()
            .filter(|&(_, route)| route == Route::HighRisk)
            .map(|(i, _)| i)
            .collect();
        Ok(HighRiskCohort {
            features: x.select(Axis(0), &indices),
            labels: y.select(Axis(0), &indices),
            indices,
        })
    }
}

impl ProbabilisticClassifier for SequentialClassifier {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifierError> {
        let mut positive = self.base_proba(x)?;
        let routes = self.routes_for(positive.view());
        let n_routed = routes.iter().filter(|&&r| r == Route::HighRisk).count();
        log::debug!(
            "Routing {} of {} rows to the high-risk model (cutoff {})",
            n_routed,
            routes.len(),
            self.cutoff
        );

        if n_routed > 0 {
            let high_risk = aligned_positive_proba(self.high_risk.as_ref(), "high-risk", x)?;
            for ((p, &hr), route) in positive.iter_mut().zip(high_risk.iter()).zip(&routes) {
                if *route == Route::HighRisk {
                    *p = hr;
                }
            }
        }
        Ok(probability_table(positive.view()))
    }

    fn is_fitted(&self) -> bool {
        self.base.is_fitted() && self.high_risk.is_fitted()
    }
}
