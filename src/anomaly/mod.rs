//! Anomaly detection module
//!
//! Unsupervised outlier detection trained and applied on the same batch:
//! - Isolation Forest (random partitioning trees, path-length scoring)

mod isolation_forest;

pub use isolation_forest::{
    average_path_length, fit_and_predict, IsolationForest, IsolationTree, AUTO_THRESHOLD,
    SCORE_TOLERANCE,
};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-row verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyLabel {
    Normal,
    Anomalous,
}

impl AnomalyLabel {
    pub fn is_anomalous(self) -> bool {
        self == AnomalyLabel::Anomalous
    }

    /// Integer convention shared with scikit-learn: -1 = anomaly, 1 = normal
    pub fn as_i32(self) -> i32 {
        match self {
            AnomalyLabel::Normal => 1,
            AnomalyLabel::Anomalous => -1,
        }
    }
}

/// Anomaly detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Anomaly scores (higher = more anomalous)
    pub scores: Array1<f64>,
    /// Per-row labels, in input order
    pub labels: Vec<AnomalyLabel>,
    /// Threshold used for classification
    pub threshold: f64,
    /// Number of anomalies detected
    pub n_anomalies: usize,
}

impl AnomalyResult {
    pub fn new(scores: Array1<f64>, labels: Vec<AnomalyLabel>, threshold: f64) -> Self {
        let n_anomalies = labels.iter().filter(|l| l.is_anomalous()).count();
        Self {
            scores,
            labels,
            threshold,
            n_anomalies,
        }
    }

    /// Indices of the anomalous rows, ascending
    pub fn anomalous_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_anomalous())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Trait for anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit the detector on training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Compute anomaly scores for new data
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict a label per row
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<AnomalyLabel>>;

    /// Fit and predict in one step. An empty matrix short-circuits without fitting.
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Vec<AnomalyLabel>> {
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        self.fit(x)?;
        self.predict(x)
    }

    /// Get detection results with scores and labels
    fn detect(&self, x: &Array2<f64>) -> Result<AnomalyResult> {
        let scores = self.score_samples(x)?;
        let labels = self.predict(x)?;
        Ok(AnomalyResult::new(scores, labels, self.threshold()))
    }

    /// Get the decision threshold
    fn threshold(&self) -> f64;
}
