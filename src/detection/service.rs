//! Per-request detection service

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::anomaly::{AnomalyDetector, AnomalyResult, IsolationForest, AUTO_THRESHOLD};
use crate::error::{LogsiftError, Result};
use crate::feature_engineering::FeatureExtractor;

use super::config::DetectorConfig;

/// Builds a fresh, unfitted detector for one request
pub type DetectorFactory = dyn Fn(&DetectorConfig) -> Box<dyn AnomalyDetector> + Send + Sync;

/// An anomalous line together with its position and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLine {
    pub index: usize,
    pub line: String,
    pub score: f64,
}

/// Scores of the anomalous lines of one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub total_lines: usize,
    pub anomaly_count: usize,
    pub threshold: f64,
    pub anomalies: Vec<ScoredLine>,
}

impl DetectionReport {
    /// Anomalous lines in input order
    pub fn lines(&self) -> Vec<String> {
        self.anomalies.iter().map(|a| a.line.clone()).collect()
    }
}

/// Orchestrates feature extraction and a freshly trained detector per call.
///
/// Holds configuration only: every call builds, fits and drops its own model,
/// so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct DetectionService {
    config: DetectorConfig,
    extractor: FeatureExtractor,
    factory: Arc<DetectorFactory>,
}

impl std::fmt::Debug for DetectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionService")
            .field("config", &self.config)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl Default for DetectionService {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl DetectionService {
    /// Service backed by an isolation forest built from `config`
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_detector(config, isolation_forest_factory)
    }

    /// Service backed by a custom detector factory
    pub fn with_detector<F>(config: DetectorConfig, factory: F) -> Self
    where
        F: Fn(&DetectorConfig) -> Box<dyn AnomalyDetector> + Send + Sync + 'static,
    {
        let extractor = FeatureExtractor::new().with_classification(config.classification);
        Self {
            config,
            extractor,
            factory: Arc::new(factory),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Anomalous subset of `lines`, unmodified and in input order.
    pub fn detect<S: AsRef<str>>(&self, lines: &[S]) -> Result<Vec<String>> {
        if lines.is_empty() {
            debug!("Empty batch, skipping model construction");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let labels = self.guarded(|| {
            let x = self.extractor.extract(lines);
            let mut detector = (self.factory)(&self.config);
            detector.fit_predict(&x)
        })?;

        if labels.len() != lines.len() {
            return Err(internal(LogsiftError::ShapeError {
                expected: format!("{} labels", lines.len()),
                actual: format!("{} labels", labels.len()),
            }));
        }

        let anomalies: Vec<String> = lines
            .iter()
            .zip(&labels)
            .filter(|(_, label)| label.is_anomalous())
            .map(|(line, _)| line.as_ref().to_string())
            .collect();

        info!(
            n_lines = lines.len(),
            n_anomalies = anomalies.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Anomaly detection finished"
        );

        Ok(anomalies)
    }

    /// Scores, labels and threshold for every line of the batch
    pub fn analyze<S: AsRef<str>>(&self, lines: &[S]) -> Result<AnomalyResult> {
        if lines.is_empty() {
            return Ok(AnomalyResult::new(Array1::zeros(0), Vec::new(), AUTO_THRESHOLD));
        }

        let result = self.guarded(|| {
            let x = self.extractor.extract(lines);
            let mut detector = (self.factory)(&self.config);
            detector.fit(&x)?;
            detector.detect(&x)
        })?;

        if result.labels.len() != lines.len() || result.scores.len() != lines.len() {
            return Err(internal(LogsiftError::ShapeError {
                expected: format!("{} rows", lines.len()),
                actual: format!("{} labels, {} scores", result.labels.len(), result.scores.len()),
            }));
        }

        Ok(result)
    }

    /// Anomalous lines with their scores
    pub fn detect_with_scores<S: AsRef<str>>(&self, lines: &[S]) -> Result<DetectionReport> {
        let result = self.analyze(lines)?;
        let anomalies: Vec<ScoredLine> = result
            .anomalous_indices()
            .into_iter()
            .map(|index| ScoredLine {
                index,
                line: lines[index].as_ref().to_string(),
                score: result.scores[index],
            })
            .collect();

        Ok(DetectionReport {
            total_lines: lines.len(),
            anomaly_count: anomalies.len(),
            threshold: result.threshold,
            anomalies,
        })
    }

    /// Runs `f`, turning any error or panic into the single internal-error kind
    fn guarded<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result.map_err(internal),
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(internal(LogsiftError::ComputationError(format!(
                    "detector panicked: {}",
                    detail
                ))))
            }
        }
    }
}

fn isolation_forest_factory(config: &DetectorConfig) -> Box<dyn AnomalyDetector> {
    let mut forest = IsolationForest::new()
        .with_n_estimators(config.ensemble_size)
        .with_max_samples(config.subsample_size)
        .with_seed(config.seed);
    if let Some(c) = config.contamination {
        forest = forest.with_contamination(c);
    }
    Box::new(forest)
}

fn internal(err: LogsiftError) -> LogsiftError {
    error!(error = %err, "Anomaly detection failed");
    match err {
        LogsiftError::ComputationError(msg) => LogsiftError::ComputationError(msg),
        other => LogsiftError::ComputationError(other.to_string()),
    }
}
