//! Log anomaly detection
//!
//! Raw lines go through the feature extractor, a freshly fitted isolation
//! forest labels every row, and the anomalous lines come back unmodified and
//! in their original order. Nothing survives between calls.

mod config;
mod service;
mod summary;

pub use config::DetectorConfig;
pub use service::{DetectionReport, DetectionService, DetectorFactory, ScoredLine};
pub use summary::{split_log_content, summarize_anomalies, MAX_ANOMALIES, SAMPLE_SIZE};
