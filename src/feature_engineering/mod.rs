//! Feature engineering for log lines
//!
//! Converts unstructured text into the numeric matrix consumed by the
//! anomaly detectors.

mod log_features;

pub use log_features::{CharClassification, FeatureExtractor, LineFeatures, N_FEATURES};
