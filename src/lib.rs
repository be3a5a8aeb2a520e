//! logsift - Per-request anomaly detection for raw log lines
//!
//! Every request trains a fresh isolation forest on the batch it receives and
//! returns the lines that batch considers outliers:
//!
//! 1. [`feature_engineering`] turns each line into `[length, digit_count, special_count]`
//! 2. [`anomaly`] fits an isolation forest on that matrix and labels every row
//! 3. [`detection`] maps labels back to the original lines, in input order
//!
//! # Modules
//!
//! - [`error`] - Error type shared by the pipeline
//! - [`feature_engineering`] - Character-count features
//! - [`anomaly`] - Isolation Forest and the detector trait
//! - [`detection`] - Request-scoped detection service and helpers
//! - [`server`] - HTTP endpoint
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```
//! use logsift::detection::DetectionService;
//!
//! let service = DetectionService::default();
//! let lines = vec!["abc", "abc", "abc", "abc", "###!!!999$$$###111"];
//! let anomalies = service.detect(&lines).unwrap();
//! assert_eq!(anomalies, vec!["###!!!999$$$###111".to_string()]);
//! ```

// Core error handling
pub mod error;

// Detection pipeline
pub mod feature_engineering;
pub mod anomaly;
pub mod detection;

// Services
pub mod server;
pub mod cli;

pub use error::{LogsiftError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{LogsiftError, Result};

    pub use crate::feature_engineering::{CharClassification, FeatureExtractor, LineFeatures};

    pub use crate::anomaly::{
        fit_and_predict, AnomalyDetector, AnomalyLabel, AnomalyResult, IsolationForest,
    };

    pub use crate::detection::{DetectionReport, DetectionService, DetectorConfig};
}
