//! Application state management

use std::sync::atomic::{AtomicU64, Ordering};

use crate::detection::DetectionService;

use super::ServerConfig;

/// Application state shared across handlers.
///
/// Holds no model: the detection service builds a fresh forest per request.
pub struct AppState {
    pub config: ServerConfig,
    pub detector: DetectionService,
    pub started_at: chrono::DateTime<chrono::Utc>,
    requests_served: AtomicU64,
    anomalies_reported: AtomicU64,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let detector = DetectionService::new(config.detector.clone());
        Self::with_detector(config, detector)
    }

    pub fn with_detector(config: ServerConfig, detector: DetectionService) -> Self {
        Self {
            config,
            detector,
            started_at: chrono::Utc::now(),
            requests_served: AtomicU64::new(0),
            anomalies_reported: AtomicU64::new(0),
        }
    }

    /// Record a completed detection request
    pub fn record_request(&self, n_anomalies: usize) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.anomalies_reported
            .fetch_add(n_anomalies as u64, Ordering::Relaxed);
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub fn anomalies_reported(&self) -> u64 {
        self.anomalies_reported.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}
