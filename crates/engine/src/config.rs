//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for the orchestration engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum detection confidence for a step to pass
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Upper bound on a single detection/OCR call
    #[serde(default = "default_detection_timeout_secs")]
    pub detection_timeout_secs: u64,

    /// Concurrent inference calls allowed. 1 serializes access for
    /// backends that are not thread-safe (GPU-bound models usually are
    /// not).
    #[serde(default = "default_max_inference_concurrency")]
    pub max_inference_concurrency: usize,

    /// Idle lifetime of an execution context before eviction
    #[serde(default = "default_run_ttl_secs")]
    pub run_ttl_secs: u64,

    /// How often the eviction sweep runs
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

fn default_min_confidence() -> f64 {
    0.5
}

fn default_detection_timeout_secs() -> u64 {
    30
}

fn default_max_inference_concurrency() -> usize {
    1
}

fn default_run_ttl_secs() -> u64 {
    3600
}

fn default_eviction_interval_secs() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            detection_timeout_secs: default_detection_timeout_secs(),
            max_inference_concurrency: default_max_inference_concurrency(),
            run_ttl_secs: default_run_ttl_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}
