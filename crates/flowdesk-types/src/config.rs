//! Global configuration types for Flowdesk.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! report history capacity, the scheduling contract of the workflow engine,
//! step timeouts, and the behaviour of the simulated integrations.

use serde::{Deserialize, Serialize};

use crate::report::MAX_REPORTS;

/// How the engine sweeps a workflow's steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// One linear pass in stored order. Steps must be supplied in a
    /// dependency-compatible order; a step whose dependency appears later
    /// in the list stays `pending`.
    #[default]
    SinglePass,
    /// Repeated sequential passes until a pass runs nothing.
    ReadyQueue,
}

/// Top-level configuration for Flowdesk.
///
/// Loaded from `~/.flowdesk/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Capacity of the persisted report history (oldest entries are evicted).
    #[serde(default = "default_max_reports")]
    pub max_reports: usize,

    #[serde(default)]
    pub scheduling: SchedulingMode,

    /// Per-step timeout in seconds. `0` disables the timeout.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_max_reports() -> usize {
    MAX_REPORTS
}

fn default_step_timeout_secs() -> u64 {
    300
}

impl GlobalConfig {
    /// The step timeout as an `Option`, `None` when disabled.
    pub fn step_timeout(&self) -> Option<std::time::Duration> {
        (self.step_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.step_timeout_secs))
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            max_reports: default_max_reports(),
            scheduling: SchedulingMode::default(),
            step_timeout_secs: default_step_timeout_secs(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// Tuning for the simulated step executors and generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    /// Probability in `[0, 1]` that a simulated `api` step fails.
    #[serde(default = "default_api_failure_rate")]
    pub api_failure_rate: f64,
    /// Delay between simulated generation phases.
    #[serde(default = "default_generation_phase_delay_ms")]
    pub generation_phase_delay_ms: u64,
}

fn default_min_latency_ms() -> u64 {
    200
}

fn default_max_latency_ms() -> u64 {
    800
}

fn default_api_failure_rate() -> f64 {
    0.05
}

fn default_generation_phase_delay_ms() -> u64 {
    400
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
            api_failure_rate: default_api_failure_rate(),
            generation_phase_delay_ms: default_generation_phase_delay_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.max_reports, 50);
        assert_eq!(config.scheduling, SchedulingMode::SinglePass);
        assert_eq!(config.step_timeout(), Some(std::time::Duration::from_secs(300)));
        assert!((config.simulation.api_failure_rate - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
max_reports = 10
scheduling = "ready_queue"
step_timeout_secs = 0

[simulation]
min_latency_ms = 0
max_latency_ms = 5
api_failure_rate = 0.5
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_reports, 10);
        assert_eq!(config.scheduling, SchedulingMode::ReadyQueue);
        assert_eq!(config.step_timeout(), None);
        assert_eq!(config.simulation.max_latency_ms, 5);
        assert!((config.simulation.api_failure_rate - 0.5).abs() < f64::EPSILON);
        // Unset simulation fields keep their defaults
        assert_eq!(config.simulation.generation_phase_delay_ms, 400);
    }

    #[test]
    fn test_global_config_serde_roundtrip() {
        let config = GlobalConfig {
            max_reports: 7,
            scheduling: SchedulingMode::ReadyQueue,
            ..GlobalConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: GlobalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
