//! Simulated integration executors.
//!
//! Stand-ins for the real integrations behind each step type. Each one sleeps
//! for a randomized latency and returns a plausible payload; the `api`
//! executor also fails with a configurable probability. All randomness comes
//! from an injected [`Entropy`] so tests and demos can be made deterministic.

use std::sync::Arc;
use std::time::Duration;

use flowdesk_types::config::SimulationConfig;
use flowdesk_types::workflow::{Step, StepType};
use serde_json::{Value, json};
use uuid::Uuid;

use super::executor::{StepError, StepExecutor};

// ---------------------------------------------------------------------------
// Entropy
// ---------------------------------------------------------------------------

/// Source of uniformly distributed samples in `[0, 1)`.
pub trait Entropy: Send + Sync {
    fn sample(&self) -> f64;
}

/// Entropy drawn from random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidEntropy;

impl Entropy for UuidEntropy {
    fn sample(&self) -> f64 {
        // The low 56 bits of a v4 UUID are fully random; keep 53 of them.
        let bits = Uuid::new_v4().as_u128() & ((1u128 << 53) - 1);
        bits as f64 / (1u64 << 53) as f64
    }
}

/// Entropy that always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub f64);

impl Entropy for FixedEntropy {
    fn sample(&self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

// ---------------------------------------------------------------------------
// SimulatedExecutor
// ---------------------------------------------------------------------------

/// Simulated executor for one step type.
pub struct SimulatedExecutor {
    step_type: StepType,
    entropy: Arc<dyn Entropy>,
    config: SimulationConfig,
}

impl SimulatedExecutor {
    pub fn new(step_type: StepType, entropy: Arc<dyn Entropy>, config: SimulationConfig) -> Self {
        Self {
            step_type,
            entropy,
            config,
        }
    }

    fn latency(&self) -> Duration {
        let min = self.config.min_latency_ms;
        let max = self.config.max_latency_ms.max(min);
        let spread = (max - min) as f64 * self.entropy.sample();
        Duration::from_millis(min + spread as u64)
    }

    /// Integer in `[low, high]` derived from one sample.
    fn sample_range(&self, low: u64, high: u64) -> u64 {
        low + ((high - low + 1) as f64 * self.entropy.sample()) as u64
    }

    fn run_api(&self, step: &Step) -> Result<Value, StepError> {
        let endpoint = config_str(step, "endpoint").unwrap_or("https://api.example.com/v1/records");
        if self.entropy.sample() < self.config.api_failure_rate {
            return Err(StepError::ExecutionFailed(format!(
                "API call to {endpoint} failed"
            )));
        }
        Ok(json!({
            "status": 200,
            "endpoint": endpoint,
            "data": { "records": self.sample_range(1, 250) },
        }))
    }

    fn run_ai(&self, step: &Step) -> Value {
        let model = config_str(step, "model").unwrap_or("extraction-v2");
        json!({
            "model": model,
            "confidence": 0.85 + 0.15 * self.entropy.sample(),
            "extracted_entities": ["customer_name", "invoice_total", "due_date"],
        })
    }

    fn run_decision(&self) -> Value {
        let decision = if self.entropy.sample() >= 0.2 {
            "approved"
        } else {
            "rejected"
        };
        json!({
            "decision": decision,
            "confidence": 0.7 + 0.3 * self.entropy.sample(),
        })
    }

    fn run_notification(&self, step: &Step) -> Value {
        json!({
            "channel": config_str(step, "channel").unwrap_or("email"),
            "recipients": self.sample_range(1, 10),
            "delivered": true,
        })
    }

    fn run_document(&self) -> Value {
        json!({
            "document_id": format!("doc_{}", Uuid::now_v7().simple()),
            "pages": self.sample_range(1, 20),
            "format": "pdf",
        })
    }
}

impl StepExecutor for SimulatedExecutor {
    async fn execute(&self, step: &Step) -> Result<Value, StepError> {
        let latency = self.latency();
        tracing::debug!(
            step_id = step.id.as_str(),
            step_type = %self.step_type,
            latency_ms = latency.as_millis() as u64,
            "running simulated step"
        );
        tokio::time::sleep(latency).await;

        match &self.step_type {
            StepType::Api => self.run_api(step),
            StepType::Ai => Ok(self.run_ai(step)),
            StepType::Decision => Ok(self.run_decision()),
            StepType::Notification => Ok(self.run_notification(step)),
            StepType::Document => Ok(self.run_document()),
            StepType::Custom(_) => Err(StepError::NoExecutor(self.step_type.clone())),
        }
    }
}

fn config_str<'a>(step: &'a Step, key: &str) -> Option<&'a str> {
    step.config.get(key).and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_config(failure_rate: f64) -> SimulationConfig {
        SimulationConfig {
            min_latency_ms: 0,
            max_latency_ms: 0,
            api_failure_rate: failure_rate,
            ..SimulationConfig::default()
        }
    }

    fn executor(step_type: StepType, sample: f64, failure_rate: f64) -> SimulatedExecutor {
        SimulatedExecutor::new(
            step_type,
            Arc::new(FixedEntropy(sample)),
            instant_config(failure_rate),
        )
    }

    #[test]
    fn uuid_entropy_stays_in_unit_interval() {
        for _ in 0..1_000 {
            let s = UuidEntropy.sample();
            assert!((0.0..1.0).contains(&s), "sample {s} out of range");
        }
    }

    #[tokio::test]
    async fn api_fails_below_failure_rate() {
        let step = Step::new("fetch", StepType::Api)
            .with_config(json!({"endpoint": "https://crm.example.com"}));

        let err = executor(StepType::Api, 0.01, 0.05)
            .execute(&step)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StepError::ExecutionFailed("API call to https://crm.example.com failed".to_string())
        );

        let ok = executor(StepType::Api, 0.5, 0.05).execute(&step).await.unwrap();
        assert_eq!(ok["status"], 200);
        assert_eq!(ok["endpoint"], "https://crm.example.com");
    }

    #[tokio::test]
    async fn ai_confidence_in_expected_band() {
        let step = Step::new("extract", StepType::Ai);
        let out = executor(StepType::Ai, 0.5, 0.0).execute(&step).await.unwrap();
        let confidence = out["confidence"].as_f64().unwrap();
        assert!((0.85..1.0).contains(&confidence));
        assert!(out["extracted_entities"].as_array().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn decision_and_notification_payloads() {
        let decision = executor(StepType::Decision, 0.9, 0.0)
            .execute(&Step::new("d", StepType::Decision))
            .await
            .unwrap();
        assert_eq!(decision["decision"], "approved");

        let notify = executor(StepType::Notification, 0.999, 0.0)
            .execute(&Step::new("n", StepType::Notification).with_config(json!({"channel": "slack"})))
            .await
            .unwrap();
        assert_eq!(notify["channel"], "slack");
        assert_eq!(notify["recipients"], 10);
    }

    #[tokio::test]
    async fn document_pages_in_range() {
        let out = executor(StepType::Document, 0.0, 0.0)
            .execute(&Step::new("doc", StepType::Document))
            .await
            .unwrap();
        assert_eq!(out["pages"], 1);
        assert!(out["document_id"].as_str().unwrap().starts_with("doc_"));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_follows_configured_bounds() {
        let exec = SimulatedExecutor::new(
            StepType::Ai,
            Arc::new(FixedEntropy(0.5)),
            SimulationConfig {
                min_latency_ms: 100,
                max_latency_ms: 300,
                ..SimulationConfig::default()
            },
        );
        assert_eq!(exec.latency(), Duration::from_millis(200));

        let started = tokio::time::Instant::now();
        exec.execute(&Step::new("x", StepType::Ai)).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }
}
