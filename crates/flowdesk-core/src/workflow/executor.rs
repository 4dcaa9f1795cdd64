//! Step executors and the registry that maps step types to them.
//!
//! A step executor performs (or simulates) the real-world effect of one step:
//! an external API call, a language-model extraction, a decision, a
//! notification, a document. The engine's only contract with an executor is
//! "async function returning a JSON result or an error".
//!
//! `StepExecutor` uses RPITIT and is therefore not object-safe. The registry
//! stores executors behind `StepExecutorDyn`, an object-safe mirror with boxed
//! futures that every `StepExecutor` implements through a blanket impl.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use flowdesk_types::config::SimulationConfig;
use flowdesk_types::workflow::{Step, StepType};
use serde_json::Value;

use super::simulated::{Entropy, SimulatedExecutor};

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors that can occur during step execution.
///
/// The `Display` text is what the engine records in `Step.error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    /// The executor ran and reported a failure.
    #[error("{0}")]
    ExecutionFailed(String),

    /// No executor is registered for the step's type.
    #[error("no executor registered for step type '{0}'")]
    NoExecutor(StepType),

    /// The executor did not settle within the step timeout.
    #[error("step timed out after {}", format_limit(.0))]
    TimedOut(Duration),

    /// The sweep was cancelled while the step was in flight.
    #[error("step cancelled")]
    Cancelled,
}

/// Whole seconds print as `Ns`, anything finer as `Nms`.
fn format_limit(limit: &Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}

// ---------------------------------------------------------------------------
// StepExecutor
// ---------------------------------------------------------------------------

/// Performs the effect of one step type.
pub trait StepExecutor: Send + Sync {
    fn execute(&self, step: &Step) -> impl Future<Output = Result<Value, StepError>> + Send;
}

/// Object-safe version of [`StepExecutor`] with boxed futures.
pub trait StepExecutorDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        step: &'a Step,
    ) -> Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send + 'a>>;
}

/// Blanket implementation: any `StepExecutor` automatically implements `StepExecutorDyn`.
impl<T: StepExecutor> StepExecutorDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        step: &'a Step,
    ) -> Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send + 'a>> {
        Box::pin(self.execute(step))
    }
}

/// Adapter that turns an async closure over an owned `Step` into an executor.
pub struct FnExecutor<F> {
    f: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(Step) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StepError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> StepExecutor for FnExecutor<F>
where
    F: Fn(Step) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StepError>> + Send,
{
    fn execute(&self, step: &Step) -> impl Future<Output = Result<Value, StepError>> + Send {
        (self.f)(step.clone())
    }
}

// ---------------------------------------------------------------------------
// ExecutorRegistry
// ---------------------------------------------------------------------------

/// Maps step types to executors. Injected into the engine at construction.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<StepType, Arc<dyn StepExecutorDyn>>,
}

impl ExecutorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a simulated executor for every known step type.
    pub fn simulated(entropy: Arc<dyn Entropy>, config: SimulationConfig) -> Self {
        let mut registry = Self::new();
        for step_type in StepType::ALL {
            registry.register(
                step_type.clone(),
                SimulatedExecutor::new(step_type, Arc::clone(&entropy), config.clone()),
            );
        }
        registry
    }

    /// Register (or replace) the executor for a step type.
    pub fn register<E>(&mut self, step_type: StepType, executor: E) -> &mut Self
    where
        E: StepExecutor + 'static,
    {
        self.executors.insert(step_type, Arc::new(executor));
        self
    }

    /// Register an async closure as the executor for a step type.
    pub fn register_fn<F, Fut>(&mut self, step_type: StepType, f: F) -> &mut Self
    where
        F: Fn(Step) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        self.register(step_type, FnExecutor::new(f))
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<E>(mut self, step_type: StepType, executor: E) -> Self
    where
        E: StepExecutor + 'static,
    {
        self.register(step_type, executor);
        self
    }

    pub fn get(&self, step_type: &StepType) -> Option<Arc<dyn StepExecutorDyn>> {
        self.executors.get(step_type).cloned()
    }

    pub fn contains(&self, step_type: &StepType) -> bool {
        self.executors.contains_key(step_type)
    }

    /// Registered step types: built-ins in `StepType::ALL` order, then custom
    /// tags alphabetically.
    pub fn step_types(&self) -> Vec<StepType> {
        let mut types: Vec<StepType> = self.executors.keys().cloned().collect();
        types.sort_by_key(|t| {
            let rank = StepType::ALL.iter().position(|b| b == t).unwrap_or(StepType::ALL.len());
            (rank, t.as_str().to_string())
        });
        types
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("step_types", &self.step_types())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::simulated::FixedEntropy;
    use serde_json::json;

    struct Echo;

    impl StepExecutor for Echo {
        async fn execute(&self, step: &Step) -> Result<Value, StepError> {
            Ok(json!({"echo": step.id}))
        }
    }

    #[tokio::test]
    async fn registered_executor_is_dispatched() {
        let registry = ExecutorRegistry::new().with(StepType::Api, Echo);
        let step = Step::new("fetch", StepType::Api);

        let executor = registry.get(&StepType::Api).unwrap();
        let out = executor.execute_boxed(&step).await.unwrap();
        assert_eq!(out, json!({"echo": "fetch"}));
        assert!(registry.get(&StepType::Ai).is_none());
    }

    #[tokio::test]
    async fn closure_executor_receives_step() {
        let mut registry = ExecutorRegistry::new();
        registry.register_fn(StepType::Decision, |step: Step| async move {
            Err(StepError::ExecutionFailed(format!("{} rejected", step.id)))
        });

        let step = Step::new("approve", StepType::Decision);
        let err = registry
            .get(&StepType::Decision)
            .unwrap()
            .execute_boxed(&step)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "approve rejected");
    }

    #[test]
    fn register_replaces_existing_executor() {
        let mut registry = ExecutorRegistry::new();
        registry.register(StepType::Api, Echo);
        registry.register(StepType::Api, Echo);
        assert_eq!(registry.step_types(), vec![StepType::Api]);
    }

    #[tokio::test]
    async fn custom_step_type_can_be_registered() {
        let registry = ExecutorRegistry::new()
            .with(StepType::from_tag("webhook"), Echo)
            .with(StepType::Api, Echo);

        assert_eq!(
            registry.step_types(),
            vec![StepType::Api, StepType::Custom("webhook".into())]
        );

        let step = Step::new("hook", StepType::from_tag("webhook"));
        let out = registry
            .get(&step.step_type)
            .unwrap()
            .execute_boxed(&step)
            .await
            .unwrap();
        assert_eq!(out, json!({"echo": "hook"}));
    }

    #[test]
    fn simulated_registry_covers_all_step_types() {
        let registry =
            ExecutorRegistry::simulated(Arc::new(FixedEntropy(0.5)), SimulationConfig::default());
        for step_type in StepType::ALL {
            assert!(registry.contains(&step_type), "missing {step_type}");
        }
    }

    #[test]
    fn step_error_display() {
        assert_eq!(
            StepError::NoExecutor(StepType::Document).to_string(),
            "no executor registered for step type 'document'"
        );
        assert_eq!(
            StepError::NoExecutor(StepType::from_tag("webhook")).to_string(),
            "no executor registered for step type 'webhook'"
        );
        assert_eq!(
            StepError::TimedOut(Duration::from_secs(30)).to_string(),
            "step timed out after 30s"
        );
        assert_eq!(
            StepError::TimedOut(Duration::from_millis(250)).to_string(),
            "step timed out after 250ms"
        );
        assert_eq!(StepError::Cancelled.to_string(), "step cancelled");
    }
}
