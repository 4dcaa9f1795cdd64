//! Persisted workflow definitions.
//!
//! Workflows are kept as one JSON array under a single key of the
//! [`KvStore`], in insertion order. The engine itself is in-memory; the CLI
//! loads definitions from here before each run and saves the outcome back.

use flowdesk_types::error::RepositoryError;
use flowdesk_types::workflow::Workflow;
use tokio::sync::Mutex;

use crate::storage::kv_store::KvStore;

/// Key under which the workflow list is stored.
pub const WORKFLOWS_KEY: &str = "flowdesk.workflows";

/// Workflow definitions persisted through a [`KvStore`].
pub struct WorkflowStore<S: KvStore> {
    store: S,
    write_lock: Mutex<()>,
}

impl<S: KvStore> WorkflowStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// All stored workflows. A corrupt blob reads as empty.
    pub async fn list(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let Some(raw) = self.store.get(WORKFLOWS_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(workflows) => Ok(workflows),
            Err(e) => {
                tracing::warn!(error = %e, key = WORKFLOWS_KEY, "discarding unreadable workflow list");
                Ok(Vec::new())
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.list().await?.into_iter().find(|w| w.id == id))
    }

    /// Insert or replace (by ID) a workflow. Replacement keeps its position.
    pub async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.list().await?;
        match all.iter_mut().find(|w| w.id == workflow.id) {
            Some(existing) => *existing = workflow.clone(),
            None => all.push(workflow.clone()),
        }
        self.write(&all).await?;
        tracing::debug!(workflow_id = workflow.id.as_str(), "saved workflow");
        Ok(())
    }

    /// Remove a workflow. Returns whether anything was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.list().await?;
        let before = all.len();
        all.retain(|w| w.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.write(&all).await?;
        Ok(true)
    }

    async fn write(&self, workflows: &[Workflow]) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(workflows)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize workflows: {e}")))?;
        self.store.set(WORKFLOWS_KEY, &json).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use flowdesk_types::workflow::{Step, StepType};

    use super::*;
    use crate::testing::MemoryKv;

    fn onboarding() -> Workflow {
        Workflow::new(
            "onboarding",
            "Customer onboarding",
            vec![
                Step::new("fetch", StepType::Api),
                Step::new("welcome", StepType::Notification).depends_on(["fetch"]),
            ],
        )
    }

    #[tokio::test]
    async fn save_get_and_list() {
        let store = WorkflowStore::new(MemoryKv::new());
        assert!(store.list().await.unwrap().is_empty());

        store.save(&onboarding()).await.unwrap();
        store
            .save(&Workflow::new("audit", "Audit", Vec::new()))
            .await
            .unwrap();

        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec!["onboarding", "audit"]);
        assert_eq!(store.get("onboarding").await.unwrap().unwrap().steps.len(), 2);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_in_place() {
        let store = WorkflowStore::new(MemoryKv::new());
        store.save(&onboarding()).await.unwrap();
        store.save(&Workflow::new("audit", "Audit", Vec::new())).await.unwrap();

        let mut updated = onboarding();
        updated.name = "Onboarding v2".to_string();
        store.save(&updated).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Onboarding v2");
    }

    #[tokio::test]
    async fn delete_reports_whether_removed() {
        let store = WorkflowStore::new(MemoryKv::new());
        store.save(&onboarding()).await.unwrap();

        assert!(store.delete("onboarding").await.unwrap());
        assert!(!store.delete("onboarding").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_empty() {
        let kv = Arc::new(MemoryKv::new());
        kv.put_raw(WORKFLOWS_KEY, "{not json");
        let store = WorkflowStore::new(Arc::clone(&kv));

        assert!(store.list().await.unwrap().is_empty());
        store.save(&onboarding()).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let kv = Arc::new(MemoryKv::new());
        kv.fail_writes(true);
        let store = WorkflowStore::new(Arc::clone(&kv));

        let err = store.save(&onboarding()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Connection));
    }
}
