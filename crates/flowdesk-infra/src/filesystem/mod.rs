//! Filesystem helpers for Flowdesk: data directory layout and workflow files.

use std::path::{Path, PathBuf};

use flowdesk_types::workflow::Workflow;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FLOWDESK_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `FLOWDESK_DATA_DIR` environment variable
/// 2. `~/.flowdesk`
/// 3. `./.flowdesk`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".flowdesk");
    }

    PathBuf::from(".flowdesk")
}

/// Create the data directory if it does not exist yet.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(data_dir).await
}

/// Errors from reading a workflow definition file.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid workflow JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Parse a workflow definition from a JSON file.
pub async fn read_workflow_file(path: &Path) -> Result<Workflow, WorkflowFileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WorkflowFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| WorkflowFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-flowdesk");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-flowdesk"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }

    #[tokio::test]
    async fn test_ensure_data_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_data_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_read_workflow_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wf.json");
        tokio::fs::write(
            &path,
            r#"{
  "id": "intake",
  "name": "Invoice intake",
  "steps": [
    {"id": "fetch", "type": "api"},
    {"id": "extract", "type": "ai", "dependencies": ["fetch"]}
  ]
}"#,
        )
        .await
        .unwrap();

        let wf = read_workflow_file(&path).await.unwrap();
        assert_eq!(wf.id, "intake");
        assert_eq!(wf.steps.len(), 2);
        assert_eq!(wf.steps[1].dependencies, vec!["fetch"]);
    }

    #[tokio::test]
    async fn test_read_workflow_file_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            read_workflow_file(&missing).await,
            Err(WorkflowFileError::Read { .. })
        ));

        let bad = dir.path().join("bad.json");
        tokio::fs::write(&bad, "{").await.unwrap();
        assert!(matches!(
            read_workflow_file(&bad).await,
            Err(WorkflowFileError::Parse { .. })
        ));
    }
}
