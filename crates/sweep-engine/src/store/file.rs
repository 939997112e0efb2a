//! File-backed store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/
//! ├── selections/<digest(actor)>--<digest(context key)>.json
//! └── jobs/<job id>.json
//! ```
//!
//! Records are written to a temporary sibling and renamed into place, so a
//! reader sees either the old or the new record.

use async_trait::async_trait;
use uuid::Uuid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sweep_core::{ActorId, BatchJob, ContextKey, JobId, SelectionState, StoreError};

use super::SelectionStore;

/// Counter for unique temporary file names within this process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Selection store persisting JSON records in a directory.
#[derive(Debug, Clone)]
pub struct FileSelectionStore {
    root: PathBuf,
}

impl FileSelectionStore {
    /// Open (and create, if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in [root.join("selections"), root.join("jobs")] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| io_error(&dir, e))?;
        }
        tracing::debug!("Opened selection store at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn selection_path(&self, actor: &ActorId, key: &ContextKey) -> PathBuf {
        self.root.join("selections").join(format!(
            "{}--{}.json",
            digest(actor.0.as_bytes()),
            digest(key.0.as_bytes())
        ))
    }

    fn job_path(&self, id: JobId) -> PathBuf {
        self.root.join("jobs").join(format!("{}.json", id))
    }
}

/// Fixed-length, path-safe name for an arbitrary actor or list id.
fn digest(bytes: &[u8]) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, bytes).simple().to_string()
}

fn io_error(path: &Path, error: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value)?;
    let tmp = path.with_extension(format!(
        "{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(path, e));
    }
    Ok(())
}

async fn remove(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

#[async_trait]
impl SelectionStore for FileSelectionStore {
    async fn get(
        &self,
        actor: &ActorId,
        key: &ContextKey,
    ) -> Result<Option<SelectionState>, StoreError> {
        read_json(&self.selection_path(actor, key)).await
    }

    async fn put(
        &self,
        actor: &ActorId,
        key: &ContextKey,
        state: &SelectionState,
    ) -> Result<(), StoreError> {
        write_json(&self.selection_path(actor, key), state).await
    }

    async fn delete(&self, actor: &ActorId, key: &ContextKey) -> Result<(), StoreError> {
        remove(&self.selection_path(actor, key)).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<BatchJob>, StoreError> {
        read_json(&self.job_path(id)).await
    }

    async fn put_job(&self, job: &BatchJob) -> Result<(), StoreError> {
        write_json(&self.job_path(job.id), job).await
    }

    async fn delete_job(&self, id: JobId) -> Result<(), StoreError> {
        remove(&self.job_path(id)).await
    }
}
