//! In-process store.
//!
//! Not durable across restarts; meant for tests and single-process drivers
//! that persist elsewhere.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use sweep_core::{ActorId, BatchJob, ContextKey, JobId, SelectionState, StoreError};

use super::SelectionStore;

/// Selection store backed by hash maps.
#[derive(Default)]
pub struct MemorySelectionStore {
    selections: RwLock<HashMap<(ActorId, ContextKey), SelectionState>>,
    jobs: RwLock<HashMap<JobId, BatchJob>>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored selection records.
    pub fn selection_count(&self) -> usize {
        self.selections.read().len()
    }

    /// Number of stored batch jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }
}

#[async_trait]
impl SelectionStore for MemorySelectionStore {
    async fn get(
        &self,
        actor: &ActorId,
        key: &ContextKey,
    ) -> Result<Option<SelectionState>, StoreError> {
        let selections = self.selections.read();
        Ok(selections.get(&(actor.clone(), key.clone())).cloned())
    }

    async fn put(
        &self,
        actor: &ActorId,
        key: &ContextKey,
        state: &SelectionState,
    ) -> Result<(), StoreError> {
        let mut selections = self.selections.write();
        selections.insert((actor.clone(), key.clone()), state.clone());
        Ok(())
    }

    async fn delete(&self, actor: &ActorId, key: &ContextKey) -> Result<(), StoreError> {
        let mut selections = self.selections.write();
        selections.remove(&(actor.clone(), key.clone()));
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<BatchJob>, StoreError> {
        Ok(self.jobs.read().get(&id).cloned())
    }

    async fn put_job(&self, job: &BatchJob) -> Result<(), StoreError> {
        self.jobs.write().insert(job.id, job.clone());
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), StoreError> {
        self.jobs.write().remove(&id);
        Ok(())
    }
}
