//! Selection Store
//!
//! Durable key/value persistence of selection records, keyed by
//! (actor, context key), plus batch job records keyed by job id.
//!
//! Writes are last-write-wins. Two tabs editing the same list may leave a
//! stale selection behind, never a corrupt one: every record is replaced
//! as a whole.

use async_trait::async_trait;

use sweep_core::{ActorId, BatchJob, ContextKey, JobId, SelectionState, StoreError};

mod file;
mod memory;

pub use file::FileSelectionStore;
pub use memory::MemorySelectionStore;

/// Persistence of selection state and batch jobs across requests.
#[async_trait]
pub trait SelectionStore: Send + Sync {
    async fn get(
        &self,
        actor: &ActorId,
        key: &ContextKey,
    ) -> Result<Option<SelectionState>, StoreError>;

    async fn put(
        &self,
        actor: &ActorId,
        key: &ContextKey,
        state: &SelectionState,
    ) -> Result<(), StoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, actor: &ActorId, key: &ContextKey) -> Result<(), StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<BatchJob>, StoreError>;

    async fn put_job(&self, job: &BatchJob) -> Result<(), StoreError>;

    /// Delete a job. Deleting a missing job is not an error.
    async fn delete_job(&self, id: JobId) -> Result<(), StoreError>;
}
