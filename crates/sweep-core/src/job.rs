//! Batch job record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use uuid::Uuid;

use crate::action::{ExecutionSummary, FailureDetail};
use crate::form::ConfigValues;
use crate::item::{ActorId, ItemKey};
use crate::selection::ContextKey;

/// Identifier of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Progress of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub cursor: usize,
    pub total: usize,
}

/// Execution-time record of a chunked run over a resolved selection.
///
/// `cursor` only ever moves forward; everything before it has been
/// dispatched exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    pub actor_id: ActorId,
    pub context_key: ContextKey,
    pub action_id: String,
    pub action_label: String,
    #[serde(default)]
    pub config: ConfigValues,

    /// Fully resolved, ordered item keys.
    pub selection_snapshot: Vec<ItemKey>,
    pub chunk_size: usize,
    pub cursor: usize,
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(default)]
    pub failure_details: Vec<FailureDetail>,
    pub failure_detail_cap: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
}

impl BatchJob {
    /// Create a job positioned at the start of the snapshot.
    ///
    /// A zero chunk size is treated as one.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actor_id: ActorId,
        context_key: ContextKey,
        action_id: impl Into<String>,
        action_label: impl Into<String>,
        config: ConfigValues,
        selection_snapshot: Vec<ItemKey>,
        chunk_size: usize,
        failure_detail_cap: usize,
    ) -> Self {
        Self {
            id: JobId::new(),
            actor_id,
            context_key,
            action_id: action_id.into(),
            action_label: action_label.into(),
            config,
            selection_snapshot,
            chunk_size: chunk_size.max(1),
            cursor: 0,
            success_count: 0,
            failure_count: 0,
            failure_details: Vec::new(),
            failure_detail_cap,
            redirect_target: None,
        }
    }

    pub fn with_redirect(mut self, redirect_target: Option<String>) -> Self {
        self.redirect_target = redirect_target;
        self
    }

    pub fn total(&self) -> usize {
        self.selection_snapshot.len()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.total()
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            cursor: self.cursor,
            total: self.total(),
        }
    }

    /// Index range of the next unprocessed chunk, if any.
    pub fn next_chunk(&self) -> Option<Range<usize>> {
        if self.is_finished() {
            return None;
        }
        let end = (self.cursor + self.chunk_size).min(self.total());
        Some(self.cursor..end)
    }

    /// Record a successful item.
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    /// Record a failed item. Details beyond the cap are dropped; the
    /// count stays exact.
    pub fn record_failure(&mut self, detail: FailureDetail) {
        self.failure_count += 1;
        if self.failure_details.len() < self.failure_detail_cap {
            self.failure_details.push(detail);
        }
    }

    /// Summary of the run so far.
    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            action_id: self.action_id.clone(),
            action_label: self.action_label.clone(),
            success_count: self.success_count,
            failure_count: self.failure_count,
            failures: self.failure_details.clone(),
            failures_truncated: self.failure_count > self.failure_details.len(),
            redirect_target: self.redirect_target.clone(),
        }
    }
}
