//! Batch Processor
//!
//! One step takes a [`BatchJob`], processes the next chunk of its snapshot
//! and returns the advanced job. The caller persists the result; a job
//! whose cursor has moved past a range never processes that range again.
//!
//! Per chunk:
//! 1. permission checks for every key, issued concurrently
//! 2. one executor call for the permitted keys
//! 3. outcomes folded into the counters; keys the executor did not report
//!    count as failures

use futures::future::join_all;
use std::collections::HashMap;

use sweep_core::{ActorId, BatchJob, FailureDetail, FailureKind, ItemKey, ItemOutcome};

use crate::providers::{ActionExecutor, PermissionOracle};

/// Drives batch jobs one chunk at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchProcessor;

impl BatchProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Process the next chunk of `job`.
    ///
    /// A finished job is returned unchanged. Item failures, including a
    /// failing executor call, are recorded on the job and never abort it.
    pub async fn step(
        &self,
        mut job: BatchJob,
        executor: &dyn ActionExecutor,
        oracle: &dyn PermissionOracle,
    ) -> BatchJob {
        let Some(range) = job.next_chunk() else {
            return job;
        };
        let chunk: Vec<ItemKey> = job.selection_snapshot[range.clone()].to_vec();

        let permitted = check_permissions(oracle, &job.actor_id, &job.action_id, &chunk).await;
        let mut allowed = Vec::with_capacity(chunk.len());
        for (key, ok) in chunk.iter().zip(permitted) {
            if ok {
                allowed.push(key.clone());
            } else {
                tracing::debug!("{} may not apply {} to {}", job.actor_id, job.action_id, key);
                job.record_failure(FailureDetail {
                    key: key.clone(),
                    kind: FailureKind::PermissionDenied,
                    message: "Permission denied".to_string(),
                });
            }
        }

        if !allowed.is_empty() {
            match executor.apply(&job.action_id, &job.config, &allowed).await {
                Ok(outcomes) => record_outcomes(&mut job, &allowed, outcomes),
                Err(e) => {
                    tracing::warn!(
                        "Action {} failed for a chunk of {} items: {}",
                        job.action_id,
                        allowed.len(),
                        e
                    );
                    for key in &allowed {
                        job.record_failure(FailureDetail {
                            key: key.clone(),
                            kind: FailureKind::Execution,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        job.cursor = range.end;
        tracing::debug!(
            "Job {} processed {}..{} of {}",
            job.id,
            range.start,
            range.end,
            job.total()
        );
        job
    }
}

async fn check_permissions(
    oracle: &dyn PermissionOracle,
    actor: &ActorId,
    action_id: &str,
    keys: &[ItemKey],
) -> Vec<bool> {
    join_all(keys.iter().map(|key| oracle.can_apply(actor, action_id, key))).await
}

/// Fold executor outcomes for `sent` into the job counters.
///
/// Each sent key is counted exactly once: reported outcomes for keys that
/// were not sent are ignored, and sent keys without an outcome fail.
fn record_outcomes(job: &mut BatchJob, sent: &[ItemKey], outcomes: Vec<ItemOutcome>) {
    let mut by_key: HashMap<ItemKey, ItemOutcome> = HashMap::with_capacity(outcomes.len());
    for outcome in outcomes {
        by_key.entry(outcome.key.clone()).or_insert(outcome);
    }

    for key in sent {
        match by_key.remove(key) {
            Some(outcome) if outcome.ok => job.record_success(),
            Some(outcome) => {
                let message = outcome.error.unwrap_or_else(|| "Failed".to_string());
                tracing::debug!("Action {} failed on {}: {}", job.action_id, key, message);
                job.record_failure(FailureDetail {
                    key: key.clone(),
                    kind: FailureKind::Execution,
                    message,
                });
            }
            None => job.record_failure(FailureDetail {
                key: key.clone(),
                kind: FailureKind::MissingOutcome,
                message: "No outcome reported".to_string(),
            }),
        }
    }
}
