//! Execution Router
//!
//! Picks how a chosen action runs over a resolved selection.
//!
//! ```text
//!             needs confirmation, not yet confirmed?
//!                  │yes                 │no
//!                  ▼                    ▼
//!               Confirm       force || len > threshold?
//!                                │yes            │no
//!                                ▼               ▼
//!                              Batch         Immediate
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use sweep_core::BatchConfig;

use crate::registry::ApplicableAction;

/// Execution strategy for a chosen action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    /// Run inside the current request.
    Immediate,
    /// Stop and wait for an explicit confirmation.
    Confirm,
    /// Snapshot the selection and hand it to the batch processor.
    Batch,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Confirm => write!(f, "confirm"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Routing policy derived from the batch configuration.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRouter {
    force_batch: bool,
    threshold: usize,
}

impl ExecutionRouter {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            force_batch: config.force,
            threshold: config.threshold,
        }
    }

    /// Whether execution of `action` must wait for an explicit confirmation.
    pub fn requires_confirmation(&self, action: &ApplicableAction) -> bool {
        action.needs_confirmation
    }

    /// Route an action over a selection of `selection_len` items.
    pub fn plan(
        &self,
        action: &ApplicableAction,
        selection_len: usize,
        confirmed: bool,
    ) -> ExecutionPath {
        if self.requires_confirmation(action) && !confirmed {
            ExecutionPath::Confirm
        } else if self.force_batch || selection_len > self.threshold {
            ExecutionPath::Batch
        } else {
            ExecutionPath::Immediate
        }
    }
}
