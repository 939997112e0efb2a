//! Request and response types of the engine facade.

use serde::{Deserialize, Serialize};

use sweep_core::{BatchProgress, ConfigValues, ExecutionSummary, FormSpec, JobId, ResetReason};

/// Acknowledgement of a page submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Effective selection size after the submission (estimated in
    /// exclude mode).
    pub selected_count: usize,
    pub exclude_mode: bool,
    /// The select-all toggle flipped the mode before the page's
    /// checkboxes were applied.
    pub flipped: bool,
    /// Checked keys that were not rendered on the page.
    pub ignored_keys: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<ResetReason>,
}

/// An action choice submitted by the actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_id: String,

    /// Raw preconfiguration values. `None` asks for the form of a
    /// configurable action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigValues>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
}

impl ActionRequest {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            config: None,
            redirect_target: None,
        }
    }

    pub fn with_config(mut self, config: ConfigValues) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect_target = Some(target.into());
        self
    }
}

/// What the actor has to do after choosing an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChooseOutcome {
    /// Fill in this form and choose again with its values.
    NeedsPreconfigForm { form: FormSpec },
    /// Show the confirmation view, then confirm.
    NeedsConfirmation,
    /// Execution may start.
    Ready,
}

/// Data for the confirmation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationView {
    pub action_id: String,
    pub action_label: String,
    pub selected_count: usize,
    pub exclude_mode: bool,
    /// Chosen items, or excluded items in exclude mode.
    pub summary_labels: Vec<String>,
}

/// How execution started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionStarted {
    /// Ran within the request.
    Completed { summary: ExecutionSummary },
    /// Handed to a batch job; drive it with `run_batch_step`.
    Batch { job_id: JobId },
}

/// Result of one batch step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStepReport {
    pub done: bool,
    pub progress: BatchProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ExecutionSummary>,
}
