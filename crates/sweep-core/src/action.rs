//! Action-related types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::form::ConfigValues;
use crate::item::ItemKey;

/// Static description of a pluggable bulk action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Unique identifier for the action.
    pub id: String,

    /// Display text in the action list.
    pub label: String,

    /// Item types this action can be applied to.
    #[serde(default)]
    pub applies_to_types: BTreeSet<String>,

    /// Applies to any item type regardless of `applies_to_types`.
    #[serde(default)]
    pub type_agnostic: bool,

    /// Whether the action needs preconfiguration values.
    #[serde(default)]
    pub is_configurable: bool,

    /// Whether the action ships its own confirmation step.
    #[serde(default)]
    pub has_builtin_confirmation: bool,

    /// Operator override forcing a confirmation step.
    #[serde(default)]
    pub confirmation_required: bool,

    /// Ordering weight; lighter sorts first.
    #[serde(default)]
    pub weight: i32,
}

impl ActionDescriptor {
    /// Create a descriptor for an action with no type restrictions set yet.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            applies_to_types: BTreeSet::new(),
            type_agnostic: false,
            is_configurable: false,
            has_builtin_confirmation: false,
            confirmation_required: false,
            weight: 0,
        }
    }

    pub fn for_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applies_to_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn any_type(mut self) -> Self {
        self.type_agnostic = true;
        self
    }

    pub fn configurable(mut self) -> Self {
        self.is_configurable = true;
        self
    }

    pub fn with_confirmation(mut self) -> Self {
        self.has_builtin_confirmation = true;
        self
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Check whether the action applies to a result set with these item types.
    pub fn applies_to(&self, item_types: &BTreeSet<String>) -> bool {
        self.type_agnostic || !self.applies_to_types.is_disjoint(item_types)
    }

    /// Whether execution must pass through a confirmation step.
    pub fn needs_confirmation(&self) -> bool {
        self.has_builtin_confirmation || self.confirmation_required
    }
}

/// Operator-curated entry for an action.
///
/// When any preset is configured, only preset actions are offered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPreset {
    /// Registry id of the action.
    pub id: String,

    /// Label override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Weight override; takes precedence over the registry weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,

    #[serde(default)]
    pub confirmation_required: bool,

    /// Default preconfiguration values. Submitted values win.
    #[serde(default)]
    pub preconfiguration: ConfigValues,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Per-item result reported by an executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub key: ItemKey,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn success(key: ItemKey) -> Self {
        Self {
            key,
            ok: true,
            error: None,
        }
    }

    pub fn failure(key: ItemKey, error: impl Into<String>) -> Self {
        Self {
            key,
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Category of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The action itself failed for the item.
    Execution,
    /// The actor may not apply the action to the item.
    PermissionDenied,
    /// The executor reported nothing for the item.
    MissingOutcome,
}

/// Retained detail of one failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub key: ItemKey,
    pub kind: FailureKind,
    pub message: String,
}

/// Final result of an immediate or batch execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub action_id: String,
    pub action_label: String,
    pub success_count: usize,
    /// Exact, even when `failures` was truncated.
    pub failure_count: usize,
    pub failures: Vec<FailureDetail>,
    /// Whether some failure details were dropped at the retention cap.
    pub failures_truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
}

impl ExecutionSummary {
    /// Total number of processed items.
    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count
    }
}
