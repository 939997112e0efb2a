//! Selection context and durable selection state.
//!
//! A [`SelectionState`] is one record per (actor, [`ContextKey`]). The pair
//! `selected_keys` + `exclude_mode` is a compact encoding of the effective
//! selection:
//!
//! | `exclude_mode` | effective selection                         |
//! |----------------|---------------------------------------------|
//! | `false`        | exactly `selected_keys`                     |
//! | `true`         | every item in the result set except `selected_keys` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::form::ConfigValues;
use crate::item::ItemKey;
use crate::job::JobId;

// =============================================================================
// Selection Context
// =============================================================================

/// Identifies which list, and under what filter state, a request refers to.
///
/// The raw arguments and filters are passed through to the result set
/// provider; the engine only ever compares their normalized fingerprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionContext {
    /// Result-set definition.
    pub list_id: String,

    /// Display of the result-set definition.
    pub display_id: String,

    /// Optional secondary dimension (e.g. which linked entity is acted on).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_id: Option<String>,

    /// Positional arguments of the list query.
    #[serde(default)]
    pub arguments: Vec<Value>,

    /// Active exposed filter values.
    #[serde(default)]
    pub exposed_filters: Map<String, Value>,

    /// Whether the list is paged/filterable. Fixed lists never offer
    /// "select all pages".
    #[serde(default = "default_paginated")]
    pub paginated: bool,
}

fn default_paginated() -> bool {
    true
}

impl SelectionContext {
    /// Create a context for a list display with no arguments or filters.
    pub fn new(list_id: impl Into<String>, display_id: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            display_id: display_id.into(),
            relationship_id: None,
            arguments: Vec::new(),
            exposed_filters: Map::new(),
            paginated: true,
        }
    }

    pub fn with_relationship(mut self, relationship_id: impl Into<String>) -> Self {
        self.relationship_id = Some(relationship_id.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.exposed_filters.insert(key.into(), value);
        self
    }

    /// Mark the list as a fixed, unpaged list.
    pub fn fixed(mut self) -> Self {
        self.paginated = false;
        self
    }

    /// The store key for this context.
    pub fn key(&self) -> ContextKey {
        ContextKey(format!("{}:{}", self.list_id, self.display_id))
    }
}

/// Store key of a list display. Filter state is deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(pub String);

impl AsRef<str> for ContextKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized comparison key of a context's variable parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFingerprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_id: Option<String>,
    pub arguments: String,
    pub exposed_filters: String,
}

/// Why a stored selection was discarded on reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    Relationship,
    Arguments,
    ExposedFilters,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relationship => write!(f, "relationship changed"),
            Self::Arguments => write!(f, "arguments changed"),
            Self::ExposedFilters => write!(f, "filters changed"),
        }
    }
}

// =============================================================================
// Selection Phase
// =============================================================================

/// Execution phase of a selection record.
///
/// `Immediate` execution and `Done` never persist: immediate runs inside one
/// request, and a finished selection is deleted from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPhase {
    /// No action chosen; checkboxes may still change.
    #[default]
    Idle,
    /// Action and preconfiguration captured, ready to execute.
    ActionChosen,
    /// Waiting for an explicit confirmation.
    Confirming,
    /// A batch job owns this selection.
    Batching,
}

impl fmt::Display for SelectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ActionChosen => write!(f, "action_chosen"),
            Self::Confirming => write!(f, "confirming"),
            Self::Batching => write!(f, "batching"),
        }
    }
}

// =============================================================================
// Selection State
// =============================================================================

/// Durable selection record for one (actor, context).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Fingerprint the selection was made under.
    pub fingerprint: ContextFingerprint,

    /// Chosen keys, or excluded keys when `exclude_mode` is set.
    #[serde(default)]
    pub selected_keys: BTreeSet<ItemKey>,

    #[serde(default)]
    pub exclude_mode: bool,

    /// Result set size at the last render.
    #[serde(default)]
    pub total_results: usize,

    /// Keys rendered on the most recent page, in display order.
    #[serde(default)]
    pub page_keys: Vec<ItemKey>,

    /// Labels of the rows on the most recent page.
    #[serde(default)]
    pub page_labels: BTreeMap<ItemKey, String>,

    /// Display labels for keys in `selected_keys` that were seen on a page.
    #[serde(default)]
    pub key_labels: BTreeMap<ItemKey, String>,

    #[serde(default)]
    pub phase: SelectionPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,

    #[serde(default)]
    pub action_preconfiguration: ConfigValues,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_job_id: Option<JobId>,
}

impl SelectionState {
    /// Create an empty selection under the given fingerprint.
    pub fn new(fingerprint: ContextFingerprint) -> Self {
        Self {
            fingerprint,
            selected_keys: BTreeSet::new(),
            exclude_mode: false,
            total_results: 0,
            page_keys: Vec::new(),
            page_labels: BTreeMap::new(),
            key_labels: BTreeMap::new(),
            phase: SelectionPhase::Idle,
            action_id: None,
            action_label: None,
            action_preconfiguration: ConfigValues::new(),
            redirect_target: None,
            batch_job_id: None,
        }
    }

    /// Flip between explicit and exclude mode.
    ///
    /// The two interpretations of `selected_keys` are incompatible, so the
    /// key set is always emptied.
    pub fn set_exclude_mode(&mut self, exclude_mode: bool) {
        self.exclude_mode = exclude_mode;
        self.selected_keys.clear();
        self.key_labels.clear();
    }

    /// Whether the item is part of the effective selection.
    ///
    /// Only meaningful for keys that belong to the current result set.
    pub fn is_selected(&self, key: &ItemKey) -> bool {
        self.selected_keys.contains(key) != self.exclude_mode
    }

    /// Mark a rendered item as checked or unchecked.
    pub fn set_checked(&mut self, key: &ItemKey, checked: bool, label: Option<&str>) {
        // In exclude mode presence in the key set means "unchecked".
        if checked != self.exclude_mode {
            self.selected_keys.insert(key.clone());
            if let Some(label) = label {
                self.key_labels.insert(key.clone(), label.to_string());
            }
        } else {
            self.selected_keys.remove(key);
            self.key_labels.remove(key);
        }
    }

    /// Effective selection size without materializing exclude mode.
    ///
    /// In exclude mode this assumes every excluded key is still part of
    /// the result set.
    pub fn estimated_count(&self) -> usize {
        if self.exclude_mode {
            self.total_results.saturating_sub(self.selected_keys.len())
        } else {
            self.selected_keys.len()
        }
    }

    /// Whether an action has been chosen but not yet handed to execution.
    pub fn has_pending_action(&self) -> bool {
        matches!(
            self.phase,
            SelectionPhase::ActionChosen | SelectionPhase::Confirming
        )
    }
}
