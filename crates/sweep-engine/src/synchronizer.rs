//! Selection Synchronizer
//!
//! Reconciles the checkbox state of one rendered page with the stored
//! selection. All functions here are pure over [`SelectionState`]; loading
//! and saving the record is the engine's job.
//!
//! ## Submission rules
//!
//! ```text
//! select_all == exclude_mode ?
//!        │
//!   ┌────┴────┐
//!   no        yes
//!   │         │
//!   ▼         │
//! flip mode   │
//! clear keys  │
//!   │         │
//!   └────┬────┘
//!        ▼
//! for each key rendered on the page:
//!   checked   → include it
//!   unchecked → exclude it
//! (include/exclude as interpreted by exclude_mode)
//! ```
//!
//! A pending action choice survives submissions; only execution or
//! clearing the selection ends it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use sweep_core::{ItemKey, ResetReason, ResultRow, SelectionContext, SelectionPhase, SelectionState};

use crate::fingerprint::ContextNormalizer;

/// Stored selection after reconciliation with the current request.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub state: SelectionState,
    /// Set when a stored selection was discarded.
    pub reset: Option<ResetReason>,
}

/// What a page submission did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionEffect {
    /// The select-all toggle flipped the mode.
    pub flipped: bool,
    /// Checked keys that were not rendered on the page.
    pub ignored_keys: usize,
}

/// Checkbox state of one rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCheckbox {
    pub key: ItemKey,
    pub label: String,
    pub checked: bool,
}

/// View model of the bulk selection widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionWidget {
    pub rows: Vec<RowCheckbox>,
    /// Whether the "select all pages" toggle is offered at all.
    pub select_all_available: bool,
    pub select_all: bool,
    /// Effective number of selected items.
    pub selected_count: usize,
    /// Whether `selected_count` was computed by materializing the selection.
    pub count_exact: bool,
    pub total_results: usize,
    /// Labels of chosen (or, in exclude mode, excluded) items.
    pub summary_labels: Vec<String>,
    /// Set when the stored selection was cleared because the list changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<ResetReason>,
    pub phase: SelectionPhase,
}

/// Reconciles page state with stored selections.
#[derive(Debug, Clone)]
pub struct SelectionSynchronizer {
    normalizer: ContextNormalizer,
}

impl SelectionSynchronizer {
    pub fn new(normalizer: ContextNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &ContextNormalizer {
        &self.normalizer
    }

    /// Validate a stored selection against the current context.
    ///
    /// Creates a fresh selection when none is stored, and replaces one made
    /// under a different context. A selection owned by a running batch is
    /// kept as is: the batch works from its own snapshot, and only
    /// clearing the selection may release it.
    pub fn reconcile(
        &self,
        stored: Option<SelectionState>,
        context: &SelectionContext,
    ) -> Reconciled {
        let current = self.normalizer.fingerprint(context);

        let Some(mut state) = stored else {
            return Reconciled {
                state: SelectionState::new(current),
                reset: None,
            };
        };

        match self.normalizer.mismatch(&state.fingerprint, &current) {
            None => {
                // Ignored filter keys may still differ; keep the latest.
                state.fingerprint = current;
                Reconciled { state, reset: None }
            }
            Some(reason) if state.phase == SelectionPhase::Batching => {
                tracing::debug!(
                    "Context {} changed ({}) while batching, keeping selection",
                    context.key(),
                    reason
                );
                Reconciled { state, reset: None }
            }
            Some(reason) => {
                tracing::info!("Selection for {} reset: {}", context.key(), reason);
                Reconciled {
                    state: SelectionState::new(current),
                    reset: Some(reason),
                }
            }
        }
    }

    /// Remember the freshly rendered page and result set size.
    pub fn record_page(
        &self,
        state: &mut SelectionState,
        total_results: usize,
        page: &[ResultRow],
    ) {
        state.total_results = total_results;
        state.page_keys = page.iter().map(|row| row.key.clone()).collect();
        state.page_labels = page
            .iter()
            .map(|row| (row.key.clone(), row.label.clone()))
            .collect();

        for row in page {
            if state.selected_keys.contains(&row.key) {
                state.key_labels.insert(row.key.clone(), row.label.clone());
            }
        }
    }

    /// Apply the checkboxes submitted from the last rendered page.
    ///
    /// Only keys rendered on that page are considered; anything else in
    /// `checked` is ignored. When the toggle flips the mode, the page's
    /// checkboxes are applied on top of the emptied key set.
    pub fn apply_submission(
        &self,
        state: &mut SelectionState,
        context: &SelectionContext,
        checked: &[ItemKey],
        select_all: bool,
    ) -> SubmissionEffect {
        let mut effect = SubmissionEffect::default();

        // Fixed lists have no "select all pages": exclude mode stays off.
        let select_all = context.paginated && select_all;

        if select_all != state.exclude_mode {
            tracing::debug!("Select-all toggled to {} for {}", select_all, context.key());
            state.set_exclude_mode(select_all);
            effect.flipped = true;
        }

        let checked: HashSet<&ItemKey> = checked.iter().collect();
        effect.ignored_keys = checked
            .iter()
            .filter(|key| !state.page_labels.contains_key(**key))
            .count();
        if effect.ignored_keys > 0 {
            tracing::warn!(
                "Ignoring {} checked keys not rendered on the current page",
                effect.ignored_keys
            );
        }

        let page_keys = std::mem::take(&mut state.page_keys);
        for key in &page_keys {
            let label = state.page_labels.get(key).cloned();
            state.set_checked(key, checked.contains(key), label.as_deref());
        }
        state.page_keys = page_keys;

        effect
    }

    /// Build the widget view model for a rendered page.
    ///
    /// `exact_count` is the materialized selection size when the caller
    /// resolved it; otherwise the count is estimated from the stored state.
    pub fn widget(
        &self,
        state: &SelectionState,
        context: &SelectionContext,
        page: &[ResultRow],
        exact_count: Option<usize>,
        label_limit: usize,
        reset: Option<ResetReason>,
    ) -> SelectionWidget {
        let rows = page
            .iter()
            .map(|row| RowCheckbox {
                key: row.key.clone(),
                label: row.label.clone(),
                checked: state.is_selected(&row.key),
            })
            .collect();

        SelectionWidget {
            rows,
            select_all_available: context.paginated,
            select_all: state.exclude_mode,
            selected_count: exact_count.unwrap_or_else(|| state.estimated_count()),
            count_exact: exact_count.is_some() || !state.exclude_mode,
            total_results: state.total_results,
            summary_labels: summary_labels(state, label_limit),
            reset,
            phase: state.phase,
        }
    }
}

/// Labels of the keys in the selection record, capped at `limit`.
pub fn summary_labels(state: &SelectionState, limit: usize) -> Vec<String> {
    state
        .selected_keys
        .iter()
        .take(limit)
        .map(|key| {
            state
                .key_labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| key.to_string())
        })
        .collect()
}
