//! Collaborator interfaces consumed by the engine.
//!
//! The engine never owns the item catalog, the action implementations or
//! the permission model. It reaches them through these traits, injected as
//! `Arc<dyn _>` when the engine is constructed.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeSet;

use sweep_core::{
    ActorId, ConfigValues, ExecutorError, ItemKey, ItemOutcome, ProviderError, ResultRow,
    SelectionContext,
};

/// Source of the result set a selection is made over.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSetProvider: Send + Sync {
    /// Total number of items under the context's arguments and filters.
    async fn count(&self, context: &SelectionContext) -> Result<usize, ProviderError>;

    /// An ordered window of the result set.
    async fn page(
        &self,
        context: &SelectionContext,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ResultRow>, ProviderError>;

    /// Item types the result set can contain.
    async fn item_types(&self, context: &SelectionContext)
        -> Result<BTreeSet<String>, ProviderError>;
}

/// Applies an action to a list of items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Apply the action and report one outcome per item.
    ///
    /// An `Err` means the whole call failed; the engine records it as a
    /// failure of every item passed in.
    async fn apply(
        &self,
        action_id: &str,
        config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError>;
}

/// Capability check consulted before executing on an item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    async fn can_apply(&self, actor: &ActorId, action_id: &str, key: &ItemKey) -> bool;
}

/// Oracle that grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionOracle for AllowAll {
    async fn can_apply(&self, _actor: &ActorId, _action_id: &str, _key: &ItemKey) -> bool {
        true
    }
}

// =============================================================================
// Static Result Set
// =============================================================================

/// In-memory result set over a fixed list of rows.
///
/// Understands two exposed filters:
/// - `type` - keep rows whose item type equals the value (or one of the
///   values, for an array)
/// - `search` - keep rows whose label contains the value, case-insensitive
///
/// Other filter keys are ignored.
pub struct StaticResultSet {
    rows: RwLock<Vec<ResultRow>>,
}

impl StaticResultSet {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Replace the catalog.
    pub fn set_rows(&self, rows: Vec<ResultRow>) {
        *self.rows.write() = rows;
    }

    /// Remove an item from the catalog. Returns true if it existed.
    pub fn remove(&self, key: &ItemKey) -> bool {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|row| &row.key != key);
        rows.len() != before
    }

    fn matching(&self, context: &SelectionContext) -> Vec<ResultRow> {
        self.rows
            .read()
            .iter()
            .filter(|row| matches_filters(row, context))
            .cloned()
            .collect()
    }
}

fn matches_filters(row: &ResultRow, context: &SelectionContext) -> bool {
    context.exposed_filters.iter().all(|(key, value)| match key.as_str() {
        "type" => match value {
            Value::String(t) => t.is_empty() || *t == row.item_type,
            Value::Array(types) => {
                let wanted = Some(row.item_type.as_str());
                types.is_empty() || types.iter().any(|t| t.as_str() == wanted)
            }
            _ => true,
        },
        "search" => value
            .as_str()
            .map(|needle| row.label.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(true),
        _ => true,
    })
}

#[async_trait]
impl ResultSetProvider for StaticResultSet {
    async fn count(&self, context: &SelectionContext) -> Result<usize, ProviderError> {
        Ok(self.matching(context).len())
    }

    async fn page(
        &self,
        context: &SelectionContext,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ResultRow>, ProviderError> {
        Ok(self
            .matching(context)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn item_types(
        &self,
        context: &SelectionContext,
    ) -> Result<BTreeSet<String>, ProviderError> {
        Ok(self
            .matching(context)
            .into_iter()
            .map(|row| row.item_type)
            .collect())
    }
}
