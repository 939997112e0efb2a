//! Item keys and result rows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, opaque key of one item in a result set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(pub String);

impl From<String> for ItemKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ItemKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the actor (user) a selection belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of a result set page as reported by the provider.
///
/// Everything the engine selects and acts upon is identified by `key`;
/// `label` is only used for display and `item_type` for action filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Stable key of the underlying item.
    pub key: ItemKey,

    /// Human-readable label.
    pub label: String,

    /// Item type identifier, e.g. "node" or "user".
    pub item_type: String,
}

impl ResultRow {
    /// Create a new row.
    pub fn new(
        key: impl Into<ItemKey>,
        label: impl Into<String>,
        item_type: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            item_type: item_type.into(),
        }
    }
}
