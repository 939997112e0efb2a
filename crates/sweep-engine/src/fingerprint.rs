//! Exposed-Context Normalizer
//!
//! Canonicalizes the variable parts of a [`SelectionContext`] into
//! comparison strings. Fingerprints are compared, never looked up, so they
//! are kept verbatim as canonical JSON rather than hashed.
//!
//! Arguments are positional: their order is significant and only nested
//! object keys are sorted. Exposed filters are a keyed bag of values:
//! - keys are sorted
//! - array values are sorted and deduplicated (multi-value filters)
//! - empty values (null, "", [] or {}) are dropped, so clearing a filter
//!   matches never setting it
//! - pager and sort keys are ignored

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use sweep_core::{ContextFingerprint, ResetReason, SelectionConfig, SelectionContext};

/// Builds and compares context fingerprints.
#[derive(Debug, Clone)]
pub struct ContextNormalizer {
    ignored_filter_keys: BTreeSet<String>,
    clear_on_filter_change: bool,
}

impl ContextNormalizer {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            ignored_filter_keys: config.ignored_filter_keys.iter().cloned().collect(),
            clear_on_filter_change: config.clear_on_filter_change,
        }
    }

    /// Normalize raw arguments and filters into
    /// `(arguments_fingerprint, exposed_filter_fingerprint)`.
    pub fn normalize(
        &self,
        arguments: &[Value],
        exposed_filters: &Map<String, Value>,
    ) -> (String, String) {
        let arguments = Value::Array(
            arguments
                .iter()
                .map(|arg| canonicalize(arg, false).unwrap_or(Value::Null))
                .collect(),
        );

        let mut keys: Vec<&String> = exposed_filters
            .keys()
            .filter(|k| !self.ignored_filter_keys.contains(*k))
            .collect();
        keys.sort();

        let mut filters = Map::new();
        for key in keys {
            if let Some(value) = canonicalize(&exposed_filters[key], true) {
                filters.insert(key.clone(), value);
            }
        }

        (arguments.to_string(), Value::Object(filters).to_string())
    }

    /// Fingerprint of a context.
    pub fn fingerprint(&self, context: &SelectionContext) -> ContextFingerprint {
        let (arguments, exposed_filters) =
            self.normalize(&context.arguments, &context.exposed_filters);
        ContextFingerprint {
            relationship_id: context.relationship_id.clone(),
            arguments,
            exposed_filters,
        }
    }

    /// Why a selection made under `stored` must not be reused under
    /// `current`, or `None` if it may.
    ///
    /// Filter changes only count when the operator enabled
    /// `clear_on_filter_change`.
    pub fn mismatch(
        &self,
        stored: &ContextFingerprint,
        current: &ContextFingerprint,
    ) -> Option<ResetReason> {
        if stored.relationship_id != current.relationship_id {
            Some(ResetReason::Relationship)
        } else if stored.arguments != current.arguments {
            Some(ResetReason::Arguments)
        } else if self.clear_on_filter_change && stored.exposed_filters != current.exposed_filters {
            Some(ResetReason::ExposedFilters)
        } else {
            None
        }
    }
}

/// Canonical form of a value, or `None` if it is empty.
fn canonicalize(value: &Value, sort_arrays: bool) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let mut items: Vec<Value> = items
                .iter()
                .filter_map(|item| canonicalize(item, sort_arrays))
                .collect();
            if sort_arrays {
                items.sort_by_cached_key(|item| item.to_string());
                items.dedup();
            }
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                if let Some(v) = canonicalize(&map[key], sort_arrays) {
                    out.insert(key.clone(), v);
                }
            }
            (!out.is_empty()).then_some(Value::Object(out))
        }
        other => Some(other.clone()),
    }
}
