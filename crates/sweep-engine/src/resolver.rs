//! Selection resolution.
//!
//! Turns a stored [`SelectionState`] into the concrete, ordered key list a
//! job runs over. Explicit selections need no provider round trip; an
//! exclude-mode selection walks the whole result set once.

use std::collections::HashSet;

use sweep_core::{ItemKey, ResolutionError, SelectionContext, SelectionState};

use crate::providers::ResultSetProvider;

/// Pages' worth of keys reserved up front; a reported count beyond that
/// is not trusted for allocation.
const PREALLOCATED_PAGES: usize = 16;

/// Materializes selections against a [`ResultSetProvider`].
#[derive(Debug, Clone, Copy)]
pub struct SelectionResolver {
    page_size: usize,
}

impl SelectionResolver {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Resolve the effective selection.
    ///
    /// Explicit keys come back in key order. Exclude mode yields every key
    /// of the result set, in result-set order and without duplicates, minus
    /// the excluded ones.
    pub async fn resolve(
        &self,
        provider: &dyn ResultSetProvider,
        context: &SelectionContext,
        state: &SelectionState,
    ) -> Result<Vec<ItemKey>, ResolutionError> {
        if !state.exclude_mode {
            return Ok(state.selected_keys.iter().cloned().collect());
        }

        let total = provider
            .count(context)
            .await
            .map_err(|e| ResolutionError::Count(e.0))?;

        let capacity = total.min(self.page_size.saturating_mul(PREALLOCATED_PAGES));
        let mut seen: HashSet<ItemKey> = HashSet::with_capacity(capacity);
        let mut keys = Vec::with_capacity(capacity.saturating_sub(state.selected_keys.len()));
        let mut offset = 0;

        while offset < total {
            let page = provider
                .page(context, offset, self.page_size)
                .await
                .map_err(|e| ResolutionError::Page {
                    offset,
                    message: e.0,
                })?;
            if page.is_empty() {
                // Result set shrank while walking it.
                break;
            }
            offset += page.len();

            for row in page {
                if state.selected_keys.contains(&row.key) || !seen.insert(row.key.clone()) {
                    continue;
                }
                keys.push(row.key);
            }
        }

        tracing::debug!(
            "Resolved exclude-mode selection for {}: {} of {} items",
            context.key(),
            keys.len(),
            total
        );
        Ok(keys)
    }
}
