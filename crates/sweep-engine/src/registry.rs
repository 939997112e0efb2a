//! Action Registry
//!
//! Stores the pluggable bulk actions and filters them for a result set.
//!
//! - [`BulkAction`] - capability interface implemented by every action
//! - [`ActionRegistry`] - actions by id; also the default [`ActionExecutor`]
//! - [`ActionRegistryAdapter`] - applicability, operator presets and
//!   preconfiguration forms

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use sweep_core::{
    ActionDescriptor, ActionPreset, ConfigValues, ExecutorError, FieldError, FormSpec, ItemKey,
    ItemOutcome, RegistryError, ValidationError,
};

use crate::providers::ActionExecutor;

/// A pluggable action that can be applied to many items at once.
#[async_trait]
pub trait BulkAction: Send + Sync {
    /// Static description used for applicability and routing.
    fn descriptor(&self) -> &ActionDescriptor;

    /// Preconfiguration form, for configurable actions.
    fn preconfig_form(&self) -> Option<FormSpec> {
        None
    }

    /// Validate submitted configuration values.
    ///
    /// Defaults to validating against [`preconfig_form`](Self::preconfig_form);
    /// actions without a form accept their input as is.
    fn validate_preconfig(
        &self,
        submitted: &ConfigValues,
    ) -> Result<ConfigValues, Vec<FieldError>> {
        match self.preconfig_form() {
            Some(form) => form.validate(submitted),
            None => Ok(submitted.clone()),
        }
    }

    /// Apply the action, reporting one outcome per key.
    async fn apply(
        &self,
        config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError>;
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of bulk actions by id.
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<dyn BulkAction>>>,
}

impl ActionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
        }
    }

    /// Register an action.
    ///
    /// Returns an error if an action with the same id already exists.
    pub fn register(&self, action: Arc<dyn BulkAction>) -> Result<(), RegistryError> {
        let id = action.descriptor().id.clone();
        let mut actions = self.actions.write();
        if actions.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        actions.insert(id.clone(), action);
        tracing::info!("Registered bulk action: {}", id);
        Ok(())
    }

    /// Get an action by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn BulkAction>> {
        self.actions.read().get(id).cloned()
    }

    /// Execute a function with access to an action.
    pub fn with_action<F, R>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&dyn BulkAction) -> R,
    {
        let actions = self.actions.read();
        actions.get(id).map(|action| f(action.as_ref()))
    }

    /// All descriptors in natural order: weight, then id.
    pub fn definitions(&self) -> Vec<ActionDescriptor> {
        let mut definitions: Vec<ActionDescriptor> = self
            .actions
            .read()
            .values()
            .map(|action| action.descriptor().clone())
            .collect();
        definitions.sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.id.cmp(&b.id)));
        definitions
    }

    /// Get the count of registered actions.
    pub fn count(&self) -> usize {
        self.actions.read().len()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for ActionRegistry {
    async fn apply(
        &self,
        action_id: &str,
        config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError> {
        // Clone out of the lock; actions may take their time.
        let action = self
            .get(action_id)
            .ok_or_else(|| ExecutorError::ActionNotFound(action_id.to_string()))?;
        action.apply(config, keys).await
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// An action as offered for one result set, with operator overrides applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicableAction {
    pub id: String,
    pub label: String,
    pub weight: i32,
    pub is_configurable: bool,
    pub needs_confirmation: bool,
}

/// Applicability filter and preconfiguration manager over an [`ActionRegistry`].
pub struct ActionRegistryAdapter {
    registry: Arc<ActionRegistry>,
    presets: Vec<ActionPreset>,
}

impl ActionRegistryAdapter {
    pub fn new(registry: Arc<ActionRegistry>, presets: Vec<ActionPreset>) -> Self {
        Self { registry, presets }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    fn preset(&self, action_id: &str) -> Option<&ActionPreset> {
        self.presets.iter().find(|p| p.id == action_id)
    }

    /// Actions applicable to a result set containing `item_types`.
    ///
    /// With presets configured, only preset actions are offered, ordered by
    /// preset weight, then by their position in the preset list. The
    /// registry's own weight only orders actions without presets.
    pub fn list_applicable(&self, item_types: &BTreeSet<String>) -> Vec<ApplicableAction> {
        let mut offered: Vec<((i32, usize), ApplicableAction)> = self
            .registry
            .definitions()
            .into_iter()
            .filter(|descriptor| descriptor.applies_to(item_types))
            .filter_map(|descriptor| {
                let position = self.presets.iter().position(|p| p.id == descriptor.id);
                if !self.presets.is_empty() && position.is_none() {
                    return None;
                }
                let preset = position.map(|i| &self.presets[i]);
                let order = (
                    preset.and_then(|p| p.weight).unwrap_or(0),
                    position.unwrap_or(0),
                );
                Some((order, offer(&descriptor, preset)))
            })
            .collect();

        offered.sort_by(|(oa, a), (ob, b)| {
            oa.cmp(ob)
                .then_with(|| a.weight.cmp(&b.weight))
                .then_with(|| a.id.cmp(&b.id))
        });
        offered.into_iter().map(|(_, action)| action).collect()
    }

    /// The applicable action with this id, if any.
    pub fn find_applicable(
        &self,
        action_id: &str,
        item_types: &BTreeSet<String>,
    ) -> Option<ApplicableAction> {
        self.list_applicable(item_types)
            .into_iter()
            .find(|action| action.id == action_id)
    }

    /// Preconfiguration form pre-filled with preset defaults overlaid by
    /// `existing`. `None` for unknown or unconfigurable actions.
    pub fn build_preconfig_form(
        &self,
        action_id: &str,
        existing: &ConfigValues,
    ) -> Option<FormSpec> {
        let form = self.registry.with_action(action_id, |action| action.preconfig_form())??;
        Some(form.prefilled(&self.with_preset_defaults(action_id, existing)))
    }

    /// Validate submitted values, with preset defaults filling the gaps.
    pub fn validate_preconfig(
        &self,
        action_id: &str,
        submitted: &ConfigValues,
    ) -> Result<ConfigValues, ValidationError> {
        let merged = self.with_preset_defaults(action_id, submitted);
        self.registry
            .with_action(action_id, |action| action.validate_preconfig(&merged))
            .ok_or_else(|| ValidationError::ActionNotApplicable(action_id.to_string()))?
            .map_err(|errors| {
                tracing::debug!(
                    "Preconfiguration of {} rejected: {} errors",
                    action_id,
                    errors.len()
                );
                ValidationError::Preconfiguration(errors)
            })
    }

    fn with_preset_defaults(&self, action_id: &str, values: &ConfigValues) -> ConfigValues {
        let mut merged = self
            .preset(action_id)
            .map(|p| p.preconfiguration.clone())
            .unwrap_or_default();
        for (key, value) in values {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

fn offer(descriptor: &ActionDescriptor, preset: Option<&ActionPreset>) -> ApplicableAction {
    ApplicableAction {
        id: descriptor.id.clone(),
        label: preset
            .and_then(|p| p.label.clone())
            .unwrap_or_else(|| descriptor.label.clone()),
        weight: descriptor.weight,
        is_configurable: descriptor.is_configurable,
        needs_confirmation: descriptor.needs_confirmation()
            || preset.map(|p| p.confirmation_required).unwrap_or(false),
    }
}
