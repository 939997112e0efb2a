//! Core types for the Sweep bulk selection engine.
//!
//! This crate contains the data structures shared by the engine and its
//! drivers:
//! - Item keys and result rows
//! - Selection context, fingerprints and the durable selection state
//! - Action descriptors, presets and execution outcomes
//! - Preconfiguration forms
//! - Batch jobs
//! - Configuration types
//! - Error types

mod action;
mod config;
mod error;
mod form;
mod item;
mod job;
mod selection;

pub use action::{
    ActionDescriptor, ActionPreset, ExecutionSummary, FailureDetail, FailureKind, ItemOutcome,
};
pub use config::{
    config_dir, config_path, default_store_dir, BatchConfig, EngineConfig, SelectionConfig,
    StoreConfig,
};
pub use error::{
    ConfigError, EngineError, EngineResult, ExecutorError, ProviderError, RegistryError,
    ResolutionError, StoreError, ValidationError,
};
pub use form::{ConfigValues, FieldError, FieldKind, FormField, FormSpec, SelectOption};
pub use item::{ActorId, ItemKey, ResultRow};
pub use job::{BatchJob, BatchProgress, JobId};
pub use selection::{
    ContextFingerprint, ContextKey, ResetReason, SelectionContext, SelectionPhase, SelectionState,
};
