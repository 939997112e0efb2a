//! Bulk selection and batch action execution engine.
//!
//! This crate provides:
//! - Durable per-actor selections with "select all but a few" semantics
//! - Context fingerprints that reset selections when the list changes
//! - Pluggable bulk actions filtered by item type, with operator presets
//! - Immediate, confirm-first and chunked batch execution
//! - A facade exposing the controller operations of the flow

pub mod batch;
pub mod engine;
pub mod fingerprint;
pub mod providers;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod store;
pub mod synchronizer;

// Re-export commonly used types
pub use batch::BatchProcessor;
pub use engine::{
    ActionRequest, BatchStepReport, BulkEngine, ChooseOutcome, ConfirmationView,
    ExecutionStarted, SubmitAck,
};
pub use fingerprint::ContextNormalizer;
pub use providers::{ActionExecutor, AllowAll, PermissionOracle, ResultSetProvider, StaticResultSet};
pub use registry::{ActionRegistry, ActionRegistryAdapter, ApplicableAction, BulkAction};
pub use resolver::SelectionResolver;
pub use router::{ExecutionPath, ExecutionRouter};
pub use store::{FileSelectionStore, MemorySelectionStore, SelectionStore};
pub use synchronizer::{RowCheckbox, SelectionSynchronizer, SelectionWidget, SubmissionEffect};

// Re-export sweep_core for convenience
pub use sweep_core;
