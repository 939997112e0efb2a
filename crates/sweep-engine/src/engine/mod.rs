//! Bulk Engine
//!
//! The BulkEngine exposes the controller operations of the bulk selection
//! flow. Every operation is a self-contained request: state is loaded from
//! the [`SelectionStore`], changed, and written back.
//!
//! ## Request Flow
//!
//! ```text
//! render_selection_widget ◄──┐
//!        │                   │
//!        ▼                   │
//! submit_page_selection ─────┘  (any number of pages)
//!        │
//!        ▼
//! choose_action ──► needs_preconfig_form ──► choose_action again
//!        │
//!   ┌────┴──────────────┐
//!   ▼                   ▼
//! ready          needs_confirmation
//!   │                   │
//!   │            confirmation_view
//!   │                   │
//!   └───────┬───────────┘
//!           ▼
//!   confirm_and_execute
//!           │
//!      ┌────┴────┐
//!      ▼         ▼
//!  completed   batch job ──► run_batch_step (until done)
//!      │         │
//!      └────┬────┘
//!           ▼
//!   selection deleted
//! ```
//!
//! `clear_selection` deletes the selection, and any batch job it owns, at
//! any point.

use std::sync::Arc;

use sweep_core::{
    ActorId, BatchJob, EngineConfig, EngineError, EngineResult, FormSpec, ItemKey, JobId,
    ResultRow, SelectionContext, SelectionPhase, SelectionState, ValidationError,
};

use crate::batch::BatchProcessor;
use crate::fingerprint::ContextNormalizer;
use crate::providers::{ActionExecutor, PermissionOracle, ResultSetProvider};
use crate::registry::{ActionRegistry, ActionRegistryAdapter, ApplicableAction};
use crate::resolver::SelectionResolver;
use crate::router::{ExecutionPath, ExecutionRouter};
use crate::store::SelectionStore;
use crate::synchronizer::{summary_labels, Reconciled, SelectionSynchronizer, SelectionWidget};

mod types;

pub use types::{
    ActionRequest, BatchStepReport, ChooseOutcome, ConfirmationView, ExecutionStarted, SubmitAck,
};

#[cfg(test)]
mod tests;

// =============================================================================
// Bulk Engine
// =============================================================================

/// Facade over the selection store, synchronizer, action adapter, router
/// and batch processor.
pub struct BulkEngine {
    config: EngineConfig,
    store: Arc<dyn SelectionStore>,
    provider: Arc<dyn ResultSetProvider>,
    adapter: ActionRegistryAdapter,
    executor: Arc<dyn ActionExecutor>,
    oracle: Arc<dyn PermissionOracle>,
    synchronizer: SelectionSynchronizer,
    resolver: SelectionResolver,
    router: ExecutionRouter,
    processor: BatchProcessor,
}

impl BulkEngine {
    /// Create an engine. Actions execute through `registry` unless another
    /// executor is set with [`with_executor`](Self::with_executor).
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SelectionStore>,
        provider: Arc<dyn ResultSetProvider>,
        registry: Arc<ActionRegistry>,
        oracle: Arc<dyn PermissionOracle>,
    ) -> Self {
        let synchronizer = SelectionSynchronizer::new(ContextNormalizer::new(&config.selection));
        let resolver = SelectionResolver::new(config.batch.resolve_page_size);
        let router = ExecutionRouter::new(&config.batch);
        let adapter = ActionRegistryAdapter::new(registry.clone(), config.actions.clone());

        Self {
            config,
            store,
            provider,
            adapter,
            executor: registry,
            oracle,
            synchronizer,
            resolver,
            router,
            processor: BatchProcessor::new(),
        }
    }

    /// Route action execution through a different executor.
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the stored selection and reconcile it with `context`.
    async fn load(&self, actor: &ActorId, context: &SelectionContext) -> EngineResult<Reconciled> {
        let stored = self.store.get(actor, &context.key()).await?;
        Ok(self.synchronizer.reconcile(stored, context))
    }

    async fn save(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
        state: &SelectionState,
    ) -> EngineResult<()> {
        self.store.put(actor, &context.key(), state).await?;
        Ok(())
    }

    async fn applicable(
        &self,
        context: &SelectionContext,
        action_id: &str,
    ) -> EngineResult<ApplicableAction> {
        if action_id.is_empty() {
            return Err(ValidationError::NoActionSelected.into());
        }
        let item_types = self.provider.item_types(context).await?;
        self.adapter
            .find_applicable(action_id, &item_types)
            .ok_or_else(|| ValidationError::ActionNotApplicable(action_id.to_string()).into())
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Reconcile the stored selection with a freshly rendered page and
    /// build the checkbox widget for it.
    pub async fn render_selection_widget(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
        page: &[ResultRow],
    ) -> EngineResult<SelectionWidget> {
        let Reconciled { mut state, reset } = self.load(actor, context).await?;

        let total = self.provider.count(context).await?;
        self.synchronizer.record_page(&mut state, total, page);

        let exact_count = self.eager_count(context, &state).await;
        self.save(actor, context, &state).await?;

        Ok(self.synchronizer.widget(
            &state,
            context,
            page,
            exact_count,
            self.config.selection.summary_label_limit,
            reset,
        ))
    }

    /// Exact size of a small exclude-mode selection, if configured.
    async fn eager_count(
        &self,
        context: &SelectionContext,
        state: &SelectionState,
    ) -> Option<usize> {
        let limit = self.config.selection.eager_resolve_limit;
        if !state.exclude_mode || limit == 0 || state.total_results > limit {
            return None;
        }
        match self.resolver.resolve(self.provider.as_ref(), context, state).await {
            Ok(keys) => Some(keys.len()),
            Err(e) => {
                tracing::warn!("Eager resolution failed, showing estimate: {}", e);
                None
            }
        }
    }

    /// Apply the checkboxes of the last rendered page.
    pub async fn submit_page_selection(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
        checked: &[ItemKey],
        select_all: bool,
    ) -> EngineResult<SubmitAck> {
        let Reconciled { mut state, reset } = self.load(actor, context).await?;
        if state.phase == SelectionPhase::Batching {
            return Err(ValidationError::SelectionLocked.into());
        }

        let effect = self
            .synchronizer
            .apply_submission(&mut state, context, checked, select_all);
        self.save(actor, context, &state).await?;

        Ok(SubmitAck {
            selected_count: state.estimated_count(),
            exclude_mode: state.exclude_mode,
            flipped: effect.flipped,
            ignored_keys: effect.ignored_keys,
            reset,
        })
    }

    /// Delete the selection and any batch job it owns.
    pub async fn clear_selection(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
    ) -> EngineResult<()> {
        let key = context.key();
        if let Some(state) = self.store.get(actor, &key).await? {
            if let Some(job_id) = state.batch_job_id {
                tracing::info!("Cancelling batch job {}", job_id);
                self.store.delete_job(job_id).await?;
            }
        }
        self.store.delete(actor, &key).await?;
        tracing::debug!("Cleared selection {} for {}", key, actor);
        Ok(())
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Actions offered for the context's result set.
    pub async fn applicable_actions(
        &self,
        context: &SelectionContext,
    ) -> EngineResult<Vec<ApplicableAction>> {
        let item_types = self.provider.item_types(context).await?;
        Ok(self.adapter.list_applicable(&item_types))
    }

    /// Preconfiguration form of an action, pre-filled with operator
    /// defaults and values already captured for this selection.
    pub async fn preconfig_form(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
        action_id: &str,
    ) -> EngineResult<Option<FormSpec>> {
        self.applicable(context, action_id).await?;
        let Reconciled { state, .. } = self.load(actor, context).await?;

        let existing = if state.action_id.as_deref() == Some(action_id) {
            state.action_preconfiguration
        } else {
            Default::default()
        };
        Ok(self.adapter.build_preconfig_form(action_id, &existing))
    }

    /// Capture an action choice for the current selection.
    ///
    /// On any validation error the stored selection is left as it was.
    pub async fn choose_action(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
        request: ActionRequest,
    ) -> EngineResult<ChooseOutcome> {
        let Reconciled { mut state, reset } = self.load(actor, context).await?;
        if state.phase == SelectionPhase::Batching {
            return Err(ValidationError::SelectionLocked.into());
        }
        if reset.is_some() {
            self.save(actor, context, &state).await?;
        }
        if state.estimated_count() == 0 {
            return Err(ValidationError::EmptySelection.into());
        }

        let action = self.applicable(context, &request.action_id).await?;

        let submitted = match request.config {
            Some(values) => values,
            None if action.is_configurable => {
                if let Some(form) = self
                    .adapter
                    .build_preconfig_form(&action.id, &state.action_preconfiguration)
                {
                    return Ok(ChooseOutcome::NeedsPreconfigForm { form });
                }
                Default::default()
            }
            None => Default::default(),
        };
        let config = self.adapter.validate_preconfig(&action.id, &submitted)?;

        state.action_id = Some(action.id.clone());
        state.action_label = Some(action.label.clone());
        state.action_preconfiguration = config;
        state.redirect_target = request.redirect_target;
        state.phase = if self.router.requires_confirmation(&action) {
            SelectionPhase::Confirming
        } else {
            SelectionPhase::ActionChosen
        };
        self.save(actor, context, &state).await?;

        tracing::info!("{} chose {} on {} ({})", actor, action.id, context.key(), state.phase);
        Ok(match state.phase {
            SelectionPhase::Confirming => ChooseOutcome::NeedsConfirmation,
            _ => ChooseOutcome::Ready,
        })
    }

    /// Data for the confirmation page of a pending action.
    pub async fn confirmation_view(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
    ) -> EngineResult<ConfirmationView> {
        let Reconciled { state, .. } = self.load(actor, context).await?;
        let (Some(action_id), true) = (state.action_id.clone(), state.has_pending_action()) else {
            return Err(EngineError::NothingPending(state.phase.to_string()));
        };

        Ok(ConfirmationView {
            action_label: state.action_label.clone().unwrap_or_else(|| action_id.clone()),
            action_id,
            selected_count: state.estimated_count(),
            exclude_mode: state.exclude_mode,
            summary_labels: summary_labels(&state, self.config.selection.summary_label_limit),
        })
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute the pending action.
    ///
    /// Small selections run within the call and their selection is deleted.
    /// Larger ones become a batch job that owns the selection until it
    /// finishes or the selection is cleared. A resolution failure leaves
    /// the selection as it was, so the actor can retry.
    pub async fn confirm_and_execute(
        &self,
        actor: &ActorId,
        context: &SelectionContext,
    ) -> EngineResult<ExecutionStarted> {
        let Reconciled { mut state, reset } = self.load(actor, context).await?;
        if reset.is_some() {
            self.save(actor, context, &state).await?;
        }
        let (Some(action_id), true) = (state.action_id.clone(), state.has_pending_action()) else {
            return Err(EngineError::NothingPending(state.phase.to_string()));
        };

        let action = self.applicable(context, &action_id).await?;
        let keys = self
            .resolver
            .resolve(self.provider.as_ref(), context, &state)
            .await
            .map_err(|e| {
                tracing::error!("Failed to resolve selection for {}: {}", context.key(), e);
                e
            })?;
        if keys.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        let path = self.router.plan(&action, keys.len(), true);
        tracing::info!("Executing {} over {} items ({})", action_id, keys.len(), path);

        let label = state.action_label.clone().unwrap_or_else(|| action.label.clone());
        let chunk_size = match path {
            ExecutionPath::Batch => self.config.batch.chunk_size,
            _ => keys.len(),
        };
        let job = BatchJob::new(
            actor.clone(),
            context.key(),
            action_id,
            label,
            state.action_preconfiguration.clone(),
            keys,
            chunk_size,
            self.config.batch.failure_detail_cap,
        )
        .with_redirect(state.redirect_target.clone());

        match path {
            ExecutionPath::Batch => {
                self.store.put_job(&job).await?;
                state.phase = SelectionPhase::Batching;
                state.batch_job_id = Some(job.id);
                self.save(actor, context, &state).await?;
                Ok(ExecutionStarted::Batch { job_id: job.id })
            }
            ExecutionPath::Immediate | ExecutionPath::Confirm => {
                let job = self
                    .processor
                    .step(job, self.executor.as_ref(), self.oracle.as_ref())
                    .await;
                self.store.delete(actor, &context.key()).await?;
                let summary = job.summary();
                tracing::info!(
                    "{} finished: {} succeeded, {} failed",
                    summary.action_label,
                    summary.success_count,
                    summary.failure_count
                );
                Ok(ExecutionStarted::Completed { summary })
            }
        }
    }

    /// Whether the job's selection still points at it.
    async fn owns_job(&self, job: &BatchJob) -> EngineResult<bool> {
        let state = self.store.get(&job.actor_id, &job.context_key).await?;
        Ok(state.and_then(|s| s.batch_job_id) == Some(job.id))
    }

    /// Drop a job whose selection was cleared or replaced.
    async fn abandon_job(&self, job: &BatchJob) -> EngineResult<BatchStepReport> {
        tracing::info!(
            "Batch job {} no longer owned by {}, stopping at {}/{}",
            job.id,
            job.context_key,
            job.cursor,
            job.total()
        );
        self.store.delete_job(job.id).await?;
        Err(EngineError::JobNotFound(job.id))
    }

    /// Process the next chunk of a batch job.
    ///
    /// Once the job is finished, its selection and the job record are
    /// deleted; further calls report [`EngineError::JobNotFound`]. The same
    /// error is reported when the selection was cleared before or during
    /// the step, and the job is not written back.
    pub async fn run_batch_step(&self, job_id: JobId) -> EngineResult<BatchStepReport> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(EngineError::JobNotFound(job_id))?;
        if !self.owns_job(&job).await? {
            return self.abandon_job(&job).await;
        }

        let job = self
            .processor
            .step(job, self.executor.as_ref(), self.oracle.as_ref())
            .await;

        if !job.is_finished() {
            if !self.owns_job(&job).await? {
                return self.abandon_job(&job).await;
            }
            self.store.put_job(&job).await?;
            return Ok(BatchStepReport {
                done: false,
                progress: job.progress(),
                summary: None,
            });
        }

        // Selection first: a leftover finished job just completes again.
        if let Some(state) = self.store.get(&job.actor_id, &job.context_key).await? {
            if state.batch_job_id == Some(job_id) {
                self.store.delete(&job.actor_id, &job.context_key).await?;
            }
        }
        self.store.delete_job(job_id).await?;

        let summary = job.summary();
        tracing::info!(
            "Batch job {} finished: {} succeeded, {} failed",
            job_id,
            summary.success_count,
            summary.failure_count
        );
        Ok(BatchStepReport {
            done: true,
            progress: job.progress(),
            summary: Some(summary),
        })
    }
}
