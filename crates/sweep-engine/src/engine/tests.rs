use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use sweep_core::{
    ActionDescriptor, ActionPreset, ConfigValues, ExecutorError, FailureKind, FieldKind,
    FormField, ItemOutcome, ProviderError, ResetReason, ResolutionError,
};

use super::*;
use crate::providers::{AllowAll, MockPermissionOracle, MockResultSetProvider, StaticResultSet};
use crate::registry::BulkAction;
use crate::store::{FileSelectionStore, MemorySelectionStore};

// =============================================================================
// Fixtures
// =============================================================================

/// Action that records every call and fails on chosen keys.
struct RecordingAction {
    descriptor: ActionDescriptor,
    form: Option<FormSpec>,
    fail_on: BTreeSet<ItemKey>,
    calls: Mutex<Vec<Vec<ItemKey>>>,
    configs: Mutex<Vec<ConfigValues>>,
}

impl RecordingAction {
    fn new(descriptor: ActionDescriptor) -> Self {
        Self {
            descriptor,
            form: None,
            fail_on: BTreeSet::new(),
            calls: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, key: &str) -> Self {
        self.fail_on.insert(ItemKey::from(key));
        self
    }

    fn with_form(mut self, form: FormSpec) -> Self {
        self.form = Some(form);
        self
    }

    fn chunk_sizes(&self) -> Vec<usize> {
        self.calls.lock().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl BulkAction for RecordingAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    fn preconfig_form(&self) -> Option<FormSpec> {
        self.form.clone()
    }

    async fn apply(
        &self,
        config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError> {
        self.calls.lock().push(keys.to_vec());
        self.configs.lock().push(config.clone());
        Ok(keys
            .iter()
            .map(|key| {
                if self.fail_on.contains(key) {
                    ItemOutcome::failure(key.clone(), "refused")
                } else {
                    ItemOutcome::success(key.clone())
                }
            })
            .collect())
    }
}

struct Fixture {
    engine: BulkEngine,
    store: Arc<MemorySelectionStore>,
    catalog: Arc<StaticResultSet>,
    publish: Arc<RecordingAction>,
    delete: Arc<RecordingAction>,
    tag: Arc<RecordingAction>,
}

fn rows(n: usize) -> Vec<ResultRow> {
    (0..n)
        .map(|i| ResultRow::new(format!("n{:02}", i), format!("Node {}", i), "node"))
        .collect()
}

fn registry_with(
    publish: &Arc<RecordingAction>,
    delete: &Arc<RecordingAction>,
    tag: &Arc<RecordingAction>,
) -> Arc<ActionRegistry> {
    let registry = ActionRegistry::new();
    registry.register(publish.clone()).unwrap();
    registry.register(delete.clone()).unwrap();
    registry.register(tag.clone()).unwrap();
    Arc::new(registry)
}

fn actions() -> (Arc<RecordingAction>, Arc<RecordingAction>, Arc<RecordingAction>) {
    let publish = Arc::new(
        RecordingAction::new(ActionDescriptor::new("publish", "Publish").for_types(["node"]))
            .failing_on("n01"),
    );
    let delete = Arc::new(RecordingAction::new(
        ActionDescriptor::new("delete", "Delete").any_type().with_confirmation(),
    ));
    let tag = Arc::new(
        RecordingAction::new(
            ActionDescriptor::new("tag", "Tag")
                .for_types(["node"])
                .configurable(),
        )
        .with_form(FormSpec::new(vec![FormField::text("tag", "Tag").required()])),
    );
    (publish, delete, tag)
}

fn fixture(config: EngineConfig, n: usize) -> Fixture {
    let (publish, delete, tag) = actions();
    let store = Arc::new(MemorySelectionStore::new());
    let catalog = Arc::new(StaticResultSet::new(rows(n)));
    let engine = BulkEngine::new(
        config,
        store.clone(),
        catalog.clone(),
        registry_with(&publish, &delete, &tag),
        Arc::new(AllowAll),
    );
    Fixture {
        engine,
        store,
        catalog,
        publish,
        delete,
        tag,
    }
}

fn batching(chunk_size: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.batch.force = true;
    config.batch.chunk_size = chunk_size;
    config
}

fn alice() -> ActorId {
    ActorId::from("alice")
}

fn ctx() -> SelectionContext {
    SelectionContext::new("content", "page_1")
}

fn keys(rows: &[ResultRow]) -> Vec<ItemKey> {
    rows.iter().map(|r| r.key.clone()).collect()
}

async fn stored(f: &Fixture) -> Option<SelectionState> {
    f.store.get(&alice(), &ctx().key()).await.unwrap()
}

/// Render the first page and check the given keys on it.
async fn select(f: &Fixture, page: &[ResultRow], checked: &[ItemKey]) {
    f.engine
        .render_selection_widget(&alice(), &ctx(), page)
        .await
        .unwrap();
    f.engine
        .submit_page_selection(&alice(), &ctx(), checked, false)
        .await
        .unwrap();
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_select_all_minus_three_runs_in_chunks() {
    let f = fixture(batching(10), 25);
    let all = rows(25);
    let page = &all[..10];

    let widget = f
        .engine
        .render_selection_widget(&alice(), &ctx(), page)
        .await
        .unwrap();
    assert!(widget.select_all_available);
    assert_eq!(widget.total_results, 25);

    // Select all and untick three rows in one submission.
    let ack = f
        .engine
        .submit_page_selection(&alice(), &ctx(), &keys(&page[3..]), true)
        .await
        .unwrap();
    assert!(ack.flipped);
    assert!(ack.exclude_mode);
    assert_eq!(ack.selected_count, 22);
    let excluded: Vec<ItemKey> = stored(&f).await.unwrap().selected_keys.into_iter().collect();
    assert_eq!(excluded, keys(&page[..3]));

    let widget = f
        .engine
        .render_selection_widget(&alice(), &ctx(), page)
        .await
        .unwrap();
    assert_eq!(widget.selected_count, 22);
    assert!(widget.rows[3..].iter().all(|r| r.checked));
    assert!(widget.rows[..3].iter().all(|r| !r.checked));

    let outcome = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();
    assert_eq!(outcome, ChooseOutcome::Ready);

    let job_id = match f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap() {
        ExecutionStarted::Batch { job_id } => job_id,
        other => panic!("expected batch, got {:?}", other),
    };
    assert_eq!(stored(&f).await.unwrap().phase, SelectionPhase::Batching);

    let mut cursors = Vec::new();
    let summary = loop {
        let report = f.engine.run_batch_step(job_id).await.unwrap();
        cursors.push(report.progress.cursor);
        assert_eq!(report.progress.total, 22);
        if let Some(summary) = report.summary {
            assert!(report.done);
            break summary;
        }
    };

    assert_eq!(cursors, vec![10, 20, 22]);
    assert_eq!(f.publish.chunk_sizes(), vec![10, 10, 2]);
    let dispatched: Vec<ItemKey> = f.publish.calls.lock().iter().flatten().cloned().collect();
    assert!(keys(&page[..3]).iter().all(|k| !dispatched.contains(k)));
    assert_eq!(summary.success_count, 22);
    assert_eq!(summary.failure_count, 0);

    assert!(stored(&f).await.is_none());
    assert_eq!(f.store.job_count(), 0);
    assert!(matches!(
        f.engine.run_batch_step(job_id).await,
        Err(EngineError::JobNotFound(id)) if id == job_id
    ));
}

#[tokio::test]
async fn test_filter_change_resets_selection() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..3])).await;
    assert_eq!(stored(&f).await.unwrap().selected_keys.len(), 3);

    let filtered = ctx().with_filter("search", json!("Node"));
    let widget = f
        .engine
        .render_selection_widget(&alice(), &filtered, &page)
        .await
        .unwrap();

    assert_eq!(widget.reset, Some(ResetReason::ExposedFilters));
    assert_eq!(widget.selected_count, 0);
    assert!(widget.rows.iter().all(|r| !r.checked));
    let state = stored(&f).await.unwrap();
    assert!(state.selected_keys.is_empty());
    assert!(!state.exclude_mode);
}

#[tokio::test]
async fn test_pager_change_keeps_selection() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..2])).await;

    let next_page = ctx().with_filter("page", json!(1));
    let widget = f
        .engine
        .render_selection_widget(&alice(), &next_page, &[])
        .await
        .unwrap();
    assert!(widget.reset.is_none());
    assert_eq!(widget.selected_count, 2);
}

#[tokio::test]
async fn test_small_selection_runs_immediately() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..3])).await;

    let outcome = f
        .engine
        .choose_action(
            &alice(),
            &ctx(),
            ActionRequest::new("publish").with_redirect("/admin/content"),
        )
        .await
        .unwrap();
    assert_eq!(outcome, ChooseOutcome::Ready);

    let summary = match f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap() {
        ExecutionStarted::Completed { summary } => summary,
        other => panic!("expected immediate execution, got {:?}", other),
    };

    assert_eq!(summary.success_count + summary.failure_count, 3);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.failures[0].key, ItemKey::from("n01"));
    assert_eq!(summary.redirect_target.as_deref(), Some("/admin/content"));
    assert_eq!(f.publish.chunk_sizes(), vec![3]);
    assert!(stored(&f).await.is_none());
    assert_eq!(f.store.job_count(), 0);
}

#[tokio::test]
async fn test_confirmation_holds_until_confirmed() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..2])).await;

    let outcome = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("delete"))
        .await
        .unwrap();
    assert_eq!(outcome, ChooseOutcome::NeedsConfirmation);

    let state = stored(&f).await.unwrap();
    assert_eq!(state.phase, SelectionPhase::Confirming);
    assert_eq!(state.action_id.as_deref(), Some("delete"));
    assert!(f.delete.calls.lock().is_empty());

    let view = f.engine.confirmation_view(&alice(), &ctx()).await.unwrap();
    assert_eq!(view.action_label, "Delete");
    assert_eq!(view.selected_count, 2);
    assert_eq!(view.summary_labels, vec!["Node 0".to_string(), "Node 1".to_string()]);

    // Rendering again, as when the confirmation page is abandoned, keeps it.
    f.engine
        .render_selection_widget(&alice(), &ctx(), &page)
        .await
        .unwrap();
    assert_eq!(stored(&f).await.unwrap().phase, SelectionPhase::Confirming);

    let started = f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    assert!(matches!(started, ExecutionStarted::Completed { .. }));
    assert_eq!(f.delete.chunk_sizes(), vec![2]);
}

#[tokio::test]
async fn test_clear_discards_pending_confirmation() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..2])).await;
    f.engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("delete"))
        .await
        .unwrap();

    f.engine.clear_selection(&alice(), &ctx()).await.unwrap();
    assert!(stored(&f).await.is_none());
    assert!(matches!(
        f.engine.confirm_and_execute(&alice(), &ctx()).await,
        Err(EngineError::NothingPending(_))
    ));
}

#[tokio::test]
async fn test_submission_keeps_pending_confirmation() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..2])).await;
    f.engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("delete"))
        .await
        .unwrap();

    let ack = f
        .engine
        .submit_page_selection(&alice(), &ctx(), &keys(&page[..2]), false)
        .await
        .unwrap();
    assert_eq!(ack.selected_count, 2);

    let state = stored(&f).await.unwrap();
    assert_eq!(state.phase, SelectionPhase::Confirming);
    assert_eq!(state.action_id.as_deref(), Some("delete"));
    assert!(f.delete.calls.lock().is_empty());

    let view = f.engine.confirmation_view(&alice(), &ctx()).await.unwrap();
    assert_eq!(view.action_id, "delete");
    f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    assert_eq!(f.delete.chunk_sizes(), vec![2]);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_empty_selection_rejected() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &[]).await;

    let err = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::EmptySelection)
    ));
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_unknown_or_inapplicable_action_rejected() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..1])).await;

    let users = ctx().with_filter("type", json!("user"));
    f.catalog.set_rows(vec![ResultRow::new("u1", "Alice", "user")]);
    let err = f
        .engine
        .choose_action(&alice(), &users, ActionRequest::new("publish"))
        .await
        .unwrap_err();
    // The filter change reset the selection before applicability is checked.
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::EmptySelection)
    ));

    f.catalog.set_rows(rows(5));
    select(&f, &page, &keys(&page[..1])).await;
    let err = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("archive"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::ActionNotApplicable(ref id)) if id == "archive"
    ));

    let err = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new(""))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::NoActionSelected)
    ));
    assert_eq!(stored(&f).await.unwrap().phase, SelectionPhase::Idle);
}

#[tokio::test]
async fn test_configurable_action_collects_preconfiguration() {
    let f = fixture(EngineConfig::default(), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page[..2])).await;

    let outcome = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("tag"))
        .await
        .unwrap();
    let form = match outcome {
        ChooseOutcome::NeedsPreconfigForm { form } => form,
        other => panic!("expected a form, got {:?}", other),
    };
    assert!(matches!(form.fields[0].kind, FieldKind::Text { .. }));

    let err = f
        .engine
        .choose_action(
            &alice(),
            &ctx(),
            ActionRequest::new("tag").with_config(ConfigValues::new()),
        )
        .await
        .unwrap_err();
    match err {
        EngineError::Validation(ValidationError::Preconfiguration(errors)) => {
            assert_eq!(errors[0].path, "tag");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let state = stored(&f).await.unwrap();
    assert_eq!(state.phase, SelectionPhase::Idle);
    assert_eq!(state.selected_keys.len(), 2);

    let mut values = ConfigValues::new();
    values.insert("tag".to_string(), json!("featured"));
    values.insert("junk".to_string(), json!(1));
    let outcome = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("tag").with_config(values))
        .await
        .unwrap();
    assert_eq!(outcome, ChooseOutcome::Ready);

    let form = f
        .engine
        .preconfig_form(&alice(), &ctx(), "tag")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(form.fields[0].default, Some(json!("featured")));

    f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    let configs = f.tag.configs.lock();
    assert_eq!(configs[0].get("tag"), Some(&Value::from("featured")));
    assert!(configs[0].get("junk").is_none());
}

#[tokio::test]
async fn test_presets_relabel_and_force_confirmation() {
    let mut config = EngineConfig::default();
    config.actions = vec![ActionPreset {
        id: "publish".to_string(),
        label: Some("Go live".to_string()),
        confirmation_required: true,
        ..Default::default()
    }];
    let f = fixture(config, 5);

    let offered = f.engine.applicable_actions(&ctx()).await.unwrap();
    assert_eq!(offered.len(), 1);
    assert_eq!(offered[0].label, "Go live");

    let page = rows(5);
    select(&f, &page, &keys(&page[..1])).await;
    let outcome = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();
    assert_eq!(outcome, ChooseOutcome::NeedsConfirmation);
    assert_eq!(
        f.engine.confirmation_view(&alice(), &ctx()).await.unwrap().action_label,
        "Go live"
    );

    let err = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("delete"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::ActionNotApplicable(_))
    ));
}

// =============================================================================
// Batching
// =============================================================================

#[tokio::test]
async fn test_selection_locked_while_batching() {
    let f = fixture(batching(2), 5);
    let page = rows(5);
    select(&f, &page, &keys(&page)).await;
    f.engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();
    let outcome = f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    let ExecutionStarted::Batch { job_id } = outcome else {
        panic!("expected batch");
    };

    let err = f
        .engine
        .submit_page_selection(&alice(), &ctx(), &[], true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::SelectionLocked)
    ));
    let err = f
        .engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("delete"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::SelectionLocked)
    ));

    // A filter change does not pull the selection out from under the job.
    let widget = f
        .engine
        .render_selection_widget(&alice(), &ctx().with_filter("search", json!("x")), &[])
        .await
        .unwrap();
    assert!(widget.reset.is_none());
    assert_eq!(widget.phase, SelectionPhase::Batching);

    f.engine.run_batch_step(job_id).await.unwrap();
    f.engine.clear_selection(&alice(), &ctx()).await.unwrap();
    assert_eq!(f.store.job_count(), 0);
    assert!(matches!(
        f.engine.run_batch_step(job_id).await,
        Err(EngineError::JobNotFound(_))
    ));
    assert_eq!(f.publish.chunk_sizes(), vec![2]);
}

/// Executor that clears the selection while its chunk runs, the way a
/// concurrent clear request would.
struct ClearingExecutor {
    store: Arc<MemorySelectionStore>,
    calls: Mutex<usize>,
}

#[async_trait]
impl ActionExecutor for ClearingExecutor {
    async fn apply(
        &self,
        _action_id: &str,
        _config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError> {
        *self.calls.lock() += 1;
        let key = ctx().key();
        if let Ok(Some(state)) = self.store.get(&alice(), &key).await {
            if let Some(job_id) = state.batch_job_id {
                let _ = self.store.delete_job(job_id).await;
            }
        }
        let _ = self.store.delete(&alice(), &key).await;
        Ok(keys.iter().cloned().map(ItemOutcome::success).collect())
    }
}

async fn start_batch(f: &Fixture, n: usize) -> JobId {
    let page = rows(n);
    select(f, &page, &keys(&page)).await;
    f.engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();
    let outcome = f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    let ExecutionStarted::Batch { job_id } = outcome else {
        panic!("expected batch");
    };
    job_id
}

#[tokio::test]
async fn test_clear_during_step_is_not_undone() {
    let f = fixture(batching(2), 6);
    let job_id = start_batch(&f, 6).await;

    let Fixture { engine, store, .. } = f;
    let executor = Arc::new(ClearingExecutor {
        store: store.clone(),
        calls: Mutex::new(0),
    });
    let engine = engine.with_executor(executor.clone());

    assert!(matches!(
        engine.run_batch_step(job_id).await,
        Err(EngineError::JobNotFound(id)) if id == job_id
    ));
    assert_eq!(store.job_count(), 0);
    assert!(store.get(&alice(), &ctx().key()).await.unwrap().is_none());

    assert!(matches!(
        engine.run_batch_step(job_id).await,
        Err(EngineError::JobNotFound(_))
    ));
    assert_eq!(*executor.calls.lock(), 1);
}

#[tokio::test]
async fn test_orphaned_job_is_dropped_without_running() {
    let f = fixture(batching(2), 6);
    let job_id = start_batch(&f, 6).await;

    // The selection is gone but the job record was left behind.
    f.store.delete(&alice(), &ctx().key()).await.unwrap();
    assert_eq!(f.store.job_count(), 1);

    assert!(matches!(
        f.engine.run_batch_step(job_id).await,
        Err(EngineError::JobNotFound(_))
    ));
    assert_eq!(f.store.job_count(), 0);
    assert!(f.publish.calls.lock().is_empty());
}

#[tokio::test]
async fn test_items_removed_after_snapshot_still_counted() {
    let f = fixture(batching(3), 6);
    let page = rows(6);
    select(&f, &page, &[]).await;
    f.engine
        .submit_page_selection(&alice(), &ctx(), &keys(&page), true)
        .await
        .unwrap();
    f.engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();
    let outcome = f.engine.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    let ExecutionStarted::Batch { job_id } = outcome else {
        panic!("expected batch");
    };

    // The snapshot is fixed at job creation.
    f.catalog.remove(&ItemKey::from("n05"));
    let mut report = f.engine.run_batch_step(job_id).await.unwrap();
    while !report.done {
        report = f.engine.run_batch_step(job_id).await.unwrap();
    }
    let summary = report.summary.unwrap();
    assert_eq!(summary.processed(), 6);
    assert_eq!(summary.failure_count, 1);
}

#[tokio::test]
async fn test_resolution_failure_preserves_selection() {
    let mut provider = MockResultSetProvider::new();
    provider.expect_count().returning(|_| Ok(40));
    provider
        .expect_item_types()
        .returning(|_| Ok(["node".to_string()].into_iter().collect()));
    provider
        .expect_page()
        .returning(|_, _, _| Err(ProviderError("index offline".to_string())));

    let (publish, delete, tag) = actions();
    let store = Arc::new(MemorySelectionStore::new());
    let engine = BulkEngine::new(
        EngineConfig::default(),
        store.clone(),
        Arc::new(provider),
        registry_with(&publish, &delete, &tag),
        Arc::new(AllowAll),
    );

    let page = rows(10);
    engine
        .render_selection_widget(&alice(), &ctx(), &page)
        .await
        .unwrap();
    engine
        .submit_page_selection(&alice(), &ctx(), &[], true)
        .await
        .unwrap();
    engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();

    let err = engine.confirm_and_execute(&alice(), &ctx()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Resolution(ResolutionError::Page { offset: 0, .. })
    ));

    let state = store.get(&alice(), &ctx().key()).await.unwrap().unwrap();
    assert_eq!(state.phase, SelectionPhase::ActionChosen);
    assert!(state.exclude_mode);
    assert_eq!(store.job_count(), 0);
    assert!(publish.calls.lock().is_empty());
}

#[tokio::test]
async fn test_permission_denied_items_are_counted() {
    let mut oracle = MockPermissionOracle::new();
    oracle
        .expect_can_apply()
        .returning(|_, _, key| key.as_ref() != "n02");

    let (publish, delete, tag) = actions();
    let store = Arc::new(MemorySelectionStore::new());
    let engine = BulkEngine::new(
        EngineConfig::default(),
        store,
        Arc::new(StaticResultSet::new(rows(4))),
        registry_with(&publish, &delete, &tag),
        Arc::new(oracle),
    );

    let page = rows(4);
    engine
        .render_selection_widget(&alice(), &ctx(), &page)
        .await
        .unwrap();
    engine
        .submit_page_selection(&alice(), &ctx(), &keys(&page[2..]), false)
        .await
        .unwrap();
    engine
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();

    let outcome = engine.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    let ExecutionStarted::Completed { summary } = outcome else {
        panic!("expected immediate execution");
    };
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.failures[0].kind, FailureKind::PermissionDenied);
    assert_eq!(publish.chunk_sizes(), vec![1]);
}

#[tokio::test]
async fn test_eager_count_for_small_result_sets() {
    let mut config = EngineConfig::default();
    config.selection.eager_resolve_limit = 100;
    let f = fixture(config, 8);
    let page = rows(8);
    f.engine
        .render_selection_widget(&alice(), &ctx(), &page[..4])
        .await
        .unwrap();
    f.engine
        .submit_page_selection(&alice(), &ctx(), &keys(&page[1..4]), true)
        .await
        .unwrap();

    // An excluded key that left the result set no longer counts.
    f.catalog.remove(&ItemKey::from("n00"));
    let widget = f
        .engine
        .render_selection_widget(&alice(), &ctx(), &page[1..5])
        .await
        .unwrap();
    assert!(widget.count_exact);
    assert_eq!(widget.selected_count, 7);
    assert_eq!(widget.summary_labels, vec!["Node 0".to_string()]);
}

#[tokio::test]
async fn test_batch_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (publish, delete, tag) = actions();
    let registry = registry_with(&publish, &delete, &tag);
    let catalog = Arc::new(StaticResultSet::new(rows(7)));

    let engine = |store: FileSelectionStore| {
        BulkEngine::new(
            batching(3),
            Arc::new(store),
            catalog.clone(),
            registry.clone(),
            Arc::new(AllowAll),
        )
    };

    let first = engine(FileSelectionStore::open(dir.path()).await.unwrap());
    let page = rows(7);
    first
        .render_selection_widget(&alice(), &ctx(), &page)
        .await
        .unwrap();
    first
        .submit_page_selection(&alice(), &ctx(), &keys(&page), false)
        .await
        .unwrap();
    first
        .choose_action(&alice(), &ctx(), ActionRequest::new("publish"))
        .await
        .unwrap();
    let outcome = first.confirm_and_execute(&alice(), &ctx()).await.unwrap();
    let ExecutionStarted::Batch { job_id } = outcome else {
        panic!("expected batch");
    };
    let report = first.run_batch_step(job_id).await.unwrap();
    assert_eq!(report.progress.cursor, 3);
    drop(first);

    let second = engine(FileSelectionStore::open(dir.path()).await.unwrap());
    let mut report = second.run_batch_step(job_id).await.unwrap();
    while !report.done {
        report = second.run_batch_step(job_id).await.unwrap();
    }

    assert_eq!(publish.chunk_sizes(), vec![3, 3, 1]);
    let summary = report.summary.unwrap();
    assert_eq!(summary.success_count, 6);
    assert_eq!(summary.failure_count, 1);
}
