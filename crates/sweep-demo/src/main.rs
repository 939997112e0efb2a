//! Sweep demo - drives one bulk operation end to end.
//!
//! Wires the engine to a static catalog of 25 articles and a file-backed
//! store, selects "all but three" across pages, and runs a configurable
//! action as a batch job, one step at a time.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use sweep_core::{
    config_path, ActionDescriptor, ActorId, ConfigValues, EngineConfig, ExecutorError, FormField,
    FormSpec, ItemKey, ItemOutcome, ResultRow, SelectOption, SelectionContext,
};
use sweep_engine::{
    ActionRegistry, ActionRequest, AllowAll, BulkAction, BulkEngine, ChooseOutcome,
    ExecutionStarted, FileSelectionStore, ResultSetProvider, StaticResultSet,
};

/// Used when no config file exists: batch everything, in small chunks.
const DEMO_CONFIG: &str = r#"
[batch]
force = true
chunk_size = 10

[[actions]]
id = "tag"
label = "Tag articles"
weight = -10
preconfiguration = { tag = "featured" }

[[actions]]
id = "publish"

[[actions]]
id = "delete"
confirmation_required = true
"#;

const PAGE_SIZE: usize = 10;

// =============================================================================
// Actions
// =============================================================================

/// Publishes articles. Articles whose number ends in 7 are locked.
struct PublishAction {
    descriptor: ActionDescriptor,
}

#[async_trait]
impl BulkAction for PublishAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn apply(
        &self,
        _config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError> {
        Ok(keys
            .iter()
            .map(|key| {
                if key.as_ref().ends_with('7') {
                    ItemOutcome::failure(key.clone(), "article is locked")
                } else {
                    ItemOutcome::success(key.clone())
                }
            })
            .collect())
    }
}

/// Deletes articles. Always asks first.
struct DeleteAction {
    descriptor: ActionDescriptor,
}

#[async_trait]
impl BulkAction for DeleteAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn apply(
        &self,
        _config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError> {
        Ok(keys.iter().cloned().map(ItemOutcome::success).collect())
    }
}

/// Adds a tag, chosen in a preconfiguration form.
struct TagAction {
    descriptor: ActionDescriptor,
}

#[async_trait]
impl BulkAction for TagAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    fn preconfig_form(&self) -> Option<FormSpec> {
        Some(FormSpec::new(vec![
            FormField::select(
                "tag",
                "Tag",
                vec![
                    SelectOption::new("featured", "Featured"),
                    SelectOption::new("archive", "Archive"),
                ],
            )
            .required(),
            FormField::checkbox("notify", "Notify authors").with_default(false.into()),
        ]))
    }

    async fn apply(
        &self,
        config: &ConfigValues,
        keys: &[ItemKey],
    ) -> Result<Vec<ItemOutcome>, ExecutorError> {
        let tag = config
            .get("tag")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExecutorError::Failed("missing tag".to_string()))?;
        tracing::debug!("Tagging {} articles with {}", keys.len(), tag);
        Ok(keys.iter().cloned().map(ItemOutcome::success).collect())
    }
}

fn register_actions(registry: &ActionRegistry) -> Result<(), String> {
    let actions: Vec<Arc<dyn BulkAction>> = vec![
        Arc::new(PublishAction {
            descriptor: ActionDescriptor::new("publish", "Publish").for_types(["article"]),
        }),
        Arc::new(DeleteAction {
            descriptor: ActionDescriptor::new("delete", "Delete")
                .any_type()
                .with_confirmation()
                .with_weight(10),
        }),
        Arc::new(TagAction {
            descriptor: ActionDescriptor::new("tag", "Tag")
                .for_types(["article"])
                .configurable(),
        }),
    ];
    for action in actions {
        registry.register(action).map_err(|e| e.to_string())?;
    }
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

fn load_config() -> Result<EngineConfig, String> {
    match config_path() {
        Some(path) if path.exists() => {
            tracing::info!("Loading config from {:?}", path);
            EngineConfig::load(&path).map_err(|e| e.to_string())
        }
        _ => EngineConfig::from_toml_str(DEMO_CONFIG).map_err(|e| e.to_string()),
    }
}

fn store_dir(config: &EngineConfig) -> PathBuf {
    config.store_dir().unwrap_or_else(|e| {
        tracing::warn!("{}, using the temp directory", e);
        std::env::temp_dir().join("sweep-demo")
    })
}

// =============================================================================
// Flow
// =============================================================================

async fn run() -> Result<(), String> {
    let config = load_config()?;
    let store = FileSelectionStore::open(store_dir(&config))
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!("Selections stored under {:?}", store.root());

    let catalog = Arc::new(StaticResultSet::new(
        (1..=25)
            .map(|i| ResultRow::new(format!("a{:02}", i), format!("Article {}", i), "article"))
            .collect(),
    ));
    let registry = Arc::new(ActionRegistry::new());
    register_actions(&registry)?;

    let engine = BulkEngine::new(
        config,
        Arc::new(store),
        catalog.clone(),
        registry,
        Arc::new(AllowAll),
    );

    let actor = ActorId::from("editor");
    let context = SelectionContext::new("articles", "admin").with_filter("page", 0.into());
    let first_page = catalog
        .page(&context, 0, PAGE_SIZE)
        .await
        .map_err(|e| e.to_string())?;

    // Start clean in case an earlier run was interrupted.
    engine
        .clear_selection(&actor, &context)
        .await
        .map_err(|e| e.to_string())?;

    let widget = engine
        .render_selection_widget(&actor, &context, &first_page)
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!("{} results, nothing selected", widget.total_results);

    // Tick "select all" and uncheck the first three rows.
    let still_checked: Vec<ItemKey> = first_page[3..].iter().map(|r| r.key.clone()).collect();
    let ack = engine
        .submit_page_selection(&actor, &context, &still_checked, true)
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!("{} items selected", ack.selected_count);

    for action in engine
        .applicable_actions(&context)
        .await
        .map_err(|e| e.to_string())?
    {
        tracing::info!("Offered: {} ({})", action.label, action.id);
    }

    let outcome = engine
        .choose_action(&actor, &context, ActionRequest::new("tag"))
        .await
        .map_err(|e| e.to_string())?;
    let form = match outcome {
        ChooseOutcome::NeedsPreconfigForm { form } => form,
        other => return Err(format!("expected a preconfiguration form, got {:?}", other)),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&form).map_err(|e| e.to_string())?
    );

    // Submit the form with its pre-filled values.
    let values: ConfigValues = form
        .fields
        .iter()
        .filter_map(|field| Some((field.key.clone(), field.default.clone()?)))
        .collect();
    let outcome = engine
        .choose_action(
            &actor,
            &context,
            ActionRequest::new("tag")
                .with_config(values)
                .with_redirect("/admin/articles"),
        )
        .await
        .map_err(|e| e.to_string())?;
    if outcome == ChooseOutcome::NeedsConfirmation {
        let view = engine
            .confirmation_view(&actor, &context)
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!("Confirming {} on {} items", view.action_label, view.selected_count);
    }

    let summary = match engine
        .confirm_and_execute(&actor, &context)
        .await
        .map_err(|e| e.to_string())?
    {
        ExecutionStarted::Completed { summary } => summary,
        ExecutionStarted::Batch { job_id } => loop {
            let report = engine
                .run_batch_step(job_id)
                .await
                .map_err(|e| e.to_string())?;
            tracing::info!(
                "Batch {}: {}/{}",
                job_id,
                report.progress.cursor,
                report.progress.total
            );
            if let Some(summary) = report.summary {
                break summary;
            }
        },
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?
    );
    Ok(())
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let rt = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run()) {
        tracing::error!("Demo failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
