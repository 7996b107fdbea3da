//! Command implementations and the wiring they share.

pub mod config_cmd;
pub mod plans;
pub mod resume;
pub mod run;
pub mod session;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stepwise_agent::{Coordinator, DecisionPolicy, ExecuteOptions, NonInteractivePolicy, TaskMode};
use stepwise_config::{AppConfig, RetrievalKind};
use stepwise_core::error::{Error, ProviderError};
use stepwise_core::event::{EventBus, FinalOutput};
use stepwise_core::plan::{PlanStatus, PlanStore};
use stepwise_core::provider::ChatOptions;
use stepwise_core::session::SessionStore;
use stepwise_memory::{
    EmbeddingStrategy, FilePlanStore, FileSessionStore, FuzzyKeywordStrategy, NoopSessionStore,
    Retriever,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::policy::StdinPolicy;
use crate::render;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config() -> CliResult<AppConfig> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub fn task_mode(single_step: bool, multi_step: bool) -> TaskMode {
    match (single_step, multi_step) {
        (true, _) => TaskMode::SingleStep,
        (_, true) => TaskMode::MultiStep,
        _ => TaskMode::Auto,
    }
}

/// The configured session store; a no-op store when sessions are disabled.
pub fn session_store(config: &AppConfig) -> Arc<dyn SessionStore> {
    if config.session.enabled {
        Arc::new(FileSessionStore::new(
            config.session.resolved_dir(),
            config.session.max_lines,
        ))
    } else {
        Arc::new(NoopSessionStore)
    }
}

pub fn retriever(config: &AppConfig, store: Arc<dyn SessionStore>) -> Retriever {
    let retriever = Retriever::new(store).with_top_k(config.session.top_k);
    match config.session.strategy {
        RetrievalKind::Keyword => retriever.with_strategy(Box::new(FuzzyKeywordStrategy::new(
            config.session.similarity_threshold,
        ))),
        RetrievalKind::Embedding => retriever.with_strategy(Box::new(EmbeddingStrategy)),
    }
}

pub fn plan_store(config: &AppConfig) -> Arc<dyn PlanStore> {
    Arc::new(FilePlanStore::new(config.plans.resolved_dir()))
}

/// Build the coordinator: one provider handle, the tool table and the stores.
pub fn build_coordinator(config: &AppConfig, bus: Arc<EventBus>) -> CliResult<Coordinator> {
    let provider = match stepwise_providers::build_from_config(config) {
        Ok(provider) => provider,
        Err(e @ ProviderError::NotConfigured(_)) => {
            print_key_help();
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    let tools = stepwise_tools::default_registry(Duration::from_secs(
        config.tools.command_timeout_secs,
    ))?;
    let options = ChatOptions::new(stepwise_providers::resolve_model(config))
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);

    let store = session_store(config);
    Ok(Coordinator::new(
        provider,
        Arc::new(tools),
        Arc::new(retriever(config, store)),
        plan_store(config),
        options,
    )
    .with_event_bus(bus)
    .with_agent_config(config.agent.clone()))
}

fn print_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    OPENROUTER_API_KEY = 'sk-or-v1-...'   (recommended)");
    eprintln!("    OPENAI_API_KEY     = 'sk-...'         (for OpenAI direct)");
    eprintln!("    STEPWISE_API_KEY   = 'sk-...'         (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}

/// Options for one run. `--json` always gets the abort-by-default policy.
pub fn execute_options(json: bool, session: Option<String>) -> ExecuteOptions {
    let policy: Arc<dyn DecisionPolicy> = if json {
        Arc::new(NonInteractivePolicy)
    } else {
        Arc::new(StdinPolicy)
    };
    let opts = ExecuteOptions::default().with_policy(policy);
    match session {
        Some(id) => opts.with_session(id),
        None => opts,
    }
}

/// Await `work` while rendering every event published on `bus`.
pub async fn drive<F>(bus: &EventBus, json: bool, work: F) -> Result<FinalOutput, Error>
where
    F: Future<Output = Result<FinalOutput, Error>>,
{
    let mut rx = bus.subscribe();
    let mut open = true;
    tokio::pin!(work);

    loop {
        tokio::select! {
            biased;
            event = rx.recv(), if open => match event {
                Ok(event) => render::emit(&event, json),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Renderer fell behind"),
                Err(RecvError::Closed) => open = false,
            },
            result = &mut work => {
                while let Ok(event) = rx.try_recv() {
                    render::emit(&event, json);
                }
                return result;
            }
        }
    }
}

/// Map a finished run to the process outcome.
pub fn finish(output: &FinalOutput) -> CliResult {
    if output.plan_status == Some(PlanStatus::Aborted) {
        let id = output.plan_id.as_deref().unwrap_or_default();
        return Err(format!("Plan {id} aborted; continue it with `stepwise resume {id}`").into());
    }
    Ok(())
}
