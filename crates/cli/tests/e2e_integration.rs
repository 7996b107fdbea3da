//! End-to-end integration tests for the Stepwise orchestrator.
//!
//! These tests drive the full pipeline (classifier, planner, coordinator,
//! agent loop, session log and plan store) against a scripted LLM and
//! in-process tools.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use stepwise_agent::{Coordinator, ExecuteOptions, NonInteractivePolicy, TaskMode};
use stepwise_config::AgentConfig;
use stepwise_core::error::{ProviderError, ToolError};
use stepwise_core::event::{EventBus, ModeEvent, ModeKind};
use stepwise_core::message::Message;
use stepwise_core::plan::{Plan, PlanStatus, PlanStore, Step, StepStatus};
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::session::SessionStore;
use stepwise_core::tool::{Tool, ToolRegistry};
use stepwise_memory::{
    FilePlanStore, FileSessionStore, FuzzyKeywordStrategy, InMemoryPlanStore,
    InMemorySessionStore, Retriever,
};
use tokio::sync::broadcast;

// ── Scripted provider ────────────────────────────────────────────────────

/// Returns scripted replies in order and records every prompt.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// The user message of every call, in order.
    fn user_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|messages| messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            })
    }
}

// ── Stub tools ───────────────────────────────────────────────────────────

/// Succeeds unless called with `{"ok": false}`.
struct EchoTool {
    name: &'static str,
    terminal: bool,
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Echo the parameters back"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"ok": {"type": "boolean"}}})
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }

    async fn execute(&self, parameters: Value) -> Result<Value, ToolError> {
        let ok = parameters.get("ok").and_then(Value::as_bool).unwrap_or(true);
        Ok(json!({"success": ok, "echo": parameters}))
    }
}

fn tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry
        .register(Box::new(EchoTool {
            name: "work",
            terminal: false,
        }))
        .unwrap();
    registry
        .register(Box::new(EchoTool {
            name: "inspect",
            terminal: true,
        }))
        .unwrap();
    Arc::new(registry)
}

// ── Replies ──────────────────────────────────────────────────────────────

fn classify(multi: bool) -> String {
    json!({
        "isMultiStep": multi,
        "reasoning": "scripted",
        "complexity": if multi { "medium" } else { "low" },
        "estimatedSteps": if multi { 3 } else { 1 },
    })
    .to_string()
}

fn three_step_plan() -> String {
    json!({
        "planId": "plan-e2e",
        "overallStrategy": "one after another",
        "steps": [
            {"id": 1, "description": "prepare", "tool": "work"},
            {"id": 2, "description": "build", "tool": "work"},
            {"id": 3, "description": "verify", "tool": "inspect"}
        ]
    })
    .to_string()
}

fn complete(output: &str) -> String {
    json!({
        "analysis": "Done",
        "confidence": "high",
        "conclusion": "COMPLETE",
        "nextAction": null,
        "output": output,
    })
    .to_string()
}

fn think_more() -> String {
    json!({"analysis": "Not yet", "conclusion": "CONTINUE", "nextAction": null}).to_string()
}

fn call(tool: &str, parameters: Value) -> String {
    json!({
        "analysis": format!("Call {tool}"),
        "conclusion": "CONTINUE",
        "nextAction": {"tool": tool, "parameters": parameters},
    })
    .to_string()
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    provider: Arc<ScriptedProvider>,
    coordinator: Coordinator,
    events: broadcast::Receiver<Arc<ModeEvent>>,
}

fn agent_config() -> AgentConfig {
    AgentConfig {
        step_max_iterations: 1,
        ..AgentConfig::default()
    }
}

fn harness_with(
    replies: Vec<String>,
    sessions: Arc<dyn SessionStore>,
    plans: Arc<dyn PlanStore>,
    agent: AgentConfig,
) -> Harness {
    let provider = Arc::new(ScriptedProvider::new(replies));
    let bus = Arc::new(EventBus::new(4096));
    let events = bus.subscribe();
    let coordinator = Coordinator::new(
        provider.clone(),
        tools(),
        Arc::new(Retriever::new(sessions)),
        plans,
        ChatOptions::new("e2e-model"),
    )
    .with_event_bus(bus)
    .with_agent_config(agent);
    Harness {
        provider,
        coordinator,
        events,
    }
}

fn harness(replies: Vec<String>) -> Harness {
    harness_with(
        replies,
        Arc::new(InMemorySessionStore::default()),
        Arc::new(InMemoryPlanStore::new()),
        agent_config(),
    )
}

fn non_interactive() -> ExecuteOptions {
    ExecuteOptions::default().with_policy(Arc::new(NonInteractivePolicy))
}

fn collect(rx: &mut broadcast::Receiver<Arc<ModeEvent>>) -> Vec<Arc<ModeEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn modes(events: &[Arc<ModeEvent>]) -> Vec<&'static str> {
    events.iter().map(|e| e.mode()).collect()
}

fn step_transitions(events: &[Arc<ModeEvent>]) -> Vec<(String, u32, StepStatus, StepStatus)> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            ModeKind::ExecuteStep {
                step_id,
                attempt,
                from,
                to,
                ..
            } => Some((step_id.clone(), *attempt, *from, *to)),
            _ => None,
        })
        .collect()
}

/// Remove wall-clock fields at any depth.
fn strip_clock(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("timestamp");
            map.remove("durationMs");
            map.values_mut().for_each(strip_clock);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_clock),
        _ => {}
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_step_task_completes_immediately() {
    let mut h = harness(vec![classify(false), complete("done")]);
    let output = h
        .coordinator
        .execute("say done", &non_interactive())
        .await
        .unwrap();

    assert_eq!(output.final_output, "done");
    assert_eq!(output.iterations, 1);
    assert!(output.completed);
    assert_eq!(
        modes(&collect(&mut h.events)),
        vec!["CLASSIFY", "START", "THINK", "OUTPUT"]
    );
}

#[tokio::test]
async fn flaky_step_succeeds_on_third_attempt() {
    let mut h = harness(vec![
        classify(true),
        three_step_plan(),
        complete("prepared"),
        call("work", json!({"ok": false})),
        call("work", json!({"ok": false})),
        complete("built"),
        call("inspect", json!({"target": "build"})),
    ]);
    let output = h
        .coordinator
        .execute("prepare, build and verify", &non_interactive())
        .await
        .unwrap();

    assert_eq!(output.plan_status, Some(PlanStatus::CompletedSuccessfully));
    assert!(output.completed);

    let plans = h.coordinator.list_plans().await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].id, "plan-e2e");

    let transitions = step_transitions(&collect(&mut h.events));
    let attempts_on_two = transitions
        .iter()
        .filter(|(id, _, _, to)| id == "2" && *to == StepStatus::Executing)
        .count();
    assert_eq!(attempts_on_two, 3);
    assert!(transitions.contains(&(
        "2".into(),
        3,
        StepStatus::Executing,
        StepStatus::Completed
    )));
}

#[tokio::test]
async fn exhausted_step_aborts_without_running_later_steps() {
    let plans = Arc::new(InMemoryPlanStore::new());
    let mut h = harness_with(
        vec![
            classify(true),
            three_step_plan(),
            complete("prepared"),
            think_more(),
            think_more(),
            think_more(),
        ],
        Arc::new(InMemorySessionStore::default()),
        plans.clone(),
        agent_config(),
    );
    let output = h
        .coordinator
        .execute("prepare, build and verify", &non_interactive())
        .await
        .unwrap();

    assert_eq!(output.plan_status, Some(PlanStatus::Aborted));
    assert!(!output.completed);
    assert_eq!(h.provider.calls(), 6);

    let stored = plans.load("plan-e2e").await.unwrap().unwrap();
    assert_eq!(stored.status, PlanStatus::Aborted);
    assert_eq!(stored.steps[1].status, StepStatus::Failed);
    assert_eq!(stored.steps[1].attempts, 3);
    assert_eq!(stored.steps[2].status, StepStatus::Pending);
    assert_eq!(stored.steps[2].attempts, 0);

    let events = collect(&mut h.events);
    assert!(
        step_transitions(&events)
            .iter()
            .all(|(id, _, _, _)| id != "3")
    );
    assert!(events.iter().any(|e| e.mode() == "STEP_DECISION"));
}

#[tokio::test]
async fn retrieval_returns_only_matching_entries_ranked() {
    let store = Arc::new(InMemorySessionStore::new(100));
    let log = [
        json!({"note": "kubernets deployment"}),
        json!({"value": 42}),
        json!({"flag": true}),
        json!({"note": "kubernetes"}),
        json!({"items": []}),
    ];
    for entry in &log {
        store.append_entry("ops", entry).await;
    }

    let retriever = Retriever::new(store)
        .with_top_k(3)
        .with_strategy(Box::new(FuzzyKeywordStrategy::new(0.6)));
    let hits = retriever.retrieve("ops", "kubernetes").await;

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].index, 3);
    assert_eq!(hits[1].index, 0);
    assert!(hits[0].score > hits[1].score);
}

// ── Properties ───────────────────────────────────────────────────────────

#[tokio::test]
async fn endless_continue_halts_at_iteration_cap() {
    let agent = AgentConfig {
        max_iterations: 4,
        observe_iteration_cap: 4,
        ..AgentConfig::default()
    };
    let h = harness_with(
        vec![think_more(), think_more(), think_more(), think_more()],
        Arc::new(InMemorySessionStore::default()),
        Arc::new(InMemoryPlanStore::new()),
        agent,
    );
    let opts = non_interactive().with_mode(TaskMode::SingleStep);
    let output = h.coordinator.execute("never ends", &opts).await.unwrap();

    assert!(!output.completed);
    assert_eq!(output.iterations, 4);
    assert_eq!(h.provider.calls(), 4);
}

#[tokio::test]
async fn resume_reruns_only_unfinished_steps_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let plans = Arc::new(FilePlanStore::new(dir.path()));

    let mut first = Step::new("1", "prepare", "work");
    first.begin().unwrap();
    first.complete(json!({"output": "prepared"})).unwrap();
    let mut second = Step::new("2", "build", "work");
    second.begin().unwrap();
    second.fail("compiler crashed").unwrap();
    let third = Step::new("3", "verify", "inspect");
    plans
        .save(&Plan::new("plan-resume", "prepare, build and verify", vec![first, second, third]))
        .await
        .unwrap();

    let mut h = harness_with(
        vec![complete("built"), complete("verified")],
        Arc::new(InMemorySessionStore::default()),
        plans.clone(),
        agent_config(),
    );
    let output = h
        .coordinator
        .resume_plan("plan-resume", &non_interactive())
        .await
        .unwrap();

    assert_eq!(output.plan_status, Some(PlanStatus::CompletedSuccessfully));
    assert_eq!(output.final_output, "verified");
    assert_eq!(h.provider.calls(), 2);

    let prompts = h.provider.user_prompts();
    assert!(prompts[0].contains("Step 2 of 3"));
    assert!(prompts[0].contains("compiler crashed"));
    assert!(prompts[1].contains("Step 3 of 3"));

    let events = collect(&mut h.events);
    assert!(
        step_transitions(&events)
            .iter()
            .all(|(id, _, _, _)| id != "1")
    );

    // Reload from disk
    let reloaded = FilePlanStore::new(dir.path())
        .load("plan-resume")
        .await
        .unwrap()
        .unwrap();
    assert!(
        reloaded
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed)
    );
}

#[tokio::test]
async fn every_step_transition_is_legal() {
    let mut h = harness(vec![
        classify(true),
        three_step_plan(),
        think_more(),
        complete("prepared"),
        call("work", json!({"ok": false})),
        think_more(),
        think_more(),
    ]);
    let output = h
        .coordinator
        .execute("prepare, build and verify", &non_interactive())
        .await
        .unwrap();
    assert_eq!(output.plan_status, Some(PlanStatus::Aborted));

    let transitions = step_transitions(&collect(&mut h.events));
    assert!(!transitions.is_empty());
    for (id, attempt, from, to) in &transitions {
        assert!(
            from.can_transition_to(*to),
            "step {id}: illegal {from} -> {to}"
        );
        if (*from, *to) == (StepStatus::Failed, StepStatus::Pending) {
            assert!(*attempt < 3, "step {id} rearmed with no attempts left");
        }
    }
}

#[tokio::test]
async fn identical_scripts_give_identical_traces() {
    let script = || {
        vec![
            classify(true),
            three_step_plan(),
            call("work", json!({"path": "src"})),
            complete("built"),
            call("inspect", json!({"target": "build"})),
            complete("verified"),
        ]
    };

    let mut traces = Vec::new();
    for _ in 0..2 {
        let agent = AgentConfig {
            step_max_iterations: 3,
            ..AgentConfig::default()
        };
        let mut h = harness_with(
            script(),
            Arc::new(InMemorySessionStore::default()),
            Arc::new(InMemoryPlanStore::new()),
            agent,
        );
        h.coordinator
            .execute("prepare, build and verify", &non_interactive())
            .await
            .unwrap();
        let trace: Vec<Value> = collect(&mut h.events)
            .iter()
            .map(|e| {
                let mut value = e.to_value();
                strip_clock(&mut value);
                value
            })
            .collect();
        traces.push(trace);
    }

    assert!(!traces[0].is_empty());
    assert_eq!(traces[0], traces[1]);
}

#[tokio::test]
async fn session_log_stays_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(FileSessionStore::new(dir.path(), 5));
    let agent = AgentConfig {
        max_iterations: 4,
        observe_iteration_cap: 4,
        ..AgentConfig::default()
    };
    let h = harness_with(
        vec![
            call("work", json!({})),
            call("work", json!({})),
            call("work", json!({})),
            complete("done"),
        ],
        sessions.clone(),
        Arc::new(InMemoryPlanStore::new()),
        agent,
    );
    let opts = non_interactive()
        .with_mode(TaskMode::SingleStep)
        .with_session("bounded");
    h.coordinator.execute("work a while", &opts).await.unwrap();

    let entries = sessions.read_entries("bounded").await.unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries.last().and_then(|e| e.mode()), Some("OUTPUT"));
}
