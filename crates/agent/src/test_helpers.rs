//! Shared test helpers for agent tests.

use crate::decision::DecisionPolicy;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use stepwise_core::error::{PlanError, ProviderError, ToolError};
use stepwise_core::event::{EventBus, ModeEvent};
use stepwise_core::message::Message;
use stepwise_core::plan::{Plan, PlanFailureDecision, Step, StepDecision};
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::tool::{Tool, ToolRegistry};
use tokio::sync::broadcast;

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `chat` returns the next reply in the queue.
/// Panics if more calls are made than replies provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    call_count: Mutex<usize>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// The messages sent on every call so far.
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<String, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        self.prompts.lock().unwrap().push(messages.to_vec());
        let response = responses[*count].clone();
        *count += 1;
        response
    }
}

/// A THINK reply that finishes with `output`.
pub fn complete(output: &str) -> String {
    json!({
        "analysis": "The task is done",
        "considerations": [],
        "plan": "",
        "confidence": "high",
        "conclusion": "COMPLETE",
        "nextAction": null,
        "output": output,
    })
    .to_string()
}

/// A THINK reply that continues without choosing a tool.
pub fn idle() -> String {
    json!({
        "analysis": "Still thinking",
        "confidence": "medium",
        "conclusion": "CONTINUE",
        "nextAction": null,
    })
    .to_string()
}

/// A THINK reply that calls `tool` with `parameters`.
pub fn call(tool: &str, parameters: Value) -> String {
    json!({
        "analysis": format!("Use {tool}"),
        "confidence": "high",
        "conclusion": "CONTINUE",
        "nextAction": {"tool": tool, "parameters": parameters},
    })
    .to_string()
}

/// Returns `{success, echo}` where `success` mirrors the `ok` parameter
/// (default true).
pub struct StubTool {
    name: &'static str,
    terminal: bool,
}

impl StubTool {
    pub fn new(name: &'static str, terminal: bool) -> Self {
        Self { name, terminal }
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Test tool"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"ok": {"type": "boolean"}}})
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }

    async fn execute(&self, parameters: Value) -> Result<Value, ToolError> {
        if parameters.get("raise").and_then(Value::as_bool) == Some(true) {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.into(),
                reason: "stub raised".into(),
            });
        }
        let ok = parameters.get("ok").and_then(Value::as_bool).unwrap_or(true);
        Ok(json!({"success": ok, "echo": parameters}))
    }
}

/// `work` (non-terminal) and `read` (terminal).
pub fn stub_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(StubTool::new("work", false))).unwrap();
    registry.register(Box::new(StubTool::new("read", true))).unwrap();
    Arc::new(registry)
}

/// Drain everything currently buffered on a bus subscription.
pub fn drain(rx: &mut broadcast::Receiver<Arc<ModeEvent>>) -> Vec<Arc<ModeEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn modes(events: &[Arc<ModeEvent>]) -> Vec<&'static str> {
    events.iter().map(|e| e.mode()).collect()
}

pub fn bus() -> Arc<EventBus> {
    Arc::new(EventBus::new(1024))
}

/// Replays fixed answers, then falls back to aborting.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPolicy {
    step_decisions: Arc<Mutex<Vec<StepDecision>>>,
    plan_failure: Option<PlanFailureDecision>,
}

impl ScriptedPolicy {
    pub fn new(step_decisions: Vec<StepDecision>) -> Self {
        let mut step_decisions = step_decisions;
        step_decisions.reverse();
        Self {
            step_decisions: Arc::new(Mutex::new(step_decisions)),
            plan_failure: None,
        }
    }

    pub fn with_plan_failure(mut self, decision: PlanFailureDecision) -> Self {
        self.plan_failure = Some(decision);
        self
    }
}

#[async_trait]
impl DecisionPolicy for ScriptedPolicy {
    async fn on_step_exhausted(&self, _plan: &Plan, _step: &Step) -> StepDecision {
        self.step_decisions
            .lock()
            .ok()
            .and_then(|mut d| d.pop())
            .unwrap_or(StepDecision::Abort)
    }

    async fn on_plan_failure(&self, _task: &str, _error: &PlanError) -> PlanFailureDecision {
        self.plan_failure.unwrap_or(PlanFailureDecision::Abort)
    }
}
