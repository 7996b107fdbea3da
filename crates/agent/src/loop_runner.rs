//! The agent loop — drives one task through THINK → ACTION → OBSERVE.
//!
//! ```text
//! START → THINK ─┬─ COMPLETE ───────────────────────────────→ OUTPUT
//!                └─ CONTINUE → ACTION → OBSERVE ─┬─ COMPLETE → OUTPUT
//!                                                ├─ HALT ─────→ OUTPUT
//!                                                └─ RETRY / CONTINUE → THINK
//! ```
//!
//! A [`LoopRunner`] is the single loop capability. The coordinator runs it
//! directly for single-step tasks and the step runner runs it once per plan
//! step with a smaller iteration cap. Every phase is recorded as a mode
//! event before the loop moves on.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use stepwise_core::error::{Error, ToolError};
use stepwise_core::event::{ErrorInfo, FinalOutput, LoopScope, ModeKind};
use stepwise_core::json::parse_json_object;
use stepwise_core::message::Message;
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::reasoning::{
    ActionResult, ActionSpec, Conclusion, HistoryEntry, Observation, ObserveStatus, ThinkResult,
};
use stepwise_core::tool::{ToolRegistry, tool_succeeded};
use stepwise_memory::Retriever;
use tracing::{debug, info, warn};

use crate::observe::ObservePolicy;
use crate::prompt;
use crate::recorder::TraceRecorder;

/// Working state of one loop invocation. Dropped when the loop ends.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub original_task: String,
    pub history: Vec<HistoryEntry>,
    pub observations: Vec<Observation>,
    pub completed: bool,
    pub final_output: String,
}

impl LoopContext {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            original_task: task.into(),
            history: Vec::new(),
            observations: Vec::new(),
            completed: false,
            final_output: String::new(),
        }
    }
}

/// What survives a loop invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub completed: bool,
    pub final_output: String,
    pub summary: String,
    pub iterations: u32,
    /// Result of the last action, if any ran.
    pub last_result: Option<Value>,
    /// Most recent failure message (failed action or absorbed error).
    pub last_error: Option<String>,
}

impl LoopOutcome {
    pub fn to_final_output(&self) -> FinalOutput {
        FinalOutput {
            final_output: self.final_output.clone(),
            summary: self.summary.clone(),
            completed: self.completed,
            iterations: self.iterations,
            plan_id: None,
            plan_status: None,
        }
    }
}

/// The THINK/ACTION/OBSERVE loop.
#[derive(Clone)]
pub struct LoopRunner {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    retriever: Arc<Retriever>,
    options: ChatOptions,
    max_iterations: u32,
    policy: ObservePolicy,
    recent_observations: usize,
}

impl LoopRunner {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        retriever: Arc<Retriever>,
        options: ChatOptions,
    ) -> Self {
        Self {
            provider,
            tools,
            retriever,
            options,
            max_iterations: 10,
            policy: ObservePolicy::default(),
            recent_observations: 5,
        }
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the OBSERVE policy.
    pub fn with_observe_policy(mut self, policy: ObservePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// How many of the latest observations go into each THINK prompt.
    pub fn with_recent_observations(mut self, n: usize) -> Self {
        self.recent_observations = n;
        self
    }

    /// Run `task` to completion or iteration exhaustion.
    ///
    /// Returns `Err` only for fatal errors, after an ERROR event has been
    /// recorded.
    pub async fn run(
        &self,
        task: &str,
        scope: LoopScope,
        recorder: &TraceRecorder,
    ) -> Result<LoopOutcome, Error> {
        info!(
            session = recorder.session_id(),
            scope = ?scope,
            max_iterations = self.max_iterations,
            "Starting agent loop"
        );

        let mut ctx = LoopContext::new(task);
        recorder
            .record(ModeKind::Start {
                task: task.to_string(),
                scope,
                max_iterations: self.max_iterations,
            })
            .await;

        let mut iterations = 0;
        let mut failures = 0;
        let mut last_result = None;
        let mut last_error = None;

        for iteration in 1..=self.max_iterations {
            iterations = iteration;
            debug!(iteration, "Agent loop iteration");

            // ── THINK ──
            let thinking = match self.think(&ctx, iteration, recorder.session_id()).await {
                Ok(thinking) => thinking,
                Err(e) => {
                    last_error = Some(e.to_string());
                    self.absorb(e, &mut ctx, recorder).await?;
                    continue;
                }
            };
            recorder
                .record(ModeKind::Think {
                    iteration,
                    thinking: thinking.clone(),
                    conclusion: thinking.conclusion,
                    next_action: thinking.next_action.clone(),
                })
                .await;
            ctx.history.push(HistoryEntry {
                iteration,
                analysis: thinking.analysis.clone(),
                conclusion: thinking.conclusion,
                action: thinking.next_action.as_ref().map(|a| a.tool.clone()),
                action_success: None,
            });

            if thinking.conclusion == Conclusion::Complete {
                ctx.completed = true;
                ctx.final_output = if thinking.output.is_empty() {
                    thinking.analysis.clone()
                } else {
                    thinking.output.clone()
                };
                break;
            }
            let Some(action) = thinking.next_action else {
                continue;
            };

            // ── ACTION ──
            let result = match self.act(&action).await {
                Ok(result) => result,
                Err(e) => {
                    last_error = Some(e.to_string());
                    self.absorb(e, &mut ctx, recorder).await?;
                    continue;
                }
            };
            recorder
                .record(ModeKind::Action {
                    iteration,
                    action: action.clone(),
                    result: result.result.clone(),
                    success: result.success,
                    duration_ms: result.duration_ms,
                    error: result.error.clone(),
                })
                .await;
            if let Some(entry) = ctx.history.last_mut() {
                entry.action_success = Some(result.success);
            }
            if !result.success {
                failures += 1;
                last_error = result.error.clone();
            }

            // ── OBSERVE ──
            let terminal = self.tools.is_terminal(&action.tool);
            let status = self
                .policy
                .classify(result.success, terminal, failures, iteration);
            let observation = Observation::from_action(&result);
            recorder
                .record(ModeKind::Observe {
                    iteration,
                    observation: observation.clone(),
                    status,
                })
                .await;
            ctx.observations.push(observation);
            last_result = Some(result.result.clone());

            match status {
                ObserveStatus::Complete => {
                    ctx.completed = true;
                    ctx.final_output = render_result(&result.result);
                    break;
                }
                ObserveStatus::Halt => {
                    warn!(iteration, failures, "Agent loop halted by observe policy");
                    break;
                }
                ObserveStatus::Retry | ObserveStatus::Continue => {}
            }
        }

        if !ctx.completed && ctx.final_output.is_empty() {
            ctx.final_output = ctx
                .history
                .last()
                .map(|h| h.analysis.clone())
                .unwrap_or_default();
        }

        let outcome = LoopOutcome {
            completed: ctx.completed,
            summary: summarize(ctx.completed, iterations),
            final_output: ctx.final_output,
            iterations,
            last_result,
            last_error,
        };
        recorder
            .record(ModeKind::Output(outcome.to_final_output()))
            .await;

        info!(
            completed = outcome.completed,
            iterations = outcome.iterations,
            "Agent loop finished"
        );
        Ok(outcome)
    }

    async fn think(
        &self,
        ctx: &LoopContext,
        iteration: u32,
        session_id: &str,
    ) -> Result<ThinkResult, Error> {
        let snippets = self.retriever.retrieve(session_id, &ctx.original_task).await;
        let recent_from = ctx
            .observations
            .len()
            .saturating_sub(self.recent_observations);

        let messages = vec![
            Message::system(prompt::loop_system_prompt(&self.tools)),
            Message::user(prompt::think_prompt(
                &ctx.original_task,
                iteration,
                self.max_iterations,
                &ctx.history,
                &ctx.observations[recent_from..],
                &snippets,
            )),
        ];
        debug!(
            iteration,
            snippets = snippets.len(),
            estimated_tokens = messages.iter().map(Message::estimated_tokens).sum::<usize>(),
            "Thinking"
        );

        let raw = self.provider.chat(&messages, &self.options).await?;
        Ok(parse_think(&raw))
    }

    /// Invoke one tool. Tool errors become a failed [`ActionResult`]; only
    /// an unregistered tool name is an `Err`.
    async fn act(&self, action: &ActionSpec) -> Result<ActionResult, Error> {
        if self.tools.get(&action.tool).is_none() {
            return Err(ToolError::UnknownTool(action.tool.clone()).into());
        }

        let start = Instant::now();
        let outcome = self
            .tools
            .invoke(&action.tool, action.parameters.clone())
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(result) => {
                let success = tool_succeeded(&result);
                let error = if success {
                    None
                } else {
                    Some(
                        result
                            .get("error")
                            .and_then(Value::as_str)
                            .unwrap_or("tool reported failure")
                            .to_string(),
                    )
                };
                ActionResult {
                    tool: action.tool.clone(),
                    parameters: action.parameters.clone(),
                    duration_ms,
                    result,
                    success,
                    error,
                }
            }
            Err(e) => {
                warn!(tool = %action.tool, error = %e, "Tool execution failed");
                ActionResult {
                    tool: action.tool.clone(),
                    parameters: action.parameters.clone(),
                    duration_ms,
                    result: Value::Null,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        };
        Ok(result)
    }

    /// Record an ERROR event. Recoverable errors become an error
    /// observation; fatal ones are handed back.
    async fn absorb(
        &self,
        error: Error,
        ctx: &mut LoopContext,
        recorder: &TraceRecorder,
    ) -> Result<(), Error> {
        let message = error.to_string();
        let recoverable = error.is_recoverable();
        recorder
            .record(ModeKind::Error {
                error: ErrorInfo {
                    message: message.clone(),
                    recoverable,
                },
            })
            .await;

        if recoverable {
            warn!(error = %message, "Recoverable error, continuing");
            ctx.observations.push(Observation::from_error(&message));
            Ok(())
        } else {
            warn!(error = %message, "Fatal error, aborting loop");
            Err(error)
        }
    }
}

/// Read a THINK reply, falling back to a low-confidence CONTINUE.
pub fn parse_think(raw: &str) -> ThinkResult {
    match parse_json_object(raw)
        .as_ref()
        .and_then(ThinkResult::from_value)
    {
        Some(thinking) => thinking,
        None => {
            debug!(chars = raw.len(), "THINK reply was not JSON, using fallback");
            ThinkResult::fallback(raw)
        }
    }
}

/// Text for a tool result that completed the task.
fn render_result(result: &Value) -> String {
    for key in ["content", "stdout", "output"] {
        if let Some(text) = result.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    match result {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn summarize(completed: bool, iterations: u32) -> String {
    let plural = if iterations == 1 { "" } else { "s" };
    if completed {
        format!("Completed in {iterations} iteration{plural}")
    } else {
        format!("Stopped after {iterations} iteration{plural} without completing")
    }
}
