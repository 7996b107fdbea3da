//! Mode events — the structured trace of every orchestration transition.
//!
//! Each event is one timestamped record tagged by `mode`. Events are
//! appended to the session log (one JSON object per line) and fanned out
//! on an [`EventBus`] for live rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::plan::{PlanStatus, StepDecision, StepStatus};
use crate::reasoning::{
    ActionSpec, Classification, Conclusion, Observation, ObserveStatus, ThinkResult,
};

/// Whether a loop runs a whole task or one plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopScope {
    Task,
    Step,
}

/// Lifecycle markers carried by `PLAN` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanPhase {
    Creating,
    Created,
    Failed,
    /// Planning failed and the task fell back to a single loop.
    Fallback,
    Resumed,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    pub recoverable: bool,
}

/// The final result of a task, a step or a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalOutput {
    pub final_output: String,
    pub summary: String,
    pub completed: bool,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_status: Option<PlanStatus>,
}

/// The mode-specific body of a [`ModeEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "mode",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ModeKind {
    Start {
        task: String,
        scope: LoopScope,
        max_iterations: u32,
    },
    Think {
        iteration: u32,
        thinking: ThinkResult,
        conclusion: Conclusion,
        next_action: Option<ActionSpec>,
    },
    Action {
        iteration: u32,
        action: ActionSpec,
        result: Value,
        success: bool,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Observe {
        iteration: u32,
        observation: Observation,
        status: ObserveStatus,
    },
    Output(FinalOutput),
    Error {
        error: ErrorInfo,
    },
    Classify {
        classification: Classification,
    },
    Plan {
        status: PlanPhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plan_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ExecuteStep {
        plan_id: String,
        step_id: String,
        step_index: usize,
        attempt: u32,
        from: StepStatus,
        to: StepStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    StepDecision {
        plan_id: String,
        step_id: String,
        decision: StepDecision,
    },
}

impl ModeKind {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Start { .. } => "START",
            Self::Think { .. } => "THINK",
            Self::Action { .. } => "ACTION",
            Self::Observe { .. } => "OBSERVE",
            Self::Output(_) => "OUTPUT",
            Self::Error { .. } => "ERROR",
            Self::Classify { .. } => "CLASSIFY",
            Self::Plan { .. } => "PLAN",
            Self::ExecuteStep { .. } => "EXECUTE_STEP",
            Self::StepDecision { .. } => "STEP_DECISION",
        }
    }
}

/// One immutable, timestamped trace record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ModeKind,
}

impl ModeEvent {
    pub fn new(kind: ModeKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn mode(&self) -> &'static str {
        self.kind.mode()
    }

    /// The event as a JSON object, as written to the session log.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "mode": self.mode(),
                "timestamp": self.timestamp,
                "serializationError": e.to_string(),
            })
        })
    }
}

/// A broadcast-based bus for mode events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Lagging or
/// absent subscribers never block the publisher.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ModeEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: Arc<ModeEvent>) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ModeEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
