//! Plans and Steps — the multi-step execution state machine's data.
//!
//! A [`Step`] only moves along the legal edges
//!
//! ```text
//! PENDING → EXECUTING → { COMPLETED | FAILED | SKIPPED }
//! FAILED  → PENDING            (explicit re-arm)
//! ```
//!
//! Every mutation goes through a checked method that rejects any other
//! edge with [`PlanError::IllegalTransition`] and leaves the step untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::PlanError;

/// Default attempt budget per step.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether `self → next` is one of the legal edges.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Executing, Self::Completed)
                | (Self::Executing, Self::Failed)
                | (Self::Executing, Self::Skipped)
                | (Self::Failed, Self::Pending)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic unit of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub description: String,
    pub tool: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub success_criteria: String,
    #[serde(default)]
    pub error_handling: String,
    pub status: StepStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Step {
    /// A fresh PENDING step.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tool: tool.into(),
            parameters: Value::Object(serde_json::Map::new()),
            success_criteria: String::new(),
            error_handling: String::new(),
            status: StepStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            started_at: None,
            completed_at: None,
            failed_at: None,
            skipped_at: None,
            result: None,
            error: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Whether another attempt fits in the budget.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    fn transition(&mut self, to: StepStatus) -> Result<(), PlanError> {
        if !self.status.can_transition_to(to) {
            return Err(PlanError::IllegalTransition {
                step_id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// PENDING → EXECUTING. Consumes one attempt.
    pub fn begin(&mut self) -> Result<(), PlanError> {
        if self.status == StepStatus::Pending && !self.has_attempts_left() {
            return Err(PlanError::AttemptsExhausted {
                step_id: self.id.clone(),
                attempts: self.attempts,
                max_attempts: self.max_attempts,
            });
        }
        self.transition(StepStatus::Executing)?;
        self.attempts += 1;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// EXECUTING → COMPLETED.
    pub fn complete(&mut self, result: Value) -> Result<(), PlanError> {
        self.transition(StepStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        self.error = None;
        Ok(())
    }

    /// EXECUTING → FAILED.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), PlanError> {
        self.transition(StepStatus::Failed)?;
        self.failed_at = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    /// EXECUTING → SKIPPED.
    pub fn skip(&mut self) -> Result<(), PlanError> {
        self.transition(StepStatus::Skipped)?;
        self.skipped_at = Some(Utc::now());
        Ok(())
    }

    /// FAILED → PENDING. Only allowed while attempts remain; call
    /// [`Step::reset_attempts`] first to grant a fresh budget.
    pub fn rearm(&mut self) -> Result<(), PlanError> {
        if self.status == StepStatus::Failed && !self.has_attempts_left() {
            return Err(PlanError::AttemptsExhausted {
                step_id: self.id.clone(),
                attempts: self.attempts,
                max_attempts: self.max_attempts,
            });
        }
        self.transition(StepStatus::Pending)
    }

    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }
}

/// Aggregate status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    InProgress,
    CompletedSuccessfully,
    CompletedWithFailures,
    Aborted,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::CompletedSuccessfully => "COMPLETED_SUCCESSFULLY",
            Self::CompletedWithFailures => "COMPLETED_WITH_FAILURES",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_plan_status() -> PlanStatus {
    PlanStatus::InProgress
}

/// An ordered decomposition of a multi-step task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_id: String,
    pub original_task: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub overall_strategy: String,
    #[serde(default)]
    pub risk_assessment: String,
    #[serde(default = "default_plan_status")]
    pub status: PlanStatus,
}

impl Plan {
    pub fn new(plan_id: impl Into<String>, original_task: impl Into<String>, steps: Vec<Step>) -> Self {
        let now = Utc::now();
        Self {
            plan_id: plan_id.into(),
            original_task: original_task.into(),
            created_at: now,
            updated_at: now,
            steps,
            overall_strategy: String::new(),
            risk_assessment: String::new(),
            status: PlanStatus::InProgress,
        }
    }

    /// Index of the first step that still needs work.
    pub fn resume_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| !s.status.is_terminal())
    }

    pub fn all_terminal(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }

    /// The status implied by the steps. `aborted` wins over everything.
    pub fn aggregate_status(&self, aborted: bool) -> PlanStatus {
        if aborted {
            PlanStatus::Aborted
        } else if !self.all_terminal() {
            PlanStatus::InProgress
        } else if self.steps.iter().any(|s| s.status == StepStatus::Failed) {
            PlanStatus::CompletedWithFailures
        } else {
            PlanStatus::CompletedSuccessfully
        }
    }

    /// A finished plan is immutable. ABORTED plans stay resumable.
    pub fn is_finished(&self) -> bool {
        self.status != PlanStatus::Aborted && self.all_terminal()
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            id: self.plan_id.clone(),
            task: self.original_task.clone(),
            created: self.created_at,
            steps: self.steps.len(),
            status: self.status,
        }
    }
}

/// One row of `listPlans`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub id: String,
    pub task: String,
    pub created: DateTime<Utc>,
    pub steps: usize,
    pub status: PlanStatus,
}

// ── Decisions ──

/// What to do with a step that has used its whole attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepDecision {
    /// Grant a fresh attempt budget and run the step again.
    Retry,
    Skip,
    /// Leave the step FAILED and move on.
    ContinueAsFailed,
    Abort,
}

/// What to do when a plan cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanFailureDecision {
    Abort,
    /// Run the whole task through a single agent loop instead.
    RunAsSingleTask,
}

// ── Persistence ──

/// Keyed durable storage for plans.
///
/// Implementations assume a single writer per plan id. Two coordinators
/// driving the same plan concurrently can overwrite each other's updates.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn save(&self, plan: &Plan) -> Result<(), PlanError>;

    async fn load(&self, plan_id: &str) -> Result<Option<Plan>, PlanError>;

    /// All stored plans, newest first.
    async fn list(&self) -> Result<Vec<Plan>, PlanError>;
}
