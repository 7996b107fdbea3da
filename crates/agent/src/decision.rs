//! Failure-decision policies consulted by the coordinator.
//!
//! Two decision points exist: a step that has used its whole attempt
//! budget, and a multi-step task whose planning failed. Interactive front
//! ends implement [`DecisionPolicy`] over a prompt; everything else uses
//! [`NonInteractivePolicy`].

use async_trait::async_trait;
use stepwise_core::error::PlanError;
use stepwise_core::plan::{Plan, PlanFailureDecision, Step, StepDecision};

#[async_trait]
pub trait DecisionPolicy: Send + Sync {
    /// `step` has failed its last allowed attempt.
    async fn on_step_exhausted(&self, plan: &Plan, step: &Step) -> StepDecision;

    /// Planning failed for `task`.
    async fn on_plan_failure(&self, task: &str, error: &PlanError) -> PlanFailureDecision;
}

/// Deterministic policy for structured output and unattended runs: abort
/// at both decision points.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePolicy;

#[async_trait]
impl DecisionPolicy for NonInteractivePolicy {
    async fn on_step_exhausted(&self, _plan: &Plan, _step: &Step) -> StepDecision {
        StepDecision::Abort
    }

    async fn on_plan_failure(&self, _task: &str, _error: &PlanError) -> PlanFailureDecision {
        PlanFailureDecision::Abort
    }
}
