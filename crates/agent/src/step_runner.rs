//! Step runner — one plan step through a step-scoped agent loop.

use serde_json::{Value, json};
use stepwise_core::event::LoopScope;
use stepwise_core::plan::Plan;
use tracing::{debug, warn};

use crate::loop_runner::LoopRunner;
use crate::prompt;
use crate::recorder::TraceRecorder;

/// How one attempt at a step ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The scoped loop reached COMPLETE. Carries the step result.
    Succeeded(Value),
    /// Anything else, including a fatal loop error. Carries the message
    /// recorded on the step.
    Failed(String),
}

pub struct StepRunner {
    runner: LoopRunner,
}

impl StepRunner {
    /// `runner` should already carry the per-step iteration cap.
    pub fn new(runner: LoopRunner) -> Self {
        Self { runner }
    }

    /// Run one attempt at `plan.steps[index]`. Never returns an error: a
    /// fatal error inside the loop is a failed attempt.
    pub async fn run_step(&self, plan: &Plan, index: usize, recorder: &TraceRecorder) -> StepOutcome {
        let step = &plan.steps[index];
        let task = prompt::step_task(&plan.original_task, step, index, plan.steps.len());
        debug!(plan_id = %plan.plan_id, step_id = %step.id, attempt = step.attempts, "Running step");

        match self.runner.run(&task, LoopScope::Step, recorder).await {
            Ok(outcome) if outcome.completed => StepOutcome::Succeeded(json!({
                "output": outcome.final_output,
                "iterations": outcome.iterations,
                "lastResult": outcome.last_result,
            })),
            Ok(outcome) => {
                let mut message = format!(
                    "step did not complete within {} iterations",
                    outcome.iterations
                );
                if let Some(error) = outcome.last_error {
                    message.push_str(&format!(" (last error: {error})"));
                }
                StepOutcome::Failed(message)
            }
            Err(e) => {
                warn!(plan_id = %plan.plan_id, step_id = %step.id, error = %e, "Step loop failed");
                StepOutcome::Failed(e.to_string())
            }
        }
    }
}
