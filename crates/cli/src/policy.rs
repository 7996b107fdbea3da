//! Interactive decision policy: asks on the terminal when a step runs out
//! of attempts or a plan cannot be created.

use async_trait::async_trait;
use std::io::{BufRead, Write};
use stepwise_agent::DecisionPolicy;
use stepwise_core::error::PlanError;
use stepwise_core::plan::{Plan, PlanFailureDecision, Step, StepDecision};
use tracing::warn;

/// Prompts on stdin. End of input or an unreadable answer aborts.
pub struct StdinPolicy;

#[async_trait]
impl DecisionPolicy for StdinPolicy {
    async fn on_step_exhausted(&self, plan: &Plan, step: &Step) -> StepDecision {
        // Let the renderer print events published before this prompt
        tokio::task::yield_now().await;

        let error = step.error.as_deref().unwrap_or("unknown error");
        let prompt = format!(
            "\n  ⚠️  Step {} of plan {} failed after {} attempt(s)\n      {}\n      error: {}\n\n  [r]etry / [s]kip / [c]ontinue as failed / [a]bort > ",
            step.id, plan.plan_id, step.attempts, step.description, error
        );
        match ask(prompt).await {
            Some(answer) => parse_step_decision(&answer).unwrap_or_else(|| {
                warn!(answer = %answer, "Unrecognised answer, aborting");
                StepDecision::Abort
            }),
            None => StepDecision::Abort,
        }
    }

    async fn on_plan_failure(&self, task: &str, error: &PlanError) -> PlanFailureDecision {
        tokio::task::yield_now().await;

        let prompt = format!(
            "\n  ⚠️  Could not plan \"{task}\"\n      error: {error}\n\n  run as a [s]ingle task / [a]bort > "
        );
        match ask(prompt).await {
            Some(answer) => parse_plan_failure_decision(&answer).unwrap_or_else(|| {
                warn!(answer = %answer, "Unrecognised answer, aborting");
                PlanFailureDecision::Abort
            }),
            None => PlanFailureDecision::Abort,
        }
    }
}

/// Print `prompt` and read one line. `None` on end of input or a read error.
async fn ask(prompt: String) -> Option<String> {
    let read = tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{prompt}");
        let _ = stdout.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await;
    read.ok().flatten()
}

pub fn parse_step_decision(answer: &str) -> Option<StepDecision> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "r" | "retry" => Some(StepDecision::Retry),
        "s" | "skip" => Some(StepDecision::Skip),
        "c" | "continue" => Some(StepDecision::ContinueAsFailed),
        "a" | "abort" => Some(StepDecision::Abort),
        _ => None,
    }
}

pub fn parse_plan_failure_decision(answer: &str) -> Option<PlanFailureDecision> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "s" | "single" => Some(PlanFailureDecision::RunAsSingleTask),
        "a" | "abort" => Some(PlanFailureDecision::Abort),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_answers() {
        assert_eq!(parse_step_decision("r\n"), Some(StepDecision::Retry));
        assert_eq!(parse_step_decision(" Skip "), Some(StepDecision::Skip));
        assert_eq!(parse_step_decision("c"), Some(StepDecision::ContinueAsFailed));
        assert_eq!(parse_step_decision("ABORT"), Some(StepDecision::Abort));
        assert_eq!(parse_step_decision(""), None);
        assert_eq!(parse_step_decision("maybe"), None);
    }

    #[test]
    fn plan_failure_answers() {
        assert_eq!(
            parse_plan_failure_decision("s"),
            Some(PlanFailureDecision::RunAsSingleTask)
        );
        assert_eq!(
            parse_plan_failure_decision("abort\n"),
            Some(PlanFailureDecision::Abort)
        );
        assert_eq!(parse_plan_failure_decision("r"), None);
    }
}
