//! Terminal rendering of mode events.
//!
//! `--json` prints every event as one JSON line on stdout. Otherwise each
//! event becomes one or more human-readable lines.

use stepwise_core::event::{LoopScope, ModeEvent, ModeKind, PlanPhase};
use stepwise_core::reasoning::Conclusion;

const PREVIEW_CHARS: usize = 160;

pub fn emit(event: &ModeEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, mode = event.mode(), "Could not serialise event"),
        }
    } else {
        println!("{}", render_text(event));
    }
}

pub fn render_text(event: &ModeEvent) -> String {
    match &event.kind {
        ModeKind::Start {
            task,
            scope,
            max_iterations,
        } => match scope {
            LoopScope::Task => format!("🚀 {task} (up to {max_iterations} iterations)"),
            LoopScope::Step => format!("   ▶️  {} (up to {max_iterations} iterations)", preview(task)),
        },
        ModeKind::Think {
            iteration,
            thinking,
            conclusion,
            next_action,
        } => {
            let next = match (conclusion, next_action) {
                (Conclusion::Complete, _) => "complete".to_string(),
                (Conclusion::Continue, Some(action)) => format!("next: {}", action.tool),
                (Conclusion::Continue, None) => "continue".to_string(),
            };
            format!(
                "   🤔 [{iteration}] {} ({next}, {:?} confidence)",
                preview(&thinking.analysis),
                thinking.confidence
            )
        }
        ModeKind::Action {
            iteration,
            action,
            success,
            duration_ms,
            error,
            ..
        } => {
            let mark = if *success { "✅" } else { "❌" };
            let mut line = format!("   🔧 [{iteration}] {} {mark} ({duration_ms} ms)", action.tool);
            if let Some(error) = error {
                line.push_str(&format!(": {}", preview(error)));
            }
            line
        }
        ModeKind::Observe {
            iteration, status, ..
        } => format!("   👀 [{iteration}] {status:?}"),
        ModeKind::Output(output) => {
            let mark = if output.completed { "✅" } else { "⚠️ " };
            if output.final_output.is_empty() {
                format!("{mark} {}", output.summary)
            } else {
                format!("{mark} {}\n\n{}\n", output.summary, output.final_output)
            }
        }
        ModeKind::Error { error } => {
            let kind = if error.recoverable { "recoverable" } else { "fatal" };
            format!("   ❗ {} ({kind})", error.message)
        }
        ModeKind::Classify { classification } => {
            if classification.is_multi_step {
                format!(
                    "🧭 Multi-step task, ~{} steps ({:?} complexity)",
                    classification.estimated_steps, classification.complexity
                )
            } else {
                "🧭 Single-step task".to_string()
            }
        }
        ModeKind::Plan {
            status,
            plan_id,
            message,
        } => {
            let id = plan_id.as_deref().unwrap_or("-");
            let detail = message.as_deref().map(|m| format!(": {m}")).unwrap_or_default();
            match status {
                PlanPhase::Creating => "📝 Planning...".to_string(),
                PlanPhase::Created => format!("📋 Plan {id} created{detail}"),
                PlanPhase::Failed => format!("❌ Planning failed{detail}"),
                PlanPhase::Fallback => format!("↩️  Running as a single task{detail}"),
                PlanPhase::Resumed => format!("🔁 Resuming plan {id}{detail}"),
                PlanPhase::Completed => format!("🏁 Plan {id}{detail}"),
            }
        }
        ModeKind::ExecuteStep {
            step_id,
            attempt,
            from,
            to,
            error,
            ..
        } => {
            let mut line = format!("  📌 Step {step_id} (attempt {attempt}): {from} → {to}");
            if let Some(error) = error {
                line.push_str(&format!(" ({})", preview(error)));
            }
            line
        }
        ModeKind::StepDecision {
            step_id, decision, ..
        } => format!("  🧑‍⚖️ Step {step_id}: {decision:?}"),
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}
