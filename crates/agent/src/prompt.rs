//! Prompt construction for the loop, the classifier and the planner.
//!
//! Only the shape matters here: which facts reach the model and which JSON
//! object it is asked to answer with. Replies are read back through
//! [`stepwise_core::json`], so nothing depends on the model obeying exactly.

use stepwise_core::plan::Step;
use stepwise_core::reasoning::{HistoryEntry, Observation};
use stepwise_core::session::Snippet;
use stepwise_core::tool::ToolRegistry;

/// Longest snippet or observation text placed in a prompt, in characters.
const MAX_CONTEXT_CHARS: usize = 600;

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CONTEXT_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_CONTEXT_CHARS).collect();
    clipped.push('…');
    clipped
}

fn tool_lines(tools: &ToolRegistry) -> String {
    tools
        .specs()
        .iter()
        .map(|spec| {
            let marker = if spec.terminal { " (ends the task on success)" } else { "" };
            format!(
                "- {}: {}{}\n  parameters: {}",
                spec.name, spec.description, marker, spec.parameters
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Agent loop ──

/// The fixed system prompt for THINK, listing every registered tool.
pub fn loop_system_prompt(tools: &ToolRegistry) -> String {
    format!(
        "You are a careful task-execution agent. You work in iterations: each time you \
think about the task, then either pick exactly one tool call or declare the task complete.\n\n\
Available tools: {}\n\n{}\n\n\
Respond with a single JSON object and nothing else:\n\
{{\n  \"analysis\": \"what you know so far\",\n  \"considerations\": [\"risks or alternatives\"],\n  \
\"plan\": \"what you will do next\",\n  \"confidence\": \"high|medium|low\",\n  \
\"conclusion\": \"CONTINUE|COMPLETE\",\n  \
\"nextAction\": {{\"tool\": \"<tool name>\", \"parameters\": {{}}}} or null,\n  \
\"output\": \"the final answer when conclusion is COMPLETE\"\n}}",
        tools.names().join(", "),
        tool_lines(tools)
    )
}

/// The per-iteration THINK prompt.
pub fn think_prompt(
    task: &str,
    iteration: u32,
    max_iterations: u32,
    history: &[HistoryEntry],
    observations: &[Observation],
    snippets: &[Snippet],
) -> String {
    let mut prompt = format!("Task: {task}\n\nIteration {iteration} of {max_iterations}.\n");

    if !history.is_empty() {
        prompt.push_str("\nPrevious reasoning:\n");
        for entry in history {
            let action = match (&entry.action, entry.action_success) {
                (Some(tool), Some(true)) => format!(" -> {tool} (succeeded)"),
                (Some(tool), Some(false)) => format!(" -> {tool} (failed)"),
                (Some(tool), None) => format!(" -> {tool}"),
                (None, _) => String::new(),
            };
            prompt.push_str(&format!(
                "{}. [{:?}] {}{}\n",
                entry.iteration,
                entry.conclusion,
                clip(&entry.analysis),
                action
            ));
        }
    }

    if !observations.is_empty() {
        prompt.push_str("\nRecent observations:\n");
        for obs in observations {
            let tool = obs.action_tool.as_deref().unwrap_or("error");
            let status = if obs.action_success { "ok" } else { "failed" };
            prompt.push_str(&format!("- {tool} [{status}]: {}\n", clip(&obs.result.to_string())));
        }
    }

    if !snippets.is_empty() {
        prompt.push_str("\nRelevant session history:\n");
        for snippet in snippets {
            prompt.push_str(&format!(
                "- (#{}, score {:.2}) {}\n",
                snippet.index,
                snippet.score,
                clip(&snippet.text)
            ));
        }
    }

    prompt.push_str("\nDecide the next step. Reply with the JSON object only.");
    prompt
}

// ── Classifier ──

pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You decide whether a task needs a multi-step plan.\n\
A task is multi-step when it chains several operations that depend on each other. \
Strong signals are sequencing words (\"then\", \"after that\", \"first ... finally\", \"and then\"), \
several distinct deliverables, or one operation consuming another's output. \
A single command, a single question or a single file operation is not multi-step.\n\n\
Respond with a single JSON object:\n\
{\"isMultiStep\": true|false, \"reasoning\": \"...\", \"complexity\": \"low|medium|high\", \"estimatedSteps\": <integer>}";

pub fn classifier_prompt(task: &str) -> String {
    format!("Classify this task:\n\n{task}")
}

// ── Planner ──

pub fn planner_system_prompt(tools: &ToolRegistry) -> String {
    format!(
        "You break a task into an ordered list of atomic steps. Each step does one thing \
with one tool, and steps are ordered so that every step only depends on earlier ones.\n\n\
Available tools:\n{}\n\n\
Respond with a single JSON object:\n\
{{\n  \"overallStrategy\": \"...\",\n  \"riskAssessment\": \"...\",\n  \"steps\": [\n    {{\n      \
\"id\": \"1\",\n      \"description\": \"what this step achieves\",\n      \
\"tool\": \"<tool name>\",\n      \"parameters\": {{}},\n      \
\"successCriteria\": \"how to tell the step worked\",\n      \
\"errorHandling\": \"what to do if it fails\"\n    }}\n  ]\n}}",
        tool_lines(tools)
    )
}

pub fn planner_prompt(task: &str, estimated_steps: Option<u32>) -> String {
    match estimated_steps {
        Some(n) => format!("Plan this task (roughly {n} steps expected):\n\n{task}"),
        None => format!("Plan this task:\n\n{task}"),
    }
}

// ── Step scoping ──

/// Reframe a plan step as a stand-alone task for a scoped loop.
pub fn step_task(original_task: &str, step: &Step, index: usize, total: usize) -> String {
    let mut task = format!(
        "Step {} of {} in the larger task \"{}\".\n\nGoal: {}\nSuggested tool: {}\nSuggested parameters: {}",
        index + 1,
        total,
        original_task,
        step.description,
        step.tool,
        step.parameters
    );
    if !step.success_criteria.is_empty() {
        task.push_str(&format!("\nSuccess criteria: {}", step.success_criteria));
    }
    if !step.error_handling.is_empty() {
        task.push_str(&format!("\nIf it fails: {}", step.error_handling));
    }
    if let Some(error) = &step.error {
        task.push_str(&format!("\nThe previous attempt failed with: {error}"));
    }
    task
}
