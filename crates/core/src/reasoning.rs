//! Value types produced by one THINK → ACTION → OBSERVE iteration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How sure the model is about its current reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Case-insensitive parse; unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Whether the model wants another iteration or is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conclusion {
    Continue,
    Complete,
}

impl Conclusion {
    /// Case-insensitive parse; unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONTINUE" => Some(Self::Continue),
            "COMPLETE" | "COMPLETED" | "DONE" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub tool: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// The parsed outcome of a THINK phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkResult {
    pub analysis: String,
    pub considerations: Vec<String>,
    pub plan: String,
    pub confidence: Confidence,
    pub conclusion: Conclusion,
    pub next_action: Option<ActionSpec>,
    pub output: String,
}

impl ThinkResult {
    /// Read a ThinkResult out of an already-extracted JSON object.
    ///
    /// Every field is optional on the wire. Returns `None` only when the
    /// value is not an object. A missing or unreadable conclusion becomes
    /// `CONTINUE`, and a missing confidence becomes `medium`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| -> String {
            match obj.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };

        let considerations = match obj.get("considerations") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        };

        let next_action = obj
            .get("nextAction")
            .or_else(|| obj.get("next_action"))
            .and_then(|a| {
                let tool = a.get("tool")?.as_str()?.trim();
                if tool.is_empty() {
                    return None;
                }
                let parameters = a
                    .get("parameters")
                    .filter(|p| !p.is_null())
                    .cloned()
                    .unwrap_or_else(empty_object);
                Some(ActionSpec {
                    tool: tool.to_string(),
                    parameters,
                })
            });

        Some(Self {
            analysis: text("analysis"),
            considerations,
            plan: text("plan"),
            confidence: obj
                .get("confidence")
                .and_then(Value::as_str)
                .and_then(Confidence::parse)
                .unwrap_or(Confidence::Medium),
            conclusion: obj
                .get("conclusion")
                .and_then(Value::as_str)
                .and_then(Conclusion::parse)
                .unwrap_or(Conclusion::Continue),
            next_action,
            output: text("output"),
        })
    }

    /// The low-confidence CONTINUE result used when the model's reply
    /// cannot be read.
    pub fn fallback(raw: &str) -> Self {
        let analysis: String = raw.chars().take(500).collect();
        Self {
            analysis,
            considerations: vec!["Model response could not be parsed as JSON".into()],
            plan: String::new(),
            confidence: Confidence::Low,
            conclusion: Conclusion::Continue,
            next_action: None,
            output: String::new(),
        }
    }
}

/// The outcome of an ACTION phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub tool: String,
    pub parameters: Value,
    pub duration_ms: u64,
    pub result: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the loop learned from one action (or from a recoverable error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub action_success: bool,
    /// `None` for error-observations that did not come from a tool call.
    pub action_tool: Option<String>,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn from_action(action: &ActionResult) -> Self {
        let result = match &action.error {
            Some(err) if action.result.is_null() => serde_json::json!({ "error": err }),
            _ => action.result.clone(),
        };
        Self {
            action_success: action.success,
            action_tool: Some(action.tool.clone()),
            result,
            timestamp: Utc::now(),
        }
    }

    /// An observation recording a recoverable runtime error.
    pub fn from_error(message: &str) -> Self {
        Self {
            action_success: false,
            action_tool: None,
            result: serde_json::json!({ "error": message }),
            timestamp: Utc::now(),
        }
    }
}

/// One line of a loop's running history, fed back into later prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub iteration: u32,
    pub analysis: String,
    pub conclusion: Conclusion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_success: Option<bool>,
}

/// The OBSERVE policy's verdict on how the loop proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObserveStatus {
    /// The action failed but the failure budget is not spent; think again.
    Retry,
    Continue,
    /// A terminal tool succeeded; the task is done.
    Complete,
    /// The observe iteration cap was reached without completion.
    Halt,
}

// ── Classification ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Whether a task needs a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub is_multi_step: bool,
    pub reasoning: String,
    pub complexity: Complexity,
    pub estimated_steps: u32,
}

impl Classification {
    /// The single-step default used whenever classification fails.
    pub fn single_step(reasoning: impl Into<String>) -> Self {
        Self {
            is_multi_step: false,
            reasoning: reasoning.into(),
            complexity: Complexity::Low,
            estimated_steps: 1,
        }
    }

    /// Read a classification from an extracted JSON object.
    ///
    /// `isMultiStep` must be present as a boolean; the other fields fall
    /// back to defaults.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let is_multi_step = obj
            .get("isMultiStep")
            .or_else(|| obj.get("is_multi_step"))?
            .as_bool()?;
        let estimated_steps = obj
            .get("estimatedSteps")
            .or_else(|| obj.get("estimated_steps"))
            .and_then(Value::as_u64)
            .map(|n| n.clamp(1, u32::MAX as u64) as u32)
            .unwrap_or(if is_multi_step { 2 } else { 1 });
        Some(Self {
            is_multi_step,
            reasoning: obj
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            complexity: obj
                .get("complexity")
                .and_then(Value::as_str)
                .and_then(Complexity::parse)
                .unwrap_or(Complexity::Low),
            estimated_steps,
        })
    }
}
