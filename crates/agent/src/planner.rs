//! Planner — one LLM call that decomposes a task into a persisted [`Plan`].
//!
//! Every step is normalized on the way in (`PENDING`, zero attempts, the
//! configured attempt budget, `executeCommand` when no tool is named, id
//! defaulted to its 1-based position). A reply without a usable `steps`
//! array is a planning failure; no empty plan is ever produced.

use serde_json::{Map, Value};
use std::sync::Arc;
use stepwise_core::error::PlanError;
use stepwise_core::json::parse_json_object;
use stepwise_core::message::Message;
use stepwise_core::plan::{DEFAULT_MAX_ATTEMPTS, Plan, PlanStore, Step};
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::reasoning::Classification;
use stepwise_core::session::is_safe_key;
use stepwise_core::tool::ToolRegistry;
use tracing::{info, warn};

use crate::prompt;

/// Tool assigned to steps that do not name one.
pub const DEFAULT_STEP_TOOL: &str = "executeCommand";

pub struct Planner {
    provider: Arc<dyn Provider>,
    options: ChatOptions,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn PlanStore>,
    max_attempts: u32,
}

impl Planner {
    pub fn new(
        provider: Arc<dyn Provider>,
        options: ChatOptions,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn PlanStore>,
    ) -> Self {
        Self {
            provider,
            options,
            tools,
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Attempt budget given to every new step.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Ask the model for a plan, normalize it and persist it.
    pub async fn create_plan(
        &self,
        task: &str,
        classification: Option<&Classification>,
    ) -> Result<Plan, PlanError> {
        let messages = [
            Message::system(prompt::planner_system_prompt(&self.tools)),
            Message::user(prompt::planner_prompt(
                task,
                classification.map(|c| c.estimated_steps),
            )),
        ];

        let raw = self
            .provider
            .chat(&messages, &self.options)
            .await
            .map_err(|e| PlanError::PlanningFailed(format!("LLM call failed: {e}")))?;

        let mut plan = self.parse_plan(task, &raw)?;
        // Model-chosen ids are reused across tasks; never overwrite a stored plan
        if !matches!(self.store.load(&plan.plan_id).await, Ok(None)) {
            let fresh = new_plan_id();
            info!(requested = %plan.plan_id, assigned = %fresh, "Plan id already in use");
            plan.plan_id = fresh;
        }
        if let Err(e) = self.store.save(&plan).await {
            warn!(plan_id = %plan.plan_id, error = %e, "Failed to persist new plan");
        }

        info!(plan_id = %plan.plan_id, steps = plan.steps.len(), "Plan created");
        Ok(plan)
    }

    /// Build a normalized plan from a raw model reply.
    pub fn parse_plan(&self, task: &str, raw: &str) -> Result<Plan, PlanError> {
        let value = parse_json_object(raw).ok_or_else(|| {
            PlanError::PlanningFailed("no JSON object in planner reply".into())
        })?;

        let raw_steps = match value.get("steps") {
            Some(Value::Array(steps)) if !steps.is_empty() => steps,
            Some(Value::Array(_)) => {
                return Err(PlanError::PlanningFailed("plan has no steps".into()));
            }
            _ => {
                return Err(PlanError::PlanningFailed(
                    "planner reply has no steps array".into(),
                ));
            }
        };

        let steps = raw_steps
            .iter()
            .enumerate()
            .map(|(i, raw)| self.normalize_step(i, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let plan_id = value
            .get("planId")
            .and_then(Value::as_str)
            .filter(|id| is_safe_key(id))
            .map(str::to_string)
            .unwrap_or_else(new_plan_id);

        let mut plan = Plan::new(plan_id, task, steps);
        plan.overall_strategy = text(value.as_object(), "overallStrategy");
        plan.risk_assessment = text(value.as_object(), "riskAssessment");
        Ok(plan)
    }

    fn normalize_step(&self, index: usize, raw: &Value) -> Result<Step, PlanError> {
        let obj = raw.as_object().ok_or_else(|| {
            PlanError::PlanningFailed(format!("step {} is not an object", index + 1))
        })?;

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => (index + 1).to_string(),
        };
        let tool = obj
            .get("tool")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_STEP_TOOL);
        let mut description = text(Some(obj), "description");
        if description.is_empty() {
            description = format!("Step {}", index + 1);
        }
        let parameters = obj
            .get("parameters")
            .filter(|p| p.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let mut step = Step::new(id, description, tool)
            .with_parameters(parameters)
            .with_max_attempts(self.max_attempts);
        step.success_criteria = text(Some(obj), "successCriteria");
        step.error_handling = text(Some(obj), "errorHandling");
        Ok(step)
    }
}

fn text(obj: Option<&Map<String, Value>>, key: &str) -> String {
    obj.and_then(|o| o.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn new_plan_id() -> String {
    format!("plan-{}", uuid::Uuid::new_v4())
}
