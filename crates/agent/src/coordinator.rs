//! Plan coordinator — the orchestration entry points.
//!
//! ```text
//! task → classify ─┬─ single-step → agent loop → OUTPUT
//!                  └─ multi-step  → planner → run plan → OUTPUT
//!                                     │
//!                                     └─ failed → policy: abort | run as single task
//! ```
//!
//! Running a plan walks its steps in order. Each non-terminal step goes
//! through a step-scoped loop; every status change is persisted to the
//! plan store and recorded as an EXECUTE_STEP event. Execution is strictly
//! sequential.

use std::sync::Arc;
use stepwise_config::AgentConfig;
use stepwise_core::error::{Error, PlanError};
use stepwise_core::event::{ErrorInfo, EventBus, FinalOutput, LoopScope, ModeKind, PlanPhase};
use stepwise_core::plan::{
    Plan, PlanFailureDecision, PlanStatus, PlanStore, PlanSummary, Step, StepDecision, StepStatus,
};
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::reasoning::{Classification, Complexity};
use stepwise_core::session::{SessionStore, validate_session_id};
use stepwise_core::tool::ToolRegistry;
use stepwise_memory::Retriever;
use tracing::{info, warn};

use crate::classifier::TaskClassifier;
use crate::decision::{DecisionPolicy, NonInteractivePolicy};
use crate::loop_runner::LoopRunner;
use crate::observe::ObservePolicy;
use crate::planner::Planner;
use crate::recorder::TraceRecorder;
use crate::step_runner::{StepOutcome, StepRunner};

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// How a task is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskMode {
    /// Ask the classifier.
    #[default]
    Auto,
    SingleStep,
    MultiStep,
}

/// Per-call options for [`Coordinator::execute`] and
/// [`Coordinator::resume_plan`].
#[derive(Clone)]
pub struct ExecuteOptions {
    pub session_id: String,
    pub mode: TaskMode,
    pub policy: Arc<dyn DecisionPolicy>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID.into(),
            mode: TaskMode::Auto,
            policy: Arc::new(NonInteractivePolicy),
        }
    }
}

impl ExecuteOptions {
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_mode(mut self, mode: TaskMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn DecisionPolicy>) -> Self {
        self.policy = policy;
        self
    }
}

/// Routes tasks to the loop or the planner and drives plans to completion.
pub struct Coordinator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    retriever: Arc<Retriever>,
    plans: Arc<dyn PlanStore>,
    bus: Arc<EventBus>,
    options: ChatOptions,
    agent: AgentConfig,
}

impl Coordinator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        retriever: Arc<Retriever>,
        plans: Arc<dyn PlanStore>,
        options: ChatOptions,
    ) -> Self {
        Self {
            provider,
            tools,
            retriever,
            plans,
            bus: Arc::new(EventBus::default()),
            options,
            agent: AgentConfig::default(),
        }
    }

    /// Share an event bus with the caller (for live rendering).
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Iteration caps, attempt budget and observe thresholds.
    pub fn with_agent_config(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn sessions(&self) -> Arc<dyn SessionStore> {
        Arc::clone(self.retriever.store())
    }

    fn observe_policy(&self) -> ObservePolicy {
        ObservePolicy {
            max_failed_observations: self.agent.max_failed_observations,
            iteration_cap: self.agent.observe_iteration_cap,
        }
    }

    fn loop_runner(&self, max_iterations: u32) -> LoopRunner {
        LoopRunner::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.tools),
            Arc::clone(&self.retriever),
            self.options.clone(),
        )
        .with_max_iterations(max_iterations)
        .with_observe_policy(self.observe_policy())
        .with_recent_observations(self.agent.recent_observations)
    }

    fn planner(&self) -> Planner {
        Planner::new(
            Arc::clone(&self.provider),
            self.options.clone(),
            Arc::clone(&self.tools),
            Arc::clone(&self.plans),
        )
        .with_max_attempts(self.agent.max_step_attempts)
    }

    fn recorder(&self, opts: &ExecuteOptions) -> Result<TraceRecorder, Error> {
        validate_session_id(&opts.session_id)?;
        Ok(TraceRecorder::new(
            self.sessions(),
            Arc::clone(&self.bus),
            opts.session_id.clone(),
        ))
    }

    // ── Entry points ──

    /// Run a task end to end.
    ///
    /// Returns `Err` for fatal errors in a single-step run and for a
    /// planning failure the policy chose to abort. A plan that ends
    /// ABORTED is an `Ok` output with `plan_status = ABORTED`.
    pub async fn execute(&self, task: &str, opts: &ExecuteOptions) -> Result<FinalOutput, Error> {
        let recorder = self.recorder(opts)?;
        info!(session = %opts.session_id, mode = ?opts.mode, "Executing task");

        let classification = match opts.mode {
            TaskMode::Auto => {
                let classification =
                    TaskClassifier::new(Arc::clone(&self.provider), self.options.clone())
                        .classify(task)
                        .await;
                recorder
                    .record(ModeKind::Classify {
                        classification: classification.clone(),
                    })
                    .await;
                classification
            }
            TaskMode::SingleStep => Classification::single_step("Single-step mode requested"),
            TaskMode::MultiStep => Classification {
                is_multi_step: true,
                reasoning: "Multi-step mode requested".into(),
                complexity: Complexity::Medium,
                estimated_steps: 2,
            },
        };

        if !classification.is_multi_step {
            return self.run_single(task, &recorder).await;
        }

        recorder
            .record(ModeKind::Plan {
                status: PlanPhase::Creating,
                plan_id: None,
                message: None,
            })
            .await;

        match self.planner().create_plan(task, Some(&classification)).await {
            Ok(plan) => {
                recorder
                    .record(ModeKind::Plan {
                        status: PlanPhase::Created,
                        plan_id: Some(plan.plan_id.clone()),
                        message: Some(format!("{} steps", plan.steps.len())),
                    })
                    .await;
                self.run_plan(plan, opts, &recorder).await
            }
            Err(e) => {
                warn!(error = %e, "Planning failed");
                recorder
                    .record(ModeKind::Plan {
                        status: PlanPhase::Failed,
                        plan_id: None,
                        message: Some(e.to_string()),
                    })
                    .await;
                match opts.policy.on_plan_failure(task, &e).await {
                    PlanFailureDecision::RunAsSingleTask => {
                        recorder
                            .record(ModeKind::Plan {
                                status: PlanPhase::Fallback,
                                plan_id: None,
                                message: Some("Running as a single task".into()),
                            })
                            .await;
                        self.run_single(task, &recorder).await
                    }
                    PlanFailureDecision::Abort => {
                        let error = Error::from(e);
                        record_fatal(&recorder, &error).await;
                        Err(error)
                    }
                }
            }
        }
    }

    /// Continue a stored plan from its last persisted state.
    pub async fn resume_plan(
        &self,
        plan_id: &str,
        opts: &ExecuteOptions,
    ) -> Result<FinalOutput, Error> {
        let recorder = self.recorder(opts)?;
        let mut plan = self
            .plans
            .load(plan_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;

        if plan.is_finished() {
            info!(plan_id, status = %plan.status, "Plan already finished");
            let output = plan_output(&plan);
            recorder
                .record(ModeKind::Plan {
                    status: PlanPhase::Completed,
                    plan_id: Some(plan.plan_id.clone()),
                    message: Some("Plan already finished".into()),
                })
                .await;
            recorder.record(ModeKind::Output(output.clone())).await;
            return Ok(output);
        }

        info!(plan_id, status = %plan.status, "Resuming plan");
        recorder
            .record(ModeKind::Plan {
                status: PlanPhase::Resumed,
                plan_id: Some(plan.plan_id.clone()),
                message: plan.resume_index().map(|i| format!("from step {}", i + 1)),
            })
            .await;

        for index in 0..plan.steps.len() {
            match plan.steps[index].status {
                StepStatus::Executing => {
                    self.transition(&mut plan, index, &recorder, |s| {
                        s.fail("interrupted before completion")
                    })
                    .await?;
                    self.transition(&mut plan, index, &recorder, |s| {
                        s.reset_attempts();
                        s.rearm()
                    })
                    .await?;
                }
                StepStatus::Failed => {
                    self.transition(&mut plan, index, &recorder, |s| {
                        s.reset_attempts();
                        s.rearm()
                    })
                    .await?;
                }
                StepStatus::Pending if !plan.steps[index].has_attempts_left() => {
                    plan.steps[index].reset_attempts();
                }
                _ => {}
            }
        }

        plan.status = PlanStatus::InProgress;
        self.persist(&mut plan).await;
        self.run_plan(plan, opts, &recorder).await
    }

    /// Stored plans, newest first.
    pub async fn list_plans(&self) -> Result<Vec<PlanSummary>, Error> {
        Ok(self
            .plans
            .list()
            .await?
            .iter()
            .map(Plan::summary)
            .collect())
    }

    // ── Internals ──

    async fn run_single(&self, task: &str, recorder: &TraceRecorder) -> Result<FinalOutput, Error> {
        self.loop_runner(self.agent.max_iterations)
            .run(task, LoopScope::Task, recorder)
            .await
            .map(|outcome| outcome.to_final_output())
    }

    async fn run_plan(
        &self,
        mut plan: Plan,
        opts: &ExecuteOptions,
        recorder: &TraceRecorder,
    ) -> Result<FinalOutput, Error> {
        let steps = StepRunner::new(self.loop_runner(self.agent.step_max_iterations));
        let mut aborted = false;
        let mut index = plan.resume_index().unwrap_or(plan.steps.len());

        while index < plan.steps.len() {
            if plan.steps[index].status.is_terminal() {
                index += 1;
                continue;
            }

            self.transition(&mut plan, index, recorder, Step::begin).await?;

            match steps.run_step(&plan, index, recorder).await {
                StepOutcome::Succeeded(result) => {
                    self.transition(&mut plan, index, recorder, |s| s.complete(result))
                        .await?;
                    index += 1;
                }
                StepOutcome::Failed(error) if plan.steps[index].has_attempts_left() => {
                    self.transition(&mut plan, index, recorder, |s| s.fail(error))
                        .await?;
                    self.transition(&mut plan, index, recorder, Step::rearm).await?;
                }
                StepOutcome::Failed(error) => {
                    plan.steps[index].error = Some(error.clone());
                    let decision = opts
                        .policy
                        .on_step_exhausted(&plan, &plan.steps[index])
                        .await;
                    info!(
                        plan_id = %plan.plan_id,
                        step_id = %plan.steps[index].id,
                        decision = ?decision,
                        "Step exhausted its attempts"
                    );
                    recorder
                        .record(ModeKind::StepDecision {
                            plan_id: plan.plan_id.clone(),
                            step_id: plan.steps[index].id.clone(),
                            decision,
                        })
                        .await;

                    match decision {
                        StepDecision::Retry => {
                            self.transition(&mut plan, index, recorder, |s| s.fail(error))
                                .await?;
                            self.transition(&mut plan, index, recorder, |s| {
                                s.reset_attempts();
                                s.rearm()
                            })
                            .await?;
                        }
                        StepDecision::Skip => {
                            self.transition(&mut plan, index, recorder, Step::skip).await?;
                            index += 1;
                        }
                        StepDecision::ContinueAsFailed => {
                            self.transition(&mut plan, index, recorder, |s| s.fail(error))
                                .await?;
                            index += 1;
                        }
                        StepDecision::Abort => {
                            self.transition(&mut plan, index, recorder, |s| s.fail(error))
                                .await?;
                            aborted = true;
                            break;
                        }
                    }
                }
            }
        }

        plan.status = plan.aggregate_status(aborted);
        self.persist(&mut plan).await;
        info!(plan_id = %plan.plan_id, status = %plan.status, "Plan finished");

        let output = plan_output(&plan);
        recorder
            .record(ModeKind::Plan {
                status: PlanPhase::Completed,
                plan_id: Some(plan.plan_id.clone()),
                message: Some(plan.status.to_string()),
            })
            .await;
        recorder.record(ModeKind::Output(output.clone())).await;
        Ok(output)
    }

    /// Apply one checked step mutation, persist the plan, then record the
    /// EXECUTE_STEP event.
    async fn transition<F>(
        &self,
        plan: &mut Plan,
        index: usize,
        recorder: &TraceRecorder,
        apply: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut Step) -> Result<(), PlanError>,
    {
        let step = &mut plan.steps[index];
        let from = step.status;
        apply(step)?;
        let event = ModeKind::ExecuteStep {
            plan_id: plan.plan_id.clone(),
            step_id: step.id.clone(),
            step_index: index,
            attempt: step.attempts,
            from,
            to: step.status,
            error: match step.status {
                StepStatus::Failed => step.error.clone(),
                _ => None,
            },
        };

        self.persist(plan).await;
        recorder.record(event).await;
        Ok(())
    }

    async fn persist(&self, plan: &mut Plan) {
        plan.touch();
        if let Err(e) = self.plans.save(plan).await {
            warn!(plan_id = %plan.plan_id, error = %e, "Failed to persist plan");
        }
    }
}

async fn record_fatal(recorder: &TraceRecorder, error: &Error) {
    recorder
        .record(ModeKind::Error {
            error: ErrorInfo {
                message: error.to_string(),
                recoverable: false,
            },
        })
        .await;
}

/// The final output for a plan in its current state.
pub fn plan_output(plan: &Plan) -> FinalOutput {
    let final_output = plan
        .steps
        .iter()
        .rev()
        .filter(|s| s.status == StepStatus::Completed)
        .find_map(|s| s.result.as_ref()?.get("output")?.as_str().map(str::to_string))
        .unwrap_or_default();

    FinalOutput {
        final_output,
        summary: format!(
            "Plan {} {}: {} completed, {} failed, {} skipped of {} steps",
            plan.plan_id,
            plan.status,
            plan.count(StepStatus::Completed),
            plan.count(StepStatus::Failed),
            plan.count(StepStatus::Skipped),
            plan.steps.len()
        ),
        completed: plan.status == PlanStatus::CompletedSuccessfully,
        iterations: plan.steps.iter().map(|s| s.attempts).sum(),
        plan_id: Some(plan.plan_id.clone()),
        plan_status: Some(plan.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use stepwise_core::event::ModeEvent;
    use stepwise_memory::{InMemoryPlanStore, InMemorySessionStore};

    struct Harness {
        provider: Arc<SequentialMockProvider>,
        plans: Arc<InMemoryPlanStore>,
        coordinator: Coordinator,
    }

    fn harness(replies: Vec<String>) -> Harness {
        let provider = Arc::new(SequentialMockProvider::new(replies));
        let plans = Arc::new(InMemoryPlanStore::new());
        let agent = AgentConfig {
            step_max_iterations: 1,
            ..AgentConfig::default()
        };
        let coordinator = Coordinator::new(
            provider.clone(),
            stub_registry(),
            Arc::new(Retriever::new(Arc::new(InMemorySessionStore::default()))),
            plans.clone(),
            ChatOptions::new("mock-model"),
        )
        .with_event_bus(bus())
        .with_agent_config(agent);
        Harness {
            provider,
            plans,
            coordinator,
        }
    }

    fn multi_step() -> String {
        json!({"isMultiStep": true, "reasoning": "sequenced", "complexity": "medium", "estimatedSteps": 3})
            .to_string()
    }

    fn three_step_plan() -> String {
        json!({
            "planId": "plan-test",
            "steps": [
                {"description": "first", "tool": "work"},
                {"description": "second", "tool": "work"},
                {"description": "third", "tool": "work"}
            ]
        })
        .to_string()
    }

    fn step_transitions(events: &[Arc<ModeEvent>]) -> Vec<(String, StepStatus, StepStatus)> {
        events
            .iter()
            .filter_map(|e| match &e.kind {
                ModeKind::ExecuteStep { step_id, from, to, .. } => {
                    Some((step_id.clone(), *from, *to))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn single_step_task_skips_planning() {
        let h = harness(vec![
            json!({"isMultiStep": false}).to_string(),
            complete("done"),
        ]);
        let mut rx = h.coordinator.event_bus().subscribe();
        let output = h
            .coordinator
            .execute("say done", &ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(output.final_output, "done");
        assert!(output.plan_id.is_none());
        assert_eq!(
            modes(&drain(&mut rx)),
            vec!["CLASSIFY", "START", "THINK", "OUTPUT"]
        );
    }

    #[tokio::test]
    async fn forced_single_step_bypasses_classifier() {
        let h = harness(vec![complete("done")]);
        let opts = ExecuteOptions::default().with_mode(TaskMode::SingleStep);
        h.coordinator.execute("anything", &opts).await.unwrap();
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn plan_runs_to_success() {
        let h = harness(vec![
            multi_step(),
            three_step_plan(),
            complete("one"),
            complete("two"),
            complete("three"),
        ]);
        let output = h
            .coordinator
            .execute("do three things", &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(output.completed);
        assert_eq!(output.plan_status, Some(PlanStatus::CompletedSuccessfully));
        assert_eq!(output.plan_id.as_deref(), Some("plan-test"));
        assert_eq!(output.final_output, "three");
        assert_eq!(output.iterations, 3);

        let stored = h.plans.load("plan-test").await.unwrap().unwrap();
        assert_eq!(stored.status, PlanStatus::CompletedSuccessfully);
        assert!(stored.steps.iter().all(|s| s.status == StepStatus::Completed));
        assert_eq!(stored.steps[0].result.as_ref().unwrap()["output"], "one");
    }

    #[tokio::test]
    async fn failed_attempt_is_rearmed_and_retried() {
        let h = harness(vec![
            multi_step(),
            three_step_plan(),
            complete("one"),
            idle(),
            complete("two"),
            complete("three"),
        ]);
        let mut rx = h.coordinator.event_bus().subscribe();
        let output = h
            .coordinator
            .execute("do three things", &ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(output.plan_status, Some(PlanStatus::CompletedSuccessfully));

        let second: Vec<(StepStatus, StepStatus)> = step_transitions(&drain(&mut rx))
            .into_iter()
            .filter(|(id, _, _)| id == "2")
            .map(|(_, from, to)| (from, to))
            .collect();
        assert_eq!(
            second,
            vec![
                (StepStatus::Pending, StepStatus::Executing),
                (StepStatus::Executing, StepStatus::Failed),
                (StepStatus::Failed, StepStatus::Pending),
                (StepStatus::Pending, StepStatus::Executing),
                (StepStatus::Executing, StepStatus::Completed),
            ]
        );
        let stored = h.plans.load("plan-test").await.unwrap().unwrap();
        assert_eq!(stored.steps[1].attempts, 2);
    }

    #[tokio::test]
    async fn exhausted_step_aborts_by_default() {
        let h = harness(vec![
            multi_step(),
            three_step_plan(),
            complete("one"),
            idle(),
            idle(),
            idle(),
        ]);
        let output = h
            .coordinator
            .execute("do three things", &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(!output.completed);
        assert_eq!(output.plan_status, Some(PlanStatus::Aborted));
        let stored = h.plans.load("plan-test").await.unwrap().unwrap();
        assert_eq!(stored.steps[1].status, StepStatus::Failed);
        assert_eq!(stored.steps[1].attempts, 3);
        assert_eq!(stored.steps[2].status, StepStatus::Pending);
        assert_eq!(h.provider.call_count(), 6);
    }

    #[tokio::test]
    async fn skip_and_continue_as_failed() {
        let h = harness(vec![
            multi_step(),
            three_step_plan(),
            idle(),
            idle(),
            idle(),
            idle(),
            idle(),
            idle(),
            complete("three"),
        ]);
        let opts = ExecuteOptions::default().with_policy(Arc::new(ScriptedPolicy::new(vec![
            StepDecision::Skip,
            StepDecision::ContinueAsFailed,
        ])));
        let output = h.coordinator.execute("t", &opts).await.unwrap();

        assert_eq!(output.plan_status, Some(PlanStatus::CompletedWithFailures));
        let stored = h.plans.load("plan-test").await.unwrap().unwrap();
        assert_eq!(stored.steps[0].status, StepStatus::Skipped);
        assert_eq!(stored.steps[1].status, StepStatus::Failed);
        assert_eq!(stored.steps[2].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn retry_decision_resets_attempts() {
        let h = harness(vec![
            multi_step(),
            json!({"planId": "plan-one", "steps": [{"description": "only"}]}).to_string(),
            idle(),
            idle(),
            idle(),
            complete("finally"),
        ]);
        let opts = ExecuteOptions::default()
            .with_policy(Arc::new(ScriptedPolicy::new(vec![StepDecision::Retry])));
        let output = h.coordinator.execute("t", &opts).await.unwrap();

        assert!(output.completed);
        let stored = h.plans.load("plan-one").await.unwrap().unwrap();
        assert_eq!(stored.steps[0].attempts, 1);
    }

    #[tokio::test]
    async fn planning_failure_aborts_by_default() {
        let h = harness(vec![multi_step(), "I cannot plan this".into()]);
        let mut rx = h.coordinator.event_bus().subscribe();
        let err = h
            .coordinator
            .execute("t", &ExecuteOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Plan(PlanError::PlanningFailed(_))));
        assert_eq!(
            modes(&drain(&mut rx)),
            vec!["CLASSIFY", "PLAN", "PLAN", "ERROR"]
        );
    }

    #[tokio::test]
    async fn planning_failure_can_fall_back() {
        let h = harness(vec![multi_step(), "{}".into(), complete("single")]);
        let opts = ExecuteOptions::default().with_policy(Arc::new(
            ScriptedPolicy::default().with_plan_failure(PlanFailureDecision::RunAsSingleTask),
        ));
        let output = h.coordinator.execute("t", &opts).await.unwrap();
        assert_eq!(output.final_output, "single");
        assert!(output.plan_id.is_none());
    }

    #[tokio::test]
    async fn resume_reruns_only_unfinished_steps() {
        let h = harness(vec![complete("two"), complete("three")]);
        let mut plan = Plan::new(
            "plan-resume",
            "three things",
            vec![
                Step::new("1", "first", "work"),
                Step::new("2", "second", "work"),
                Step::new("3", "third", "work"),
            ],
        );
        plan.steps[0].begin().unwrap();
        plan.steps[0].complete(json!({"output": "one"})).unwrap();
        plan.steps[1].begin().unwrap();
        plan.steps[1].fail("boom").unwrap();
        plan.status = PlanStatus::Aborted;
        h.plans.save(&plan).await.unwrap();

        let mut rx = h.coordinator.event_bus().subscribe();
        let output = h
            .coordinator
            .resume_plan("plan-resume", &ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(output.plan_status, Some(PlanStatus::CompletedSuccessfully));
        let begun: Vec<String> = step_transitions(&drain(&mut rx))
            .into_iter()
            .filter(|(_, _, to)| *to == StepStatus::Executing)
            .map(|(id, _, _)| id)
            .collect();
        assert_eq!(begun, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn resume_recovers_interrupted_step() {
        let h = harness(vec![complete("one")]);
        let mut plan = Plan::new("plan-crash", "t", vec![Step::new("1", "first", "work")]);
        plan.steps[0].begin().unwrap();
        h.plans.save(&plan).await.unwrap();

        let output = h
            .coordinator
            .resume_plan("plan-crash", &ExecuteOptions::default())
            .await
            .unwrap();
        assert!(output.completed);
        let stored = h.plans.load("plan-crash").await.unwrap().unwrap();
        assert_eq!(stored.steps[0].attempts, 1);
    }

    #[tokio::test]
    async fn resume_of_finished_plan_does_no_work() {
        let h = harness(vec![]);
        let mut plan = Plan::new("plan-done", "t", vec![Step::new("1", "first", "work")]);
        plan.steps[0].begin().unwrap();
        plan.steps[0].complete(json!({"output": "ok"})).unwrap();
        plan.status = PlanStatus::CompletedSuccessfully;
        h.plans.save(&plan).await.unwrap();

        let output = h
            .coordinator
            .resume_plan("plan-done", &ExecuteOptions::default())
            .await
            .unwrap();
        assert!(output.completed);
        assert_eq!(output.final_output, "ok");
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn resume_unknown_plan_is_not_found() {
        let h = harness(vec![]);
        let err = h
            .coordinator
            .resume_plan("ghost", &ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_session_id_rejected() {
        let h = harness(vec![]);
        let opts = ExecuteOptions::default().with_session("../etc");
        assert!(h.coordinator.execute("t", &opts).await.is_err());
    }

    #[tokio::test]
    async fn list_plans_summarizes() {
        let h = harness(vec![]);
        h.plans
            .save(&Plan::new("a", "first task", vec![Step::new("1", "x", "work")]))
            .await
            .unwrap();
        let plans = h.coordinator.list_plans().await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].id, "a");
        assert_eq!(plans[0].task, "first task");
        assert_eq!(plans[0].steps, 1);
        assert_eq!(plans[0].status, PlanStatus::InProgress);
    }
}
