//! The orchestration engine — the heart of Stepwise.
//!
//! A task is classified, then either:
//!
//! 1. **Single-step**: run through one **THINK → ACTION → OBSERVE** loop
//! 2. **Multi-step**: decomposed by the planner into a persisted plan, whose
//!    steps each run through a step-scoped loop with retry, skip and abort
//!    handling
//!
//! Every transition is recorded as a mode event in the session log and on
//! the event bus. Before each THINK the session log is searched for
//! snippets relevant to the task, which go into the prompt.

pub mod classifier;
pub mod coordinator;
pub mod decision;
pub mod loop_runner;
pub mod observe;
pub mod planner;
pub mod prompt;
pub mod recorder;
pub mod step_runner;

pub use classifier::TaskClassifier;
pub use coordinator::{Coordinator, DEFAULT_SESSION_ID, ExecuteOptions, TaskMode, plan_output};
pub use decision::{DecisionPolicy, NonInteractivePolicy};
pub use loop_runner::{LoopContext, LoopOutcome, LoopRunner, parse_think};
pub use observe::ObservePolicy;
pub use planner::Planner;
pub use recorder::TraceRecorder;
pub use step_runner::{StepOutcome, StepRunner};

#[cfg(test)]
pub(crate) mod test_helpers;
