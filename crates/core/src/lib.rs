//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise task
//! orchestrator. This crate has **no framework dependencies**. It defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the orchestrator is a trait here: the LLM
//! ([`Provider`]), tools ([`Tool`] behind an explicit [`ToolRegistry`]),
//! the session log ([`SessionStore`]) and plan persistence ([`PlanStore`]).
//! Implementations live in their respective crates, and tests swap in
//! scripted stand-ins.

pub mod error;
pub mod event;
pub mod json;
pub mod message;
pub mod plan;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{EventBus, FinalOutput, LoopScope, ModeEvent, ModeKind, PlanPhase};
pub use message::{Message, Role};
pub use plan::{
    Plan, PlanFailureDecision, PlanStatus, PlanStore, PlanSummary, Step, StepDecision, StepStatus,
};
pub use provider::{ChatOptions, Provider};
pub use reasoning::{
    ActionResult, ActionSpec, Classification, Complexity, Conclusion, Confidence, HistoryEntry,
    Observation, ObserveStatus, ThinkResult,
};
pub use session::{RetrievalStrategy, SessionEntry, SessionStore, Snippet};
pub use tool::{Tool, ToolRegistry, ToolSpec};
