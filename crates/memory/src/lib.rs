//! Session log, retrieval and plan storage implementations for Stepwise.

pub mod file_store;
pub mod in_memory;
pub mod noop;
pub mod plan_store;
pub mod retriever;

pub use file_store::FileSessionStore;
pub use in_memory::InMemorySessionStore;
pub use noop::NoopSessionStore;
pub use plan_store::{FilePlanStore, InMemoryPlanStore};
pub use retriever::{EmbeddingStrategy, FuzzyKeywordStrategy, Retriever};
