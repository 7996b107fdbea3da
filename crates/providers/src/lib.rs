//! LLM provider implementations for Stepwise.
//!
//! All providers implement the `stepwise_core::Provider` trait.
//! [`build_from_config`] constructs the single provider handle a process
//! uses, once, at startup.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, resolve_model};
