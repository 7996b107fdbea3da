//! Task classifier — one LLM call deciding single- vs multi-step.
//!
//! Classification never blocks execution: any failure (provider error,
//! unreadable reply) yields the single-step default.

use std::sync::Arc;
use stepwise_core::json::parse_json_object;
use stepwise_core::message::Message;
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::reasoning::Classification;
use tracing::{debug, warn};

use crate::prompt;

pub struct TaskClassifier {
    provider: Arc<dyn Provider>,
    options: ChatOptions,
}

impl TaskClassifier {
    pub fn new(provider: Arc<dyn Provider>, options: ChatOptions) -> Self {
        Self { provider, options }
    }

    pub async fn classify(&self, task: &str) -> Classification {
        let messages = [
            Message::system(prompt::CLASSIFIER_SYSTEM_PROMPT),
            Message::user(prompt::classifier_prompt(task)),
        ];

        let raw = match self.provider.chat(&messages, &self.options).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Classifier call failed, treating task as single-step");
                return Classification::single_step(format!("Classification failed: {e}"));
            }
        };

        match parse_json_object(&raw)
            .as_ref()
            .and_then(Classification::from_value)
        {
            Some(classification) => {
                debug!(
                    multi_step = classification.is_multi_step,
                    estimated_steps = classification.estimated_steps,
                    "Task classified"
                );
                classification
            }
            None => {
                warn!("Classifier reply unreadable, treating task as single-step");
                Classification::single_step("Classifier reply could not be parsed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;
    use stepwise_core::error::ProviderError;
    use stepwise_core::reasoning::Complexity;

    fn classifier(provider: SequentialMockProvider) -> TaskClassifier {
        TaskClassifier::new(Arc::new(provider), ChatOptions::new("mock-model"))
    }

    #[tokio::test]
    async fn reads_multi_step_reply() {
        let reply = r#"Sure! {"isMultiStep": true, "reasoning": "build then test", "complexity": "medium", "estimatedSteps": 3}"#;
        let c = classifier(SequentialMockProvider::new(vec![reply.into()]))
            .classify("build the project, then run the tests")
            .await;
        assert!(c.is_multi_step);
        assert_eq!(c.complexity, Complexity::Medium);
        assert_eq!(c.estimated_steps, 3);
    }

    #[tokio::test]
    async fn garbage_defaults_to_single_step() {
        let c = classifier(SequentialMockProvider::new(vec!["no idea".into()]))
            .classify("x")
            .await;
        assert!(!c.is_multi_step);
        assert_eq!(c.complexity, Complexity::Low);
        assert_eq!(c.estimated_steps, 1);
    }

    #[tokio::test]
    async fn provider_error_defaults_to_single_step() {
        let provider = SequentialMockProvider::with_results(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]);
        let c = classifier(provider).classify("x").await;
        assert!(!c.is_multi_step);
        assert!(c.reasoning.contains("connection refused"));
    }

    #[tokio::test]
    async fn missing_flag_is_unreadable() {
        let c = classifier(SequentialMockProvider::new(vec![
            r#"{"complexity": "high"}"#.into(),
        ]))
        .classify("x")
        .await;
        assert!(!c.is_multi_step);
    }
}
