//! OBSERVE continuation policy.

use stepwise_core::reasoning::ObserveStatus;

/// Decides what the loop does after an action.
///
/// Checked in order:
/// 1. a failed action with fewer than `max_failed_observations` cumulative
///    failures is retried;
/// 2. a successful call to a tool registered as terminal completes the task;
/// 3. reaching `iteration_cap` halts the loop with `completed = false`;
/// 4. anything else continues, including failures past the retry limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservePolicy {
    pub max_failed_observations: u32,
    pub iteration_cap: u32,
}

impl Default for ObservePolicy {
    fn default() -> Self {
        Self {
            max_failed_observations: 3,
            iteration_cap: 5,
        }
    }
}

impl ObservePolicy {
    /// `failures` is the cumulative count of failed observations in this
    /// loop, including the current one.
    pub fn classify(
        &self,
        success: bool,
        terminal_tool: bool,
        failures: u32,
        iteration: u32,
    ) -> ObserveStatus {
        if !success && failures < self.max_failed_observations {
            return ObserveStatus::Retry;
        }
        if success && terminal_tool {
            return ObserveStatus::Complete;
        }
        if iteration >= self.iteration_cap {
            return ObserveStatus::Halt;
        }
        ObserveStatus::Continue
    }
}
