//! Metrics collection for workflow execution.
//!
//! This module provides `WorkflowMetrics` for tracking task completions,
//! retries, token usage and failures.

use serde::{Deserialize, Serialize};

/// Aggregated metrics for a workflow execution.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    /// Total prompt tokens consumed across all tasks.
    pub prompt_token_count: usize,
    /// Total completion tokens generated across all tasks.
    pub completion_token_count: usize,
    /// Total tokens (prompt + completion) across all tasks.
    pub total_token_count: usize,
    /// Number of tasks that reached the delivered state.
    pub tasks_completed: usize,
    /// Number of retries scheduled by the resilience wrapper.
    pub retries: usize,
    /// Collected failure messages from the workflow.
    pub failures: Vec<String>,
}

impl WorkflowMetrics {
    /// Record both prompt and completion tokens.
    pub fn add_tokens(&mut self, prompt: usize, completion: usize) {
        self.prompt_token_count += prompt;
        self.completion_token_count += completion;
        self.total_token_count += prompt + completion;
    }

    /// Record a failure message.
    pub fn record_failure(&mut self, error: String) {
        self.failures.push(error);
    }

    /// Increment the tasks completed counter.
    pub fn record_task(&mut self) {
        self.tasks_completed += 1;
    }

    /// Increment the retry counter.
    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// Check if there were any failures.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Get the total number of tokens used.
    pub fn total_tokens(&self) -> usize {
        self.total_token_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_totals_accumulate() {
        let mut m = WorkflowMetrics::default();
        m.add_tokens(10, 5);
        m.add_tokens(1, 2);
        assert_eq!(m.prompt_token_count, 11);
        assert_eq!(m.completion_token_count, 7);
        assert_eq!(m.total_tokens(), 18);
    }

    #[test]
    fn test_failures_flag() {
        let mut m = WorkflowMetrics::default();
        assert!(!m.has_failures());
        m.record_failure("boom".to_string());
        assert!(m.has_failures());
    }
}
