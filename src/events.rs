//! Structured workflow execution events for tracing and observability.
//!
//! This module defines the event types that can be emitted during workflow
//! execution: task lifecycle transitions, scheduled retries, intermediate
//! artifacts and failures.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::task::{Phase, TaskState};

/// Events that can be emitted during workflow execution.
///
/// These events provide structured observability into workflow behavior,
/// replacing unstructured string logs with typed, serializable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WorkflowEvent {
    /// A task has entered the pending state.
    TaskStart {
        /// Name of the task being executed.
        task_name: String,
        /// Position of the task in its workflow, starting at 0.
        position: usize,
    },
    /// A task moved to a new lifecycle state.
    Transition {
        /// Name of the task.
        task_name: String,
        /// The state just entered.
        state: TaskState,
    },
    /// An attempt failed and another one is scheduled.
    RetryScheduled {
        /// Label of the retried operation (the task name for execute phases).
        label: String,
        /// The attempt that just failed, starting at 1.
        attempt: u32,
        /// Wait before the next attempt, in milliseconds.
        delay_ms: u64,
        /// Summary of the failure.
        error: String,
    },
    /// A task was delivered successfully.
    TaskEnd {
        /// Name of the task that completed.
        task_name: String,
        /// Duration of the whole lifecycle in milliseconds.
        duration_ms: u128,
    },
    /// An intermediate artifact was produced during execution.
    ///
    /// Useful for recording raw model responses or partial results.
    Artifact {
        /// Name of the task that produced the artifact.
        task_name: String,
        /// Key identifying the artifact (e.g., "response", "score").
        key: String,
        /// The artifact data as a JSON value.
        data: serde_json::Value,
    },
    /// A task failed.
    Error {
        /// Name of the task where the error occurred.
        task_name: String,
        /// Phase in which it failed.
        phase: Phase,
        /// Error message describing what went wrong.
        message: String,
    },
}

/// A timestamped trace entry containing a workflow event.
///
/// Each trace entry records when the event occurred (as Unix epoch milliseconds)
/// along with the event itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Unix epoch timestamp in milliseconds when this event occurred.
    pub timestamp: u128,
    /// The workflow event that was recorded.
    #[serde(flatten)]
    pub event: WorkflowEvent,
}

impl TraceEntry {
    /// Create a new trace entry with the current timestamp.
    #[must_use]
    pub fn new(event: WorkflowEvent) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self { timestamp, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_entry_serialization() {
        let event = WorkflowEvent::TaskStart {
            task_name: "MarketAnalyst".to_string(),
            position: 0,
        };
        let entry = TraceEntry::new(event);
        let json = serde_json::to_string(&entry).unwrap();

        assert!(json.contains("\"type\":\"TaskStart\""));
        assert!(json.contains("\"task_name\":\"MarketAnalyst\""));
        assert!(json.contains("\"timestamp\":"));
    }

    #[test]
    fn test_transition_state_is_snake_case() {
        let event = WorkflowEvent::Transition {
            task_name: "AngelInvestor".to_string(),
            state: TaskState::Validated,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"state\":\"validated\""));
    }

    #[test]
    fn test_retry_event() {
        let event = WorkflowEvent::RetryScheduled {
            label: "MarketAnalyst".to_string(),
            attempt: 1,
            delay_ms: 1000,
            error: "transient failure: 429".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"RetryScheduled\""));
        assert!(json.contains("\"delay_ms\":1000"));
    }
}
