//! Execution context for workflow runs.
//!
//! This module provides the `ExecutionContext` which is passed to every task
//! in a workflow, enabling metrics collection, event tracing and cooperative
//! cancellation.

use std::sync::{Arc, Mutex};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::events::{TraceEntry, WorkflowEvent};
use crate::metrics::WorkflowMetrics;

/// Context passed to every task in the workflow.
///
/// This context is cloneable and thread-safe, so independent runs over
/// branched stations can share one. All metric updates are synchronized.
///
/// # Tracing
///
/// The context maintains a structured trace log of workflow events: lifecycle
/// transitions, scheduled retries and artifacts. Nothing in the engine depends
/// on anyone reading it.
///
/// # Cancellation
///
/// Cancelling the context aborts the execute attempt currently in flight and
/// any pending retry wait. Cancellation is never retried.
///
/// # Example
///
/// ```rust
/// use hustle::{ExecutionContext, WorkflowEvent};
///
/// let ctx = ExecutionContext::new();
/// ctx.emit(WorkflowEvent::TaskStart {
///     task_name: "Summarize".to_string(),
///     position: 0,
/// });
///
/// assert_eq!(ctx.trace_snapshot().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Counters for the runs sharing this context.
    pub metrics: Arc<Mutex<WorkflowMetrics>>,
    /// Lifecycle, retry and artifact events in emission order.
    pub traces: Arc<Mutex<Vec<TraceEntry>>>,
    cancel: CancellationToken,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// A context with no metrics, an empty trace log and its own cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(WorkflowMetrics::default())),
            traces: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` for cancellation, e.g. a child of an application-wide token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Request cancellation of every run using this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Record token usage reported by a model call.
    pub fn record_tokens(&self, prompt: usize, completion: usize) {
        let mut m = self.metrics.lock().unwrap();
        m.add_tokens(prompt, completion);
    }

    /// Increment the tasks completed counter.
    pub fn record_task(&self) {
        let mut m = self.metrics.lock().unwrap();
        m.record_task();
    }

    /// Increment the retry counter.
    pub fn record_retry(&self) {
        let mut m = self.metrics.lock().unwrap();
        m.record_retry();
    }

    /// Record why a task failed.
    pub fn record_failure(&self, error: impl Into<String>) {
        self.metrics.lock().unwrap().record_failure(error.into());
    }

    /// Metrics accumulated so far.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowMetrics {
        self.metrics.lock().unwrap().clone()
    }

    /// Append `event` to the trace log, stamped with the current time.
    pub fn emit(&self, event: WorkflowEvent) {
        self.traces.lock().unwrap().push(TraceEntry::new(event));
    }

    /// Record an intermediate value produced by `task_name` under `key`.
    ///
    /// Values that fail to serialize are stored as a placeholder string.
    /// # Example
    ///
    /// ```rust
    /// use hustle::ExecutionContext;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Verdict { decision: String }
    ///
    /// let ctx = ExecutionContext::new();
    /// ctx.emit_artifact("AngelInvestor", "verdict", &Verdict { decision: "FUND".to_string() });
    /// ```
    pub fn emit_artifact<T: serde::Serialize>(&self, task_name: &str, key: &str, data: &T) {
        let data = serde_json::to_value(data)
            .unwrap_or_else(|err| serde_json::Value::String(format!("<unserializable: {err}>")));
        self.emit(WorkflowEvent::Artifact {
            task_name: task_name.to_string(),
            key: key.to_string(),
            data,
        });
    }

    /// Copy of the trace log, timestamps included.
    #[must_use]
    pub fn trace_snapshot(&self) -> Vec<TraceEntry> {
        self.traces.lock().unwrap().clone()
    }

    /// Only the events, without timestamps.
    #[must_use]
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.traces
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.event.clone())
            .collect()
    }

    /// Drop every trace entry. Metrics are kept.
    pub fn clear_traces(&self) {
        self.traces.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_metrics() {
        let ctx = ExecutionContext::new();
        let other = ctx.clone();
        other.record_task();
        other.record_retry();
        assert_eq!(ctx.snapshot().tasks_completed, 1);
        assert_eq!(ctx.snapshot().retries, 1);
    }

    #[test]
    fn test_cancellation_propagates_to_clones() {
        let ctx = ExecutionContext::new();
        let other = ctx.clone();
        assert!(!other.is_cancelled());
        ctx.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_external_token() {
        let parent = CancellationToken::new();
        let ctx = ExecutionContext::new().with_cancellation(parent.child_token());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_clear_traces() {
        let ctx = ExecutionContext::new();
        ctx.emit_artifact("t", "k", &42);
        assert_eq!(ctx.events().len(), 1);
        ctx.clear_traces();
        assert!(ctx.trace_snapshot().is_empty());
    }
}
