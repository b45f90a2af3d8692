//! The validate → execute → deliver state machine.
//!
//! [`Stage`] erases a task's input and output types so tasks with different
//! contracts can sit in one workflow. Every task gets it through a blanket
//! impl, which also does the bookkeeping: lifecycle events, metrics, tracing
//! spans and attaching the task name and phase to failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use super::Task;
use crate::{Error, ExecutionContext, Result, Station, WorkflowEvent};

/// The three phases of a task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Checking the change against the input contract.
    Validate,
    /// Producing the output, possibly retried.
    Execute,
    /// Merging the output back into the station.
    Deliver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Validate => "validate",
            Phase::Execute => "execute",
            Phase::Deliver => "deliver",
        })
    }
}

/// Where one task invocation currently is.
///
/// `Pending → Validated → Executed → Delivered`, or `Failed` from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Validated,
    Executed,
    Delivered,
    Failed,
}

/// A task with its input and output types hidden.
#[async_trait]
pub(crate) trait Stage<C, L>: Send + Sync {
    fn name(&self) -> &str;

    /// Run all three phases; `position` is the task's index in its workflow.
    async fn advance(
        &self,
        ctx: &ExecutionContext,
        position: usize,
        station: Station<C, L>,
    ) -> Result<Station<C, L>>;
}

#[async_trait]
impl<T> Stage<T::Capital, T::Change> for T
where
    T: Task,
{
    fn name(&self) -> &str {
        Task::name(self)
    }

    async fn advance(
        &self,
        ctx: &ExecutionContext,
        position: usize,
        station: Station<T::Capital, T::Change>,
    ) -> Result<Station<T::Capital, T::Change>> {
        let name = Task::name(self);
        let start = Instant::now();
        ctx.emit(WorkflowEvent::TaskStart {
            task_name: name.to_string(),
            position,
        });
        transition(ctx, name, TaskState::Pending);

        let input = self
            .validate(station.change())
            .map_err(|violation| fail(ctx, name, Phase::Validate, violation.into()))?;
        transition(ctx, name, TaskState::Validated);

        let output = match self.retry_policy() {
            Some(policy) => {
                policy
                    .run_observed(ctx, name, || self.execute(ctx, &input))
                    .await
            }
            None => tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(Error::Cancelled),
                output = self.execute(ctx, &input) => output,
            },
        }
        .map_err(|err| fail(ctx, name, Phase::Execute, err))?;
        transition(ctx, name, TaskState::Executed);

        let station = self
            .deliver(station, input, output)
            .map_err(|err| fail(ctx, name, Phase::Deliver, err))?;
        transition(ctx, name, TaskState::Delivered);

        ctx.record_task();
        ctx.emit(WorkflowEvent::TaskEnd {
            task_name: name.to_string(),
            duration_ms: start.elapsed().as_millis(),
        });
        Ok(station)
    }
}

fn transition(ctx: &ExecutionContext, name: &str, state: TaskState) {
    tracing::debug!(task = name, ?state, "task transition");
    ctx.emit(WorkflowEvent::Transition {
        task_name: name.to_string(),
        state,
    });
}

fn fail(ctx: &ExecutionContext, name: &str, phase: Phase, err: Error) -> Error {
    let message = err.to_string();
    tracing::error!(task = name, %phase, error = %message, "task failed");
    transition(ctx, name, TaskState::Failed);
    ctx.record_failure(format!("{name}: {message}"));
    ctx.emit(WorkflowEvent::Error {
        task_name: name.to_string(),
        phase,
        message,
    });
    Error::TaskFailed {
        task: name.to_string(),
        phase,
        source: Box::new(err),
    }
}
