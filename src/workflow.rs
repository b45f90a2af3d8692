//! Ordered task composition and sequential execution.

use std::sync::Arc;

use crate::task::lifecycle::Stage;
use crate::task::Task;
use crate::{Error, ExecutionContext, Result, Station, WorkflowMetrics};

/// An ordered, non-empty sequence of tasks sharing one capital and change
/// type.
///
/// Tasks run strictly one after another: each task's delivered station is the
/// next task's input. Chaining flattens, so `(a.then(b)).then(c)` and
/// `a.then(b.then(c))` are the same three-task workflow. Tasks whose capital
/// or change types differ cannot be chained; that mismatch is a compile error.
///
/// # Example
///
/// ```rust
/// use hustle::{LambdaTask, Station, TaskExt};
///
/// # tokio_test::block_on(async {
/// let increment = LambdaTask::new(
///     "increment",
///     |n: &i64| Ok(*n),
///     |n: i64| async move { Ok::<i64, hustle::Error>(n + 1) },
///     |mut s: Station<Vec<i64>, i64>, _n: i64, out: i64| {
///         s.set_change(out);
///         Ok(s)
///     },
/// );
/// let record = LambdaTask::new(
///     "record",
///     |n: &i64| Ok(*n),
///     |n: i64| async move { Ok::<i64, hustle::Error>(n * 2) },
///     |mut s: Station<Vec<i64>, i64>, _n: i64, out: i64| {
///         s.update_capital(|log| log.push(out));
///         Ok(s)
///     },
/// );
///
/// let workflow = increment.then(record).with_name("IncrementAndRecord");
/// let (station, metrics) = workflow.run(Station::new(Vec::new(), 5)).await.unwrap();
///
/// assert_eq!(station.capital(), &vec![12]);
/// assert_eq!(*station.change(), 6);
/// assert_eq!(metrics.tasks_completed, 2);
/// # });
/// ```
pub struct Workflow<C, L> {
    tasks: Vec<Arc<dyn Stage<C, L>>>,
    name: String,
}

/// Anything that can be appended to a workflow: a single task or a whole
/// workflow.
pub trait IntoWorkflow<C, L> {
    /// Convert into a workflow.
    fn into_workflow(self) -> Workflow<C, L>;
}

impl<T> IntoWorkflow<T::Capital, T::Change> for T
where
    T: Task + 'static,
{
    fn into_workflow(self) -> Workflow<T::Capital, T::Change> {
        Workflow::new(self)
    }
}

impl<C, L> IntoWorkflow<C, L> for Workflow<C, L> {
    fn into_workflow(self) -> Workflow<C, L> {
        self
    }
}

impl<C, L> Workflow<C, L>
where
    C: Send + Sync + 'static,
    L: Send + 'static,
{
    /// Create a single-task workflow.
    pub fn new<T>(task: T) -> Self
    where
        T: Task<Capital = C, Change = L> + 'static,
    {
        let stage: Arc<dyn Stage<C, L>> = Arc::new(task);
        Self {
            tasks: vec![stage],
            name: "workflow".to_string(),
        }
    }

    /// Chain every item in order.
    ///
    /// Fails with [`Error::Composition`] when `parts` is empty.
    pub fn sequence<I, W>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = W>,
        W: IntoWorkflow<C, L>,
    {
        let mut parts = parts.into_iter();
        let first = parts.next().ok_or_else(|| {
            Error::Composition("a workflow needs at least one task".to_string())
        })?;
        Ok(parts.fold(first.into_workflow(), Self::then))
    }

    /// Append a task or every task of another workflow.
    #[must_use]
    pub fn then<W>(mut self, next: W) -> Self
    where
        W: IntoWorkflow<C, L>,
    {
        self.tasks.extend(next.into_workflow().tasks);
        self
    }

    /// Set a human-readable name for this workflow.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the name of this workflow.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tasks in this workflow.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Always `false`; a workflow holds at least one task.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task names in execution order.
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Run the workflow, returning the final station along with the
    /// collected metrics.
    ///
    /// A fresh [`ExecutionContext`] is created for each invocation.
    pub async fn run(&self, station: Station<C, L>) -> Result<(Station<C, L>, WorkflowMetrics)> {
        let ctx = ExecutionContext::new();
        let station = self.run_with_ctx(&ctx, station).await?;
        Ok((station, ctx.snapshot()))
    }

    /// Run the workflow with a caller-provided execution context.
    ///
    /// Useful to accumulate metrics over several runs, to inspect the trace
    /// log after a failure, or to cancel the run from elsewhere.
    pub async fn run_with_ctx(
        &self,
        ctx: &ExecutionContext,
        mut station: Station<C, L>,
    ) -> Result<Station<C, L>> {
        tracing::info!(workflow = %self.name, tasks = self.tasks.len(), "workflow started");

        for (position, task) in self.tasks.iter().enumerate() {
            station = match task.advance(ctx, position, station).await {
                Ok(station) => station,
                Err(err) => {
                    tracing::error!(workflow = %self.name, position, error = %err, "workflow aborted");
                    return Err(err);
                }
            };
        }

        tracing::info!(workflow = %self.name, "workflow finished");
        Ok(station)
    }
}
