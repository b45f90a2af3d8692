//! Core task trait and closure-based tasks.
//!
//! This module defines the [`Task`] trait, the unit every workflow is built
//! from, along with [`LambdaTask`] for closure-based tasks and [`TaskExt`]
//! for fluent chaining into a [`Workflow`].
//!
//! A task runs three phases per invocation:
//!
//! 1. **validate** turns the station's change into the task's typed input, or
//!    fails with a [`ContractViolation`]. It only borrows the change.
//! 2. **execute** turns the input into an output. It never sees the station,
//!    so retrying it cannot corrupt shared state. When
//!    [`Task::retry_policy`] returns a policy, this phase is retried.
//! 3. **deliver** merges input and output back into the station, typically
//!    by updating capital and handing the next task a new change.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::contract::ContractViolation;
use crate::{ExecutionContext, Result, RetryPolicy, Station, Workflow};

pub(crate) mod lifecycle;
pub mod prompt;

pub use lifecycle::{Phase, TaskState};
pub use prompt::PromptTask;

/// A reusable, stateless unit of work over a [`Station`].
///
/// Implementations hold configuration only; all per-run data lives in the
/// station passed to each phase.
///
/// # Example
///
/// ```rust
/// use hustle::{ContractViolation, ExecutionContext, Result, Station, Task};
/// use async_trait::async_trait;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Counter { n: i64 }
///
/// struct Increment;
///
/// #[async_trait]
/// impl Task for Increment {
///     type Capital = ();
///     type Change = Counter;
///     type Input = i64;
///     type Output = i64;
///
///     fn validate(&self, change: &Counter) -> std::result::Result<i64, ContractViolation> {
///         Ok(change.n)
///     }
///
///     async fn execute(&self, _ctx: &ExecutionContext, n: &i64) -> Result<i64> {
///         Ok(n + 1)
///     }
///
///     fn deliver(&self, mut station: Station<(), Counter>, _n: i64, out: i64) -> Result<Station<(), Counter>> {
///         station.set_change(Counter { n: out });
///         Ok(station)
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Global state shared by every task in the workflow.
    type Capital: Send + Sync + 'static;
    /// Local state handed from task to task.
    type Change: Send + 'static;
    /// The validated form of the change this task works on.
    type Input: Send + Sync;
    /// What the execute phase produces.
    type Output: Send;

    /// Check the change against this task's input contract.
    fn validate(
        &self,
        change: &Self::Change,
    ) -> std::result::Result<Self::Input, ContractViolation>;

    /// Produce the output. May be called more than once when retried.
    async fn execute(&self, ctx: &ExecutionContext, input: &Self::Input) -> Result<Self::Output>;

    /// Merge the result into the station for the next task.
    fn deliver(
        &self,
        station: Station<Self::Capital, Self::Change>,
        input: Self::Input,
        output: Self::Output,
    ) -> Result<Station<Self::Capital, Self::Change>>;

    /// Retry configuration for the execute phase. `None` runs it once.
    fn retry_policy(&self) -> Option<RetryPolicy> {
        None
    }

    /// Returns a human-readable name for this task. Defaults to the type name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// Shared tasks can be chained into several workflows.
#[async_trait]
impl<T> Task for Arc<T>
where
    T: Task + ?Sized,
{
    type Capital = T::Capital;
    type Change = T::Change;
    type Input = T::Input;
    type Output = T::Output;

    fn validate(&self, change: &T::Change) -> std::result::Result<T::Input, ContractViolation> {
        (**self).validate(change)
    }

    async fn execute(&self, ctx: &ExecutionContext, input: &T::Input) -> Result<T::Output> {
        (**self).execute(ctx, input).await
    }

    fn deliver(
        &self,
        station: Station<T::Capital, T::Change>,
        input: T::Input,
        output: T::Output,
    ) -> Result<Station<T::Capital, T::Change>> {
        (**self).deliver(station, input, output)
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        (**self).retry_policy()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A task assembled from three closures.
///
/// The type parameters are inferred: `C`/`L` are the capital and change
/// types, `I`/`O` the input and output, `V`/`X`/`D` the validate, execute and
/// deliver closures.
///
/// # Example
///
/// ```rust
/// use hustle::{LambdaTask, Station};
///
/// let double = LambdaTask::new(
///     "double",
///     |n: &i64| Ok(*n),
///     |n: i64| async move { Ok::<i64, hustle::Error>(n * 2) },
///     |mut station: Station<(), i64>, _n: i64, out: i64| {
///         station.set_change(out);
///         Ok(station)
///     },
/// );
/// ```
pub struct LambdaTask<C, L, I, O, V, X, D> {
    name: String,
    validate: V,
    execute: X,
    deliver: D,
    retry: Option<RetryPolicy>,
    _phantom: PhantomData<fn(C, L, I) -> O>,
}

impl<C, L, I, O, V, X, D, Fut> LambdaTask<C, L, I, O, V, X, D>
where
    V: Fn(&L) -> std::result::Result<I, ContractViolation> + Send + Sync + 'static,
    X: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    D: Fn(Station<C, L>, I, O) -> Result<Station<C, L>> + Send + Sync + 'static,
{
    /// Create a new `LambdaTask` from the given closures.
    pub fn new(name: impl Into<String>, validate: V, execute: X, deliver: D) -> Self {
        Self {
            name: name.into(),
            validate,
            execute,
            deliver,
            retry: None,
            _phantom: PhantomData,
        }
    }

    /// Retry the execute closure under `policy`.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

#[async_trait]
impl<C, L, I, O, V, X, D, Fut> Task for LambdaTask<C, L, I, O, V, X, D>
where
    C: Send + Sync + 'static,
    L: Send + 'static,
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    V: Fn(&L) -> std::result::Result<I, ContractViolation> + Send + Sync + 'static,
    X: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    D: Fn(Station<C, L>, I, O) -> Result<Station<C, L>> + Send + Sync + 'static,
{
    type Capital = C;
    type Change = L;
    type Input = I;
    type Output = O;

    fn validate(&self, change: &L) -> std::result::Result<I, ContractViolation> {
        (self.validate)(change)
    }

    async fn execute(&self, _ctx: &ExecutionContext, input: &I) -> Result<O> {
        (self.execute)(input.clone()).await
    }

    fn deliver(&self, station: Station<C, L>, input: I, output: O) -> Result<Station<C, L>> {
        (self.deliver)(station, input, output)
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Extension trait providing fluent chaining for all [`Task`] implementors.
///
/// This trait is automatically implemented for every sized, `'static` task.
pub trait TaskExt: Task + Sized + 'static {
    /// Start a workflow with this task followed by `next` (a task or a
    /// workflow).
    ///
    /// # Example
    ///
    /// ```rust
    /// use hustle::{LambdaTask, Station, TaskExt};
    ///
    /// fn add(name: &str, k: i64) -> impl hustle::Task<Capital = (), Change = i64> {
    ///     LambdaTask::new(
    ///         name,
    ///         |n: &i64| Ok(*n),
    ///         move |n: i64| async move { Ok::<i64, hustle::Error>(n + k) },
    ///         |mut s: Station<(), i64>, _n: i64, out: i64| {
    ///             s.set_change(out);
    ///             Ok(s)
    ///         },
    ///     )
    /// }
    ///
    /// let workflow = add("a", 1).then(add("b", 2)).then(add("c", 3));
    /// assert_eq!(workflow.task_names(), vec!["a", "b", "c"]);
    /// ```
    fn then<W>(self, next: W) -> Workflow<Self::Capital, Self::Change>
    where
        W: crate::IntoWorkflow<Self::Capital, Self::Change>,
    {
        Workflow::new(self).then(next)
    }
}

impl<T: Task + Sized + 'static> TaskExt for T {}
