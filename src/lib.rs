//! # hustle
//!
//! Typed, async task pipelines for LLM workflows in Rust.
//!
//! A workflow threads a [`Station`] through an ordered list of tasks. The
//! station carries two kinds of state:
//!
//! - **capital**: global state shared by every task and every branch of a run
//!   (a portfolio, a ledger, a connection pool).
//! - **change**: local state handed from one task to the next, copied when a
//!   station is branched.
//!
//! ## Core Concepts
//!
//! - **Task**: validate the change into a typed input, execute, deliver the
//!   result back into the station
//! - **ContractViolation**: why a change did not satisfy a task's input
//!   contract
//! - **RetryPolicy**: bounded exponential backoff around the execute phase
//! - **Workflow**: ordered, associative composition of tasks
//! - **ExecutionContext**: metrics, lifecycle trace and cancellation for a run
//! - **LlmClient** / **PromptTask**: tasks whose execute phase is a model call
//!
//! ## Example: Two-Task Pipeline
//!
//! ```rust
//! use hustle::{LambdaTask, Station, TaskExt};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Ledger { log: Vec<i64> }
//!
//! # tokio_test::block_on(async {
//! let add_one = LambdaTask::new(
//!     "add_one",
//!     |n: &i64| Ok(*n),
//!     |n: i64| async move { Ok::<i64, hustle::Error>(n + 1) },
//!     |mut s: Station<Ledger, i64>, _n: i64, out: i64| {
//!         s.set_change(out);
//!         Ok(s)
//!     },
//! );
//! let double_into_log = LambdaTask::new(
//!     "double_into_log",
//!     |n: &i64| Ok(*n),
//!     |n: i64| async move { Ok::<i64, hustle::Error>(n * 2) },
//!     |mut s: Station<Ledger, i64>, _n: i64, out: i64| {
//!         s.update_capital(|ledger| ledger.log.push(out));
//!         Ok(s)
//!     },
//! );
//!
//! let workflow = add_one.then(double_into_log).with_name("AddAndRecord");
//! let (station, metrics) = workflow
//!     .run(Station::new(Ledger { log: vec![] }, 5))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(station.capital().log, vec![12]);
//! assert_eq!(*station.change(), 6);
//! assert_eq!(metrics.tasks_completed, 2);
//! # });
//! ```

pub mod error;
pub mod contract;
pub mod context;
pub mod metrics;
pub mod events;
pub mod station;
pub mod retry;
pub mod task;
pub mod workflow;
pub mod llm;

pub use error::{Error, Result};
pub use contract::ContractViolation;
pub use context::ExecutionContext;
pub use metrics::WorkflowMetrics;
pub use events::{TraceEntry, WorkflowEvent};
pub use station::Station;
pub use retry::RetryPolicy;
pub use task::{LambdaTask, Phase, PromptTask, Task, TaskExt, TaskState};
pub use workflow::{IntoWorkflow, Workflow};
pub use llm::{ChatMessage, ChatRequest, ChatResponse, ChatRole, LlmClient, TokenUsage};
