use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::context::TaskContext;
use crate::retry::RetryDirective;
use crate::task::TaskKind;

/// Failure of a single attempt, as reported by a handler.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The failure can never heal, fail the job without further attempts
    #[error("{0}")]
    Fatal(String),

    /// The failure may heal, retry if attempts remain. `delay` overrides
    /// the default backoff curve when set.
    #[error("{message}")]
    Retry {
        message: String,
        delay: Option<Duration>,
    },
}

impl TaskError {
    pub fn fatal(message: impl Into<String>) -> Self {
        TaskError::Fatal(message.into())
    }

    pub fn retry(message: impl Into<String>) -> Self {
        TaskError::Retry {
            message: message.into(),
            delay: None,
        }
    }

    pub fn retry_after(message: impl Into<String>, delay: Duration) -> Self {
        TaskError::Retry {
            message: message.into(),
            delay: Some(delay),
        }
    }

    pub(crate) fn directive(&self) -> RetryDirective {
        match self {
            TaskError::Fatal(_) => RetryDirective::Never,
            TaskError::Retry { delay: Some(d), .. } => RetryDirective::After(*d),
            TaskError::Retry { delay: None, .. } => RetryDirective::Backoff,
        }
    }
}

/// Conversion from whatever a handler returns into the queue's result shape.
///
/// Implemented for `()` and for `Result<T: Serialize, TaskError>`, so a
/// handler can return nothing, or a summary value that gets stored on the
/// completed job row.
pub trait IntoTaskResult {
    fn into_task_result(self) -> Result<Option<Value>, TaskError>;
}

impl IntoTaskResult for () {
    fn into_task_result(self) -> Result<Option<Value>, TaskError> {
        Ok(None)
    }
}

impl<T: Serialize> IntoTaskResult for Result<T, TaskError> {
    fn into_task_result(self) -> Result<Option<Value>, TaskError> {
        let value = serde_json::to_value(self?)
            .map_err(|e| TaskError::fatal(format!("Failed to serialize task result: {e}")))?;
        Ok(match value {
            Value::Null => None,
            value => Some(value),
        })
    }
}

/// A unit of business logic the worker knows how to run.
///
/// The implementing type doubles as the payload: it is serialized on
/// enqueue and deserialized back when a worker claims the job.
///
/// ```
/// use jobscout::{IntoTaskResult, TaskContext, TaskError, TaskHandler, TaskKind};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct NightlySweep {
///     retention_days: u32,
/// }
///
/// impl TaskHandler for NightlySweep {
///     const KIND: TaskKind = TaskKind::CleanupOldJobs;
///
///     async fn run(self, _ctx: TaskContext) -> impl IntoTaskResult {
///         Ok::<(), TaskError>(())
///     }
/// }
/// ```
pub trait TaskHandler: Serialize + DeserializeOwned + Send + 'static {
    /// Which jobs this handler consumes.
    const KIND: TaskKind;

    /// Wall clock limit for one attempt. A handler still running past it
    /// is aborted and the job fails for good, a handler that blew its
    /// limit once will blow it again. `None` means no enforced limit.
    const TIMEOUT: Option<Duration> = None;

    fn run(self, ctx: TaskContext) -> impl Future<Output = impl IntoTaskResult> + Send;
}

/// Type-erased handler invocation, boxed so registrations of different
/// handler types share one map.
pub(crate) type TaskFn = Box<
    dyn Fn(TaskContext) -> Pin<Box<dyn Future<Output = Result<Option<Value>, TaskError>> + Send>>
        + Send
        + Sync,
>;

/// What the worker keeps per registered task kind.
pub(crate) struct TaskRegistration {
    pub(crate) run: TaskFn,
    pub(crate) timeout: Option<Duration>,
}

impl TaskRegistration {
    pub(crate) fn of<T: TaskHandler>() -> Self {
        TaskRegistration {
            run: Box::new(|ctx| run_task_from_ctx::<T>(ctx).boxed()),
            timeout: T::TIMEOUT,
        }
    }
}

async fn run_task_from_ctx<T: TaskHandler>(
    ctx: TaskContext,
) -> Result<Option<Value>, TaskError> {
    // A payload that does not deserialize will not heal on retry.
    let task: T = serde_json::from_value(ctx.payload().clone())
        .map_err(|e| TaskError::fatal(format!("Failed to deserialize payload: {e}")))?;
    task.run(ctx).await.into_task_result()
}
