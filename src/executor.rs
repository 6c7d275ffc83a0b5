//! Bounded parallel task execution.
//!
//! [`parallel_limit`] runs a batch of tasks with at most `limit` of them in
//! flight at once and hands back their results in submission order.
//!
//! # Architecture
//!
//! ```text
//!   tasks ──► inbox (TaskSlot) ──► agent 0 ─┐
//!                              ├─► agent 1 ─┼──► outbox (ResultSlot) ──► results[index]
//!                              └─► agent k ─┘
//!                                     │
//!                                     ▼ on error
//!                                ErrorLatch ──► cancels every agent
//! ```
//!
//! Both channels are sized to the number of tasks, so neither the initial
//! submission nor result publication ever waits on a slow consumer.
//!
//! # Example
//!
//! ```
//! use delorean::executor::parallel_limit;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let tasks: Vec<_> = (0..4)
//!     .map(|i| move || async move { Ok::<_, std::io::Error>(i * 10) })
//!     .collect();
//!
//! let results = parallel_limit(&CancellationToken::new(), tasks, 2).await.unwrap();
//! assert_eq!(results, vec![0, 10, 20, 30]);
//! # }
//! ```

use std::future::Future;

use futures::future::{BoxFuture, join_all};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A boxed niladic task.
///
/// Use this when a batch mixes closures of different types; homogeneous
/// batches can pass their closures to [`parallel_limit`] directly.
pub type Task<'a, T, E> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a>;

/// Errors returned by [`parallel_limit`].
#[derive(Debug, thiserror::Error)]
pub enum ParallelError<E> {
    /// The caller's cancellation token fired before every task finished.
    #[error("execution cancelled")]
    Cancelled,

    /// A task failed. Carries the first error reported by any task.
    #[error("task failed: {0}")]
    TaskFailed(E),
}

impl<E> ParallelError<E> {
    /// Returns the task error, if this is [`ParallelError::TaskFailed`].
    pub fn into_task_error(self) -> Option<E> {
        match self {
            ParallelError::TaskFailed(err) => Some(err),
            ParallelError::Cancelled => None,
        }
    }
}

struct TaskSlot<F> {
    index: usize,
    task: F,
}

struct ResultSlot<T> {
    index: usize,
    value: T,
}

/// How an agent stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentExit {
    /// The inbox ran dry.
    Drained,
    /// The agent observed cancellation (ambient or from the latch).
    Cancelled,
    /// The agent's own task failed and was reported to the latch.
    Failed,
}

/// Records the first task error and stops the remaining agents.
struct ErrorLatch<E> {
    first: Mutex<Option<E>>,
    token: CancellationToken,
}

impl<E> ErrorLatch<E> {
    fn new(token: CancellationToken) -> Self {
        Self {
            first: Mutex::new(None),
            token,
        }
    }

    async fn record(&self, err: E) {
        let mut first = self.first.lock().await;
        if first.is_none() {
            *first = Some(err);
        }
        // Later errors are dropped here.
        self.token.cancel();
    }

    fn into_inner(self) -> Option<E> {
        self.first.into_inner()
    }
}

/// Runs `tasks` with at most `limit` of them executing concurrently.
///
/// Returns the task results in the same order as `tasks`, or the first
/// error reported by any task. A `limit` of zero is treated as one.
///
/// Cancellation is checked when an agent picks up the next task and when it
/// publishes a result; a task that is already running is never interrupted,
/// so long-running tasks should watch the token themselves. This function
/// returns only after every agent has stopped.
///
/// # Errors
///
/// - [`ParallelError::TaskFailed`] with the first task error. Remaining
///   tasks are not started and late errors are discarded.
/// - [`ParallelError::Cancelled`] if `cancel` fired before all results
///   were published.
pub async fn parallel_limit<T, E, F, Fut>(
    cancel: &CancellationToken,
    tasks: Vec<F>,
    limit: usize,
) -> Result<Vec<T>, ParallelError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total = tasks.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let workers = limit.max(1).min(total);
    debug!(tasks = total, workers, "Starting bounded parallel run");

    let (inbox_tx, inbox_rx) = mpsc::channel::<TaskSlot<F>>(total);
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<ResultSlot<T>>(total);

    for (index, task) in tasks.into_iter().enumerate() {
        // Capacity matches the task count, so this never waits.
        if inbox_tx.send(TaskSlot { index, task }).await.is_err() {
            break;
        }
    }
    drop(inbox_tx);

    let inbox = Mutex::new(inbox_rx);
    let latch = ErrorLatch::new(cancel.child_token());

    let exits = join_all((0..workers).map(|_| agent(&inbox, outbox_tx.clone(), &latch))).await;
    drop(outbox_tx);

    if let Some(err) = latch.into_inner() {
        return Err(ParallelError::TaskFailed(err));
    }
    if exits.contains(&AgentExit::Cancelled) {
        debug!("Bounded parallel run cancelled");
        return Err(ParallelError::Cancelled);
    }

    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Ok(ResultSlot { index, value }) = outbox_rx.try_recv() {
        results[index] = Some(value);
    }

    results
        .into_iter()
        .collect::<Option<Vec<T>>>()
        .ok_or(ParallelError::Cancelled)
}

async fn agent<T, E, F, Fut>(
    inbox: &Mutex<mpsc::Receiver<TaskSlot<F>>>,
    outbox: mpsc::Sender<ResultSlot<T>>,
    latch: &ErrorLatch<E>,
) -> AgentExit
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        let slot = tokio::select! {
            biased;
            _ = latch.token.cancelled() => return AgentExit::Cancelled,
            slot = async { inbox.lock().await.recv().await } => slot,
        };

        let Some(TaskSlot { index, task }) = slot else {
            return AgentExit::Drained;
        };

        match task().await {
            Ok(value) => {
                tokio::select! {
                    biased;
                    _ = latch.token.cancelled() => return AgentExit::Cancelled,
                    sent = outbox.send(ResultSlot { index, value }) => {
                        if sent.is_err() {
                            return AgentExit::Cancelled;
                        }
                    }
                }
            }
            Err(err) => {
                latch.record(err).await;
                return AgentExit::Failed;
            }
        }
    }
}
