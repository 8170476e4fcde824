//! Re-triggerable async operation state machine.
//!
//! An [`AsyncOperation`] wraps a single-shot asynchronous function into an
//! observable, re-triggerable unit of state. Every trigger starts a fresh
//! invocation; consumers observe one [`OperationSnapshot`] that always
//! reflects the most recently triggered invocation, no matter in which order
//! in-flight invocations actually complete.
//!
//! # Supersession
//!
//! Each trigger mints a new [`InvocationToken`]. When an invocation settles,
//! its token is compared against the operation's active token under the
//! lifecycle lock: only the still-active invocation may write state. Results
//! from superseded invocations are dropped unconditionally - last trigger
//! wins, with no assumption about completion order.
//!
//! # Disposal
//!
//! Disposing an operation (explicitly or by dropping it) freezes observable
//! state permanently. In-flight invocations run to completion but their
//! results are discarded. Triggering a disposed operation fails loudly with
//! [`OperationError::Disposed`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{oneshot, watch};

/// Errors that can occur when driving an operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// The operation was disposed and no longer accepts triggers.
    ///
    /// Triggering after disposal is a caller bug; the error is returned
    /// rather than silently ignored so the bug surfaces.
    #[error("Operation has been disposed")]
    Disposed,
}

/// Failure reported by a [`TriggerHandle`] for one invocation.
///
/// The handle always reports its own invocation's outcome, even when the
/// invocation was superseded and its result never reached the snapshot.
#[derive(Debug, Error, PartialEq)]
pub enum TriggerError<E> {
    /// The bound function rejected with its own error.
    #[error("{0}")]
    Failed(E),

    /// The settlement task was torn down before the invocation settled
    /// (runtime shutdown).
    #[error("Invocation aborted before settling")]
    Aborted,
}

/// Lifecycle status of an operation.
///
/// Exactly one status is current at any time. `data` and `error` live in the
/// [`OperationSnapshot`] alongside the status; the status alone answers "is
/// something in flight right now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Never triggered since construction.
    Idle,

    /// The most recent invocation has not settled yet.
    Pending,

    /// The most recent invocation resolved successfully.
    Succeeded,

    /// The most recent invocation rejected.
    Failed,
}

impl OperationStatus {
    /// Check if the operation has never been triggered.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if an invocation is in flight.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if the most recent invocation succeeded.
    #[must_use]
    pub const fn is_succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Check if the most recent invocation failed.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Consumer-facing view of an operation's state.
///
/// # Staleness
///
/// `data` holds the last successful payload and is retained through later
/// `Pending` and `Failed` states until a new success replaces it, so
/// consumers can keep rendering the previous result while a refresh is in
/// flight. `error` describes the most recent failure and is cleared at the
/// start of every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot<T> {
    /// Current lifecycle status.
    pub status: OperationStatus,

    /// Last successful payload, possibly stale.
    pub data: Option<T>,

    /// Normalized description of the most recent failure.
    pub error: Option<String>,
}

impl<T> OperationSnapshot<T> {
    /// The initial snapshot: idle, no data, no error.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            status: OperationStatus::Idle,
            data: None,
            error: None,
        }
    }

    /// Check whether previously loaded data is being shown while a newer
    /// invocation is in flight.
    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        self.status.is_pending() && self.data.is_some()
    }
}

impl<T> Default for OperationSnapshot<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// Identifier of one invocation of an operation.
///
/// Tokens are minted in strictly increasing order; the operation remembers
/// only the most recent one. A settling invocation whose token no longer
/// matches has been superseded and may not write state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationToken(u64);

impl InvocationToken {
    /// Get the raw token value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvocationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one triggered invocation.
///
/// Returned by [`AsyncOperation::trigger()`]. The handle settles with the
/// invocation's own outcome in every case - including when the invocation
/// was superseded or the operation was disposed before it completed - so
/// awaiting a handle never hangs on account of supersession.
///
/// # Example
///
/// ```no_run
/// use refetch_runtime::{AsyncOperation, TriggerError};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let operation = AsyncOperation::new(|n: u32| async move { Ok::<_, String>(n * 10) });
/// let handle = operation.trigger(3)?;
/// match handle.outcome().await {
///     Ok(value) => println!("resolved: {value:?}"),
///     Err(TriggerError::Failed(e)) => println!("rejected: {e}"),
///     Err(TriggerError::Aborted) => println!("runtime tore the task down"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct TriggerHandle<T, E> {
    token: InvocationToken,
    settled: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> TriggerHandle<T, E> {
    /// Get the token identifying this invocation.
    #[must_use]
    pub const fn token(&self) -> InvocationToken {
        self.token
    }

    /// Wait for this invocation to settle and return its own outcome.
    ///
    /// Supersession does not affect the returned value: a superseded
    /// invocation's handle still yields whatever the bound function produced
    /// for it.
    ///
    /// # Errors
    ///
    /// - [`TriggerError::Failed`]: the bound function rejected
    /// - [`TriggerError::Aborted`]: the settlement task was torn down before
    ///   settling
    pub async fn outcome(self) -> Result<T, TriggerError<E>> {
        match self.settled.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(TriggerError::Failed(error)),
            Err(_) => Err(TriggerError::Aborted),
        }
    }
}

type InvocationFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Shared record between the operation, its settlement tasks, and Drop.
struct Shared<T> {
    lifecycle: Mutex<Lifecycle>,
    state: watch::Sender<OperationSnapshot<T>>,
}

struct Lifecycle {
    /// Token value of the most recently started invocation; 0 means none.
    active: u64,
    disposed: bool,
}

impl<T> Shared<T> {
    fn dispose(&self) {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if lifecycle.disposed {
            return;
        }
        lifecycle.disposed = true;
        tracing::debug!("Operation disposed");
        metrics::counter!("operation.disposals.total").increment(1);
    }

    /// Apply one invocation's result to observable state, or drop it.
    ///
    /// The lifecycle lock spans the token comparison and the state write so
    /// a superseding trigger cannot interleave between the two.
    fn settle<E>(&self, token: InvocationToken, result: &Result<T, E>)
    where
        T: Clone,
        E: fmt::Display,
    {
        let lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if lifecycle.disposed {
            tracing::warn!(invocation = token.value(), "Dropping result: operation disposed");
            metrics::counter!("operation.results.dropped", "reason" => "disposed").increment(1);
            return;
        }

        if lifecycle.active != token.value() {
            tracing::warn!(
                invocation = token.value(),
                active = lifecycle.active,
                "Dropping stale result: invocation superseded"
            );
            metrics::counter!("operation.results.dropped", "reason" => "superseded").increment(1);
            return;
        }

        match result {
            Ok(value) => {
                self.state.send_modify(|snapshot| {
                    snapshot.status = OperationStatus::Succeeded;
                    snapshot.data = Some(value.clone());
                    snapshot.error = None;
                });
                tracing::debug!(invocation = token.value(), "Invocation succeeded");
                metrics::counter!("operation.settlements.total", "outcome" => "success")
                    .increment(1);
            },
            Err(error) => {
                let message = normalized_message(error);
                self.state.send_modify(|snapshot| {
                    snapshot.status = OperationStatus::Failed;
                    snapshot.error = Some(message);
                    // Stale data stays visible until a new success replaces it.
                });
                tracing::debug!(invocation = token.value(), "Invocation failed");
                metrics::counter!("operation.settlements.total", "outcome" => "failure")
                    .increment(1);
            },
        }
    }
}

/// Normalize a failure into the message stored in the snapshot.
fn normalized_message<E: fmt::Display>(error: &E) -> String {
    let text = error.to_string();
    if text.is_empty() {
        "Operation failed".to_string()
    } else {
        text
    }
}

/// Re-triggerable async operation.
///
/// Wraps a bound function `Fn(Args) -> Future<Output = Result<T, E>>` and
/// manages its lifecycle: status transitions, last successful payload,
/// normalized error text, supersession of in-flight invocations, and
/// disposal.
///
/// # Type Parameters
///
/// - `Args`: Input accepted by each trigger
/// - `T`: Success payload stored in the snapshot
/// - `E`: The bound function's failure type (its `Display` text feeds the
///   snapshot's `error`)
///
/// # Concurrency
///
/// - `trigger` is synchronous: the token is minted and `Pending` becomes
///   observable before it returns.
/// - The bound function runs in a spawned task; results are applied under
///   the lifecycle lock only when the invocation is still active.
/// - The operation is not `Clone`. Share snapshots via [`subscribe`], not
///   the operation itself; dropping the operation disposes it.
///
/// [`subscribe`]: AsyncOperation::subscribe
///
/// # Example
///
/// ```no_run
/// use refetch_runtime::AsyncOperation;
///
/// # async fn fetch_user(user_id: u64) -> Result<String, String> { Ok(format!("user-{user_id}")) }
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let operation = AsyncOperation::new(|user_id: u64| async move {
///     fetch_user(user_id).await
/// });
///
/// let mut updates = operation.subscribe();
/// operation.trigger(42)?;
///
/// updates.changed().await?;
/// println!("status is now {}", updates.borrow().status);
/// # Ok(())
/// # }
/// ```
pub struct AsyncOperation<Args, T, E> {
    run: Arc<dyn Fn(Args) -> InvocationFuture<T, E> + Send + Sync>,
    shared: Arc<Shared<T>>,
}

impl<Args, T, E> AsyncOperation<Args, T, E>
where
    T: Clone + Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Create an operation from a bound function.
    ///
    /// The operation starts `Idle` with no data and no error. Nothing runs
    /// until the first [`trigger`](AsyncOperation::trigger).
    ///
    /// # Arguments
    ///
    /// - `run`: The bound function invoked on every trigger. Failures must
    ///   be the `Err` arm of its result, never an `Ok` payload describing an
    ///   error.
    #[must_use]
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (state, _) = watch::channel(OperationSnapshot::idle());

        Self {
            run: Arc::new(move |args| -> InvocationFuture<T, E> { Box::pin(run(args)) }),
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    active: 0,
                    disposed: false,
                }),
                state,
            }),
        }
    }

    /// Start a new invocation, superseding any invocation still in flight.
    ///
    /// Minting the token, flipping the status to `Pending`, and clearing the
    /// previous `error` happen atomically under the lifecycle lock before
    /// this method returns; `data` keeps the last successful payload until a
    /// new success replaces it.
    ///
    /// # Arguments
    ///
    /// - `args`: Input passed to the bound function for this invocation
    ///
    /// # Returns
    ///
    /// A [`TriggerHandle`] that settles with this invocation's own outcome,
    /// superseded or not.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Disposed`] if the operation was disposed.
    /// The bound function's failures are never returned here; they are
    /// captured into the snapshot's `error`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use refetch_runtime::AsyncOperation;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let operation =
    /// #     AsyncOperation::new(|page: &'static str| async move { Ok::<_, String>(page.len()) });
    /// let first = operation.trigger("page-1")?;
    /// let second = operation.trigger("page-2")?; // supersedes the first
    ///
    /// // Both handles settle; only the second invocation's result can
    /// // reach the snapshot.
    /// let _ = first.outcome().await;
    /// let page2 = second.outcome().await?;
    /// # println!("{page2} bytes");
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, args), name = "operation_trigger")]
    pub fn trigger(&self, args: Args) -> Result<TriggerHandle<T, E>, OperationError> {
        let token = {
            let mut lifecycle = self
                .shared
                .lifecycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if lifecycle.disposed {
                tracing::warn!("Rejected trigger: operation is disposed");
                metrics::counter!("operation.disposed.rejected_triggers").increment(1);
                return Err(OperationError::Disposed);
            }

            lifecycle.active += 1;
            let token = InvocationToken(lifecycle.active);

            // Pending is observable before trigger returns. Error clears per
            // invocation; data survives until a new success replaces it.
            self.shared.state.send_modify(|snapshot| {
                snapshot.status = OperationStatus::Pending;
                snapshot.error = None;
            });

            token
        };

        tracing::debug!(invocation = token.value(), "Invocation started");
        metrics::counter!("operation.triggers.total").increment(1);

        let future = (self.run)(args);
        let (settled_tx, settled_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let result = future.await;
            metrics::histogram!("operation.invocation.duration_seconds")
                .record(started.elapsed().as_secs_f64());

            shared.settle(token, &result);

            // The handle settles regardless of supersession; a dropped
            // handle just ignores the send.
            let _ = settled_tx.send(result);
        });

        Ok(TriggerHandle {
            token,
            settled: settled_rx,
        })
    }

    /// Dispose the operation.
    ///
    /// Idempotent. After disposal no observable mutation happens: in-flight
    /// invocations run to completion but their results are dropped, and
    /// further triggers return [`OperationError::Disposed`]. The snapshot
    /// keeps whatever it held at disposal time.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    /// Check whether the operation has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disposed
    }

    /// Subscribe to snapshot updates.
    ///
    /// Returns a watch receiver: `borrow()` reads the current snapshot,
    /// `changed().await` wakes on the next mutation after subscribing. Every
    /// trigger and every applied settlement produces a notification.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use refetch_runtime::{AsyncOperation, OperationSnapshot};
    /// # fn render(snapshot: &OperationSnapshot<u32>) { let _ = snapshot; }
    /// # async fn example() {
    /// # let operation = AsyncOperation::new(|n: u32| async move { Ok::<_, String>(n) });
    /// let mut updates = operation.subscribe();
    /// while updates.changed().await.is_ok() {
    ///     render(&updates.borrow());
    /// }
    /// # }
    /// ```
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OperationSnapshot<T>> {
        self.shared.state.subscribe()
    }

    /// Get an owned copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> OperationSnapshot<T> {
        self.shared.state.borrow().clone()
    }

    /// Read the current snapshot via a closure.
    ///
    /// Access state through a closure to ensure the internal borrow is
    /// released promptly:
    ///
    /// ```
    /// # use refetch_runtime::AsyncOperation;
    /// # let operation =
    /// #     AsyncOperation::new(|n: u32| async move { Ok::<_, String>(vec![n]) });
    /// let user_count = operation.state(|s| s.data.as_ref().map_or(0, Vec::len));
    /// assert_eq!(user_count, 0);
    /// ```
    pub fn state<F, U>(&self, f: F) -> U
    where
        F: FnOnce(&OperationSnapshot<T>) -> U,
    {
        f(&self.shared.state.borrow())
    }

    /// Get the current status.
    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.shared.state.borrow().status
    }
}

impl<Args, T, E> Drop for AsyncOperation<Args, T, E> {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl<Args, T, E> fmt::Debug for AsyncOperation<Args, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self
            .shared
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("AsyncOperation")
            .field("active", &lifecycle.active)
            .field("disposed", &lifecycle.disposed)
            .finish_non_exhaustive()
    }
}
