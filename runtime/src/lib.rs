//! # Refetch Runtime
//!
//! Runtime implementation for the refetch architecture.
//!
//! This crate provides the [`AsyncOperation`] state machine that turns a
//! single-shot async function into an observable, re-triggerable unit of
//! state, plus the Prometheus metrics module.
//!
//! ## Core Components
//!
//! - **`AsyncOperation`**: owns the bound function and manages the
//!   Idle/Pending/Succeeded/Failed lifecycle with last-trigger-wins
//!   supersession
//! - **`TriggerHandle`**: per-invocation handle that always settles with its
//!   own outcome
//! - **`MetricsServer`**: Prometheus endpoint describing and serving the
//!   refetch metric families
//!
//! ## Example
//!
//! ```no_run
//! use refetch_runtime::{AsyncOperation, OperationSnapshot};
//!
//! # async fn search(query: String) -> Result<Vec<String>, String> { Ok(vec![query]) }
//! # fn render(snapshot: &OperationSnapshot<Vec<String>>) { let _ = snapshot; }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let operation = AsyncOperation::new(|query: String| async move {
//!     search(query).await
//! });
//!
//! // Trigger and observe
//! let handle = operation.trigger("rust watch channels".to_string())?;
//! let results = handle.outcome().await?;
//! println!("{} results", results.len());
//!
//! // Or bind reactively
//! let mut updates = operation.subscribe();
//! while updates.changed().await.is_ok() {
//!     render(&updates.borrow());
//! }
//! # Ok(())
//! # }
//! ```

/// Re-triggerable async operation state machine
pub mod operation;

/// Prometheus metrics for observability
pub mod metrics;

pub use operation::{
    AsyncOperation, InvocationToken, OperationError, OperationSnapshot, OperationStatus,
    TriggerError, TriggerHandle,
};
