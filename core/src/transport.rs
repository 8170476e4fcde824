//! Transport trait.
//!
//! This module defines the seam between the pipeline and whatever actually
//! moves bytes. The pipeline never talks to an HTTP client directly; it hands
//! the final hook-transformed [`Request`] to a [`Transport`] and receives
//! either a [`Response`] descriptor or a [`TransportFailure`].

use crate::error::TransportFailure;
use crate::request::{Request, Response};
use std::future::Future;

/// Transport abstraction for dispatching requests.
///
/// A transport receives the base endpoint plus the final request descriptor
/// and produces whatever the server answered, without judging it: a response
/// with *any* status code is an `Ok`. Only failures that prevented a response
/// from being obtained at all (connect errors, timeouts) are `Err`.
/// Classifying response statuses is the pipeline's job, not the transport's.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a pipeline is shared across tasks
/// and dispatches concurrently.
///
/// # Implementation Notes
///
/// - The returned future must be `Send` (dispatch happens inside spawned
///   tasks).
/// - The transport must not retry on its own; retry decisions belong to the
///   pipeline's recovery logic.
///
/// # Examples
///
/// ```no_run
/// use refetch_core::error::TransportFailure;
/// use refetch_core::request::{Request, Response};
/// use refetch_core::transport::Transport;
///
/// struct AlwaysOk;
///
/// impl Transport for AlwaysOk {
///     async fn dispatch(
///         &self,
///         _endpoint: &str,
///         _request: Request,
///     ) -> Result<Response, TransportFailure> {
///         Ok(Response::new(200))
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Dispatch a request against the given base endpoint.
    ///
    /// # Arguments
    ///
    /// - `endpoint`: The pipeline's base endpoint (e.g. `"https://api.example.com"`)
    /// - `request`: The final request descriptor, after all hooks ran
    ///
    /// # Errors
    ///
    /// Returns [`TransportFailure`] only when no response was obtained:
    /// the endpoint was unreachable or the deadline elapsed. A response with
    /// a failure status code is still `Ok`.
    fn dispatch(
        &self,
        endpoint: &str,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportFailure>> + Send;
}
