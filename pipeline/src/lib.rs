//! # Refetch Pipeline
//!
//! Request pipeline for the refetch architecture.
//!
//! A [`Pipeline`] wraps a [`Transport`] and runs every outgoing request
//! through a fixed sequence of stages:
//!
//! 1. **Default headers** from [`PipelineConfig`] fill in what the caller
//!    left unset
//! 2. **Request hooks** transform the descriptor in registration order
//! 3. **Dispatch** hands the prepared request to the transport
//! 4. **Classification** turns the answer into `Ok(Response)` or a
//!    [`RequestError`]
//! 5. **401 recovery** re-authenticates once and replays the request when
//!    an authenticator is installed
//! 6. **Response hooks** see the outcome in registration order; a failure
//!    hook may recover it into a success
//!
//! ## Example
//!
//! ```no_run
//! use refetch_core::credentials::AuthToken;
//! use refetch_core::request::Request;
//! use refetch_pipeline::{FailureDisposition, Pipeline, PipelineConfig, bearer_auth_hook};
//! use refetch_testing::{MemoryCredentialStore, MockTransport, StaticAuthenticator, test_clock};
//! use std::sync::Arc;
//!
//! # async fn example() -> refetch_core::error::Result<()> {
//! let credentials = Arc::new(MemoryCredentialStore::with_token(AuthToken::new("abc")));
//! let authenticator = Arc::new(StaticAuthenticator::new([AuthToken::new("fresh")]));
//!
//! let config = PipelineConfig::new().with_default_header("Accept", "application/json");
//! let mut pipeline = Pipeline::with_config("https://api.example.com", MockTransport::new(), config)
//!     .with_authenticator(credentials.clone(), authenticator);
//!
//! pipeline.add_request_hook(bearer_auth_hook(credentials, Arc::new(test_clock())));
//! pipeline.add_response_hook(
//!     |response| response,
//!     |_failure| FailureDisposition::Propagate,
//! );
//!
//! let profile = pipeline.send(Request::get("/profile")).await?;
//! println!("profile arrived with status {}", profile.status);
//! # Ok(())
//! # }
//! ```

use refetch_core::credentials::{Authenticator, CredentialStore};
use refetch_core::error::{RequestError, Result};
use refetch_core::request::{Request, Response};
use refetch_core::transport::Transport;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub mod auth;

pub use auth::bearer_auth_hook;

/// Transformation applied to every outgoing request.
pub type RequestHook = Box<dyn Fn(Request) -> Request + Send + Sync>;

/// Transformation applied to every successful response.
pub type SuccessHook = Box<dyn Fn(Response) -> Response + Send + Sync>;

/// Inspection applied to every failed outcome, deciding its disposition.
pub type FailureHook = Box<dyn Fn(&RequestError) -> FailureDisposition + Send + Sync>;

/// What a failure hook decided about a failed outcome.
#[derive(Debug, PartialEq)]
pub enum FailureDisposition {
    /// Keep the failure; later hooks (and finally the caller) see it.
    Propagate,
    /// Replace the failure with a successful response. Later hooks see the
    /// replacement through their success side.
    Recover(Response),
}

/// Static configuration for a [`Pipeline`].
///
/// Default headers are applied before any request hook runs. A header the
/// caller already set on the request wins over its default.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Headers merged into every request that does not already carry them.
    pub default_headers: Vec<(String, String)>,
}

impl PipelineConfig {
    /// Create an empty configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_headers: Vec::new(),
        }
    }

    /// Add a header applied to every request that does not set it itself.
    #[must_use]
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }
}

struct ResponseHookPair {
    on_success: SuccessHook,
    on_failure: FailureHook,
}

struct AuthRecovery {
    credentials: Arc<dyn CredentialStore>,
    authenticator: Arc<dyn Authenticator>,
}

/// Transport-wrapping request pipeline.
///
/// Owns a [`Transport`] and the ordered hook chains around it. Hooks are
/// registered once during setup; [`Pipeline::send`] then runs any number of
/// requests through them concurrently (`send` takes `&self`).
pub struct Pipeline<T: Transport> {
    endpoint: String,
    transport: T,
    config: PipelineConfig,
    request_hooks: SmallVec<[RequestHook; 4]>,
    response_hooks: SmallVec<[ResponseHookPair; 4]>,
    auth: Option<AuthRecovery>,
}

impl<T: Transport> Pipeline<T> {
    /// Create a pipeline with an empty configuration.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, transport: T) -> Self {
        Self::with_config(endpoint, transport, PipelineConfig::default())
    }

    /// Create a pipeline with the given configuration.
    #[must_use]
    pub fn with_config(
        endpoint: impl Into<String>,
        transport: T,
        config: PipelineConfig,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
            config,
            request_hooks: SmallVec::new(),
            response_hooks: SmallVec::new(),
            auth: None,
        }
    }

    /// Install the collaborators for designated 401 recovery.
    ///
    /// With these installed, a `401` answer triggers one re-authentication:
    /// the fresh token is written to `credentials` and the request replays
    /// through the hook chain so the new token injects.
    #[must_use]
    pub fn with_authenticator(
        mut self,
        credentials: Arc<dyn CredentialStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        self.auth = Some(AuthRecovery {
            credentials,
            authenticator,
        });
        self
    }

    /// Register a request hook.
    ///
    /// Hooks run in registration order, each receiving the previous hook's
    /// output.
    pub fn add_request_hook<F>(&mut self, hook: F)
    where
        F: Fn(Request) -> Request + Send + Sync + 'static,
    {
        self.request_hooks.push(Box::new(hook));
        tracing::debug!(total = self.request_hooks.len(), "Registered request hook");
    }

    /// Register a response hook pair.
    ///
    /// Pairs run in registration order. A successful outcome passes through
    /// `on_success`; a failed one is shown to `on_failure`, which either
    /// propagates it or recovers it into a response for the remaining pairs.
    pub fn add_response_hook<S, F>(&mut self, on_success: S, on_failure: F)
    where
        S: Fn(Response) -> Response + Send + Sync + 'static,
        F: Fn(&RequestError) -> FailureDisposition + Send + Sync + 'static,
    {
        self.response_hooks.push(ResponseHookPair {
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        });
        tracing::debug!(
            total = self.response_hooks.len(),
            "Registered response hook pair"
        );
    }

    /// The endpoint every request is dispatched against.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The pipeline's static configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Send a request through the pipeline.
    ///
    /// The request passes through the default headers and every registered
    /// request hook before the transport dispatches it. The answer is
    /// classified, runs through the designated 401 recovery when an
    /// authenticator is installed, and finally through every response hook
    /// pair in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Transport`] when the transport could not
    /// complete the exchange, [`RequestError::Protocol`] for statuses in
    /// `400..=599`, and [`RequestError::Unknown`] for statuses outside the
    /// recognized ranges - unless a response hook recovers the failure.
    #[tracing::instrument(
        skip(self, request),
        name = "pipeline_send",
        fields(method = %request.method, path = %request.path)
    )]
    pub async fn send(&self, request: Request) -> Result<Response> {
        let started = Instant::now();
        metrics::counter!("pipeline.requests.total").increment(1);

        let outcome = self.dispatch_with_recovery(request).await;
        let outcome = self.apply_response_hooks(outcome);

        metrics::histogram!("pipeline.request.duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if let Err(error) = &outcome {
            metrics::counter!("pipeline.requests.failed", "kind" => failure_kind(error))
                .increment(1);
        }
        outcome
    }

    async fn dispatch_with_recovery(&self, request: Request) -> Result<Response> {
        let first = self.dispatch_once(self.prepare(request.clone())).await;

        let unauthorized = matches!(&first, Err(error) if error.is_unauthorized());
        if !unauthorized {
            return first;
        }
        let Some(auth) = self.auth.as_ref() else {
            return first;
        };

        // One recovery attempt per send. A second 401 propagates untouched.
        tracing::warn!(path = %request.path, "Received 401, attempting re-authentication");
        metrics::counter!("pipeline.reauth.attempts").increment(1);

        match auth.authenticator.reauthenticate().await {
            Ok(token) => auth.credentials.set(token),
            Err(reauth_error) => {
                tracing::warn!(
                    error = %reauth_error,
                    "Re-authentication failed, propagating the original 401"
                );
                return first;
            },
        }

        // The replay re-runs the hook chain so the fresh token injects.
        let retried = self.dispatch_once(self.prepare(request)).await;
        match &retried {
            Ok(_) => {
                tracing::debug!("Request succeeded after re-authentication");
                metrics::counter!("pipeline.reauth.recovered").increment(1);
            },
            Err(error) => {
                tracing::warn!(error = %error, "Replay after re-authentication failed");
            },
        }
        retried
    }

    fn prepare(&self, request: Request) -> Request {
        let mut prepared = request;
        for (name, value) in &self.config.default_headers {
            // A header the caller already set wins over its default.
            if prepared.header(name).is_none() {
                prepared = prepared.with_header(name.clone(), value.clone());
            }
        }
        for hook in &self.request_hooks {
            prepared = hook(prepared);
        }
        prepared
    }

    async fn dispatch_once(&self, request: Request) -> Result<Response> {
        tracing::debug!(method = %request.method, path = %request.path, "Dispatching request");
        let response = self.transport.dispatch(&self.endpoint, request).await?;
        classify(response)
    }

    fn apply_response_hooks(&self, mut outcome: Result<Response>) -> Result<Response> {
        for pair in &self.response_hooks {
            outcome = match outcome {
                Ok(response) => Ok((pair.on_success)(response)),
                Err(error) => match (pair.on_failure)(&error) {
                    FailureDisposition::Propagate => Err(error),
                    FailureDisposition::Recover(response) => {
                        tracing::debug!(
                            status = response.status,
                            "Response hook recovered a failure"
                        );
                        metrics::counter!("pipeline.hooks.recovered").increment(1);
                        Ok(response)
                    },
                },
            };
        }
        outcome
    }
}

impl<T: Transport> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("endpoint", &self.endpoint)
            .field("request_hooks", &self.request_hooks.len())
            .field("response_hooks", &self.response_hooks.len())
            .field("authenticated", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

/// Classify a transport answer into the failure taxonomy.
///
/// `2xx` is success, `400..=599` is a protocol failure carrying the server's
/// message, and anything else is unknown.
fn classify(response: Response) -> Result<Response> {
    if response.is_success() {
        return Ok(response);
    }
    match response.status {
        status @ 400..=599 => Err(RequestError::Protocol {
            status,
            message: protocol_message(&response),
        }),
        status => Err(RequestError::Unknown(format!(
            "status {status} is outside the recognized success and failure ranges"
        ))),
    }
}

/// Best-effort extraction of the server's error message.
///
/// Looks for an `error` field (a string, or an object with a `message`)
/// and then a top-level `message` before falling back to the status code.
fn protocol_message(response: &Response) -> String {
    let from_body = response.body.as_ref().and_then(|body| {
        let error = body.get("error");
        error
            .and_then(serde_json::Value::as_str)
            .or_else(|| {
                error
                    .and_then(|detail| detail.get("message"))
                    .and_then(serde_json::Value::as_str)
            })
            .or_else(|| body.get("message").and_then(serde_json::Value::as_str))
            .map(str::to_string)
    });
    from_body.unwrap_or_else(|| format!("request rejected with status {}", response.status))
}

const fn failure_kind(error: &RequestError) -> &'static str {
    match error {
        RequestError::Transport(_) => "transport",
        RequestError::Protocol { .. } => "protocol",
        RequestError::Unknown(_) => "unknown",
    }
}
