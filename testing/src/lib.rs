//! # Refetch Testing
//!
//! Testing utilities and helpers for the refetch architecture.
//!
//! This crate provides:
//! - Mock implementations of the core trait seams (`Transport`,
//!   `CredentialStore`, `Authenticator`, `Clock`)
//! - Test helpers for tracing setup
//!
//! ## Example
//!
//! ```
//! use refetch_core::credentials::{AuthToken, CredentialStore};
//! use refetch_core::request::{Request, Response};
//! use refetch_core::transport::Transport;
//! use refetch_testing::{MemoryCredentialStore, MockTransport};
//!
//! let transport = MockTransport::new();
//! transport.respond_with(Response::new(200));
//!
//! let credentials = MemoryCredentialStore::new();
//! credentials.set(AuthToken::new("abc"));
//!
//! let response = tokio_test::block_on(
//!     transport.dispatch("https://api.example.com", Request::get("/orders")),
//! );
//! assert_eq!(response.map(|r| r.status), Ok(200));
//! assert_eq!(transport.dispatch_count(), 1);
//! assert_eq!(credentials.get().map(|t| t.value), Some("abc".to_string()));
//! ```

use chrono::{DateTime, Utc};
use refetch_core::environment::Clock;

/// Mock implementations of the core trait seams.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use refetch_core::credentials::{AuthToken, Authenticator, CredentialStore};
    use refetch_core::error::{RequestError, Result, TransportFailure};
    use refetch_core::request::{Request, Response};
    use refetch_core::transport::Transport;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making expiry logic reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use refetch_testing::mocks::FixedClock;
    /// use refetch_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Scripted transport for pipeline tests
    ///
    /// Answers dispatches from a queue of scripted outcomes and records every
    /// dispatched request for later inspection. Clones share the script and
    /// the recording, so a test can keep a handle while the pipeline owns
    /// another.
    ///
    /// An exhausted script answers `200` with an empty body.
    ///
    /// # Example
    ///
    /// ```
    /// use refetch_core::request::{Request, Response};
    /// use refetch_core::transport::Transport;
    /// use refetch_testing::mocks::MockTransport;
    ///
    /// let transport = MockTransport::new();
    /// transport.respond_with(Response::new(404));
    ///
    /// let response = tokio_test::block_on(
    ///     transport.dispatch("https://api.example.com", Request::get("/missing")),
    /// );
    /// assert_eq!(response.map(|r| r.status), Ok(404));
    /// assert_eq!(transport.dispatch_count(), 1);
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct MockTransport {
        script: Arc<Mutex<VecDeque<Result<Response, TransportFailure>>>>,
        dispatched: Arc<Mutex<Vec<(String, Request)>>>,
    }

    impl MockTransport {
        /// Create a new mock transport with an empty script.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful response for the next unanswered dispatch.
        pub fn respond_with(&self, response: Response) {
            self.script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Ok(response));
        }

        /// Queue a transport failure for the next unanswered dispatch.
        pub fn fail_with(&self, failure: TransportFailure) {
            self.script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Err(failure));
        }

        /// All dispatches recorded so far, as `(endpoint, request)` pairs.
        #[must_use]
        pub fn dispatched(&self) -> Vec<(String, Request)> {
            self.dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of dispatches recorded so far.
        #[must_use]
        pub fn dispatch_count(&self) -> usize {
            self.dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }

    impl Transport for MockTransport {
        fn dispatch(
            &self,
            endpoint: &str,
            request: Request,
        ) -> impl Future<Output = Result<Response, TransportFailure>> + Send {
            self.dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((endpoint.to_string(), request));
            let outcome = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            async move { outcome.unwrap_or_else(|| Ok(Response::new(200))) }
        }
    }

    /// In-memory credential store
    ///
    /// Holds at most one token behind a mutex. Clones share the slot, so a
    /// test can seed or inspect credentials while the pipeline holds its own
    /// handle.
    ///
    /// # Example
    ///
    /// ```
    /// use refetch_core::credentials::{AuthToken, CredentialStore};
    /// use refetch_testing::mocks::MemoryCredentialStore;
    ///
    /// let store = MemoryCredentialStore::new();
    /// assert!(store.get().is_none());
    ///
    /// store.set(AuthToken::new("secret"));
    /// assert_eq!(store.get().map(|t| t.value), Some("secret".to_string()));
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct MemoryCredentialStore {
        token: Arc<Mutex<Option<AuthToken>>>,
    }

    impl MemoryCredentialStore {
        /// Create an empty credential store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a store pre-seeded with a token.
        #[must_use]
        pub fn with_token(token: AuthToken) -> Self {
            let store = Self::default();
            store.set(token);
            store
        }
    }

    impl CredentialStore for MemoryCredentialStore {
        fn get(&self) -> Option<AuthToken> {
            self.token
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn set(&self, token: AuthToken) {
            *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        }

        fn clear(&self) {
            *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// Authenticator that issues tokens from a fixed queue
    ///
    /// Each `reauthenticate` call pops the next token and bumps a call
    /// counter. An exhausted queue fails the call, which makes the
    /// no-more-credentials path easy to script.
    #[derive(Debug, Clone, Default)]
    pub struct StaticAuthenticator {
        tokens: Arc<Mutex<VecDeque<AuthToken>>>,
        calls: Arc<AtomicUsize>,
    }

    impl StaticAuthenticator {
        /// Create an authenticator that issues the given tokens in order.
        #[must_use]
        pub fn new(tokens: impl IntoIterator<Item = AuthToken>) -> Self {
            Self {
                tokens: Arc::new(Mutex::new(tokens.into_iter().collect())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Create an authenticator whose every call fails.
        #[must_use]
        pub fn failing() -> Self {
            Self::new([])
        }

        /// Number of `reauthenticate` calls made so far.
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Authenticator for StaticAuthenticator {
        fn reauthenticate(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<AuthToken>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .tokens
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            Box::pin(async move {
                next.ok_or_else(|| {
                    RequestError::Unknown("authenticator has no more tokens to issue".to_string())
                })
            })
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a tracing subscriber that writes to the test harness.
    ///
    /// Safe to call from every test; only the first call in a process wins.
    /// Filtering follows `RUST_LOG`.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::init_tracing;
pub use mocks::{
    FixedClock, MemoryCredentialStore, MockTransport, StaticAuthenticator, test_clock,
};
