//! Bearer-token injection for the request pipeline.

use refetch_core::credentials::CredentialStore;
use refetch_core::environment::Clock;
use refetch_core::request::Request;
use std::sync::Arc;

/// Build a request hook that injects stored bearer credentials.
///
/// The hook reads the credential store on every invocation, so a token
/// written by a later re-authentication is picked up without re-registering
/// anything. A missing or expired token leaves the request untouched, and an
/// `Authorization` header already on the request is replaced rather than
/// duplicated.
///
/// # Example
///
/// ```
/// use refetch_core::credentials::{AuthToken, CredentialStore};
/// use refetch_core::request::Request;
/// use refetch_pipeline::bearer_auth_hook;
/// use refetch_testing::{MemoryCredentialStore, test_clock};
/// use std::sync::Arc;
///
/// let credentials = MemoryCredentialStore::new();
/// credentials.set(AuthToken::new("secret"));
///
/// let hook = bearer_auth_hook(Arc::new(credentials), Arc::new(test_clock()));
/// let request = hook(Request::get("/profile"));
///
/// assert_eq!(request.header("Authorization"), Some("Bearer secret"));
/// ```
pub fn bearer_auth_hook(
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
) -> impl Fn(Request) -> Request + Send + Sync {
    move |mut request| {
        match credentials.get() {
            Some(token) if !token.is_expired(clock.now()) => {
                request.set_header("Authorization", token.bearer());
            },
            Some(_) => {
                tracing::debug!("Stored token is expired, sending without credentials");
            },
            None => {},
        }
        request
    }
}
