//! Credential storage and re-authentication traits.
//!
//! This module defines the collaborators the pipeline's auth machinery talks
//! to: an [`AuthToken`] value, a [`CredentialStore`] that holds the current
//! token, and an [`Authenticator`] that can obtain a fresh one when the
//! server rejects a request as unauthenticated.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// A bearer token with an optional expiry.
///
/// # Examples
///
/// ```
/// use refetch_core::credentials::AuthToken;
///
/// let token = AuthToken::new("abc123");
/// assert_eq!(token.bearer(), "Bearer abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// The raw token value.
    pub value: String,

    /// Expiration time, if the issuer communicated one. `None` means the
    /// token does not expire (or expiry is unknown and enforced server-side).
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    /// Create a token without an expiry.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// Create a token that expires at the given time.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use refetch_core::credentials::AuthToken;
    ///
    /// let expiry = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    /// let token = AuthToken::expiring("abc123".to_string(), expiry);
    /// assert!(token.is_expired(expiry));
    /// ```
    #[must_use]
    pub const fn expiring(value: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: Some(expires_at),
        }
    }

    /// Render the token as an `Authorization` header value.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }

    /// Check whether the token is expired at the given instant.
    ///
    /// A token whose `expires_at` equals `now` counts as expired; tokens
    /// without an expiry never expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Shared storage for the current authentication token.
///
/// The store is a synchronous collaborator: hooks read it inline while
/// transforming a request, so lookups must not await. Implementations use
/// interior mutability (`set`/`clear` take `&self`) because the store is
/// shared behind an `Arc` between the pipeline and the application.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the same store is read by
/// concurrent dispatches and written by re-authentication.
pub trait CredentialStore: Send + Sync {
    /// Get a clone of the current token, if one is stored.
    fn get(&self) -> Option<AuthToken>;

    /// Replace the stored token.
    fn set(&self, token: AuthToken);

    /// Remove the stored token.
    fn clear(&self);
}

/// Re-authentication collaborator for designated 401 recovery.
///
/// When the server answers 401 and an authenticator is installed, the
/// pipeline asks it for a fresh token exactly once per dispatch, stores the
/// result, and retries. What "re-authenticate" means (refresh grant, session
/// renewal, interactive prompt) is the application's business.
///
/// # Dyn Compatibility
///
/// This trait uses an explicit `Pin<Box<dyn Future>>` return instead of
/// `async fn` to enable trait object usage (`Arc<dyn Authenticator>`). The
/// pipeline stores the authenticator type-erased so installing one does not
/// change the pipeline's type.
pub trait Authenticator: Send + Sync {
    /// Obtain a fresh token.
    ///
    /// # Errors
    ///
    /// Returns an error when a fresh token could not be obtained; the
    /// pipeline then gives up on recovery and propagates the original
    /// failure.
    fn reauthenticate(&self) -> Pin<Box<dyn Future<Output = Result<AuthToken>> + Send + '_>>;
}
