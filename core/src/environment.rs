//! Injected dependencies.
//!
//! External concerns are abstracted behind traits so production code and
//! tests share the same call sites. Time is the only ambient dependency this
//! crate needs: token expiry checks go through [`Clock`] so tests can pin
//! the instant.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability.
///
/// # Examples
///
/// ```
/// use refetch_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
