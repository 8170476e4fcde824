//! # Refetch Core
//!
//! Core types and traits for the refetch architecture.
//!
//! This crate provides the shared vocabulary for the two refetch components:
//! the request pipeline (`refetch-pipeline`) and the operation runtime
//! (`refetch-runtime`). It contains plain data and trait seams only - no
//! runtime, no I/O.
//!
//! ## Core Concepts
//!
//! - **Request / Response**: transport-agnostic descriptors of an outgoing
//!   call and its answer
//! - **`RequestError`**: the failure taxonomy every failed dispatch is
//!   classified into (`Transport` / `Protocol` / `Unknown`)
//! - **Transport**: the seam between the pipeline and whatever moves bytes
//! - **`CredentialStore` / `Authenticator`**: collaborators for bearer-token
//!   injection and designated 401 recovery
//! - **Clock**: injected time, so expiry logic is testable
//!
//! ## Architecture Principles
//!
//! - Descriptors are values; hooks transform them by value
//! - External dependencies are injected via traits
//! - Errors are typed end to end (no stringly-typed plumbing)
//!
//! ## Example
//!
//! ```
//! use refetch_core::request::{Request, Response};
//! use serde_json::json;
//!
//! // A Pipeline (refetch-pipeline) runs this descriptor through its hooks
//! // and hands the result to a Transport implementation.
//! let request = Request::post("/orders")
//!     .with_header("Accept", "application/json")
//!     .with_body(json!({ "sku": "A-17", "qty": 2 }));
//!
//! assert_eq!(request.header("accept"), Some("application/json"));
//! assert!(Response::new(201).is_success());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

// Public modules
pub mod credentials;
pub mod environment;
pub mod error;
pub mod request;
pub mod transport;

// Re-export main types for convenience
pub use credentials::{AuthToken, Authenticator, CredentialStore};
pub use environment::{Clock, SystemClock};
pub use error::{RequestError, Result, TransportFailure};
pub use request::{Method, Request, Response};
pub use transport::Transport;
