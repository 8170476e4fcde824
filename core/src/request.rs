//! Request and response descriptors.
//!
//! This module defines the plain value types that travel through a request
//! pipeline: the outgoing [`Request`] and the incoming [`Response`]. Both are
//! transport-agnostic descriptors - they describe shape and intent, not wire
//! encoding. The transport binding decides how a descriptor becomes bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP-style request method.
///
/// # Examples
///
/// ```
/// use refetch_core::request::Method;
///
/// assert_eq!(Method::Get.as_str(), "GET");
/// assert_eq!(format!("{}", Method::Post), "POST");
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Retrieve a resource.
    Get,
    /// Create a resource or submit data.
    Post,
    /// Replace a resource.
    Put,
    /// Partially update a resource.
    Patch,
    /// Remove a resource.
    Delete,
    /// Retrieve headers only.
    Head,
}

impl Method {
    /// Get the canonical uppercase name of the method.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::Method;
    ///
    /// assert_eq!(Method::Patch.as_str(), "PATCH");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An outgoing request descriptor.
///
/// A request carries a method, a path relative to the pipeline's base
/// endpoint, an ordered header list, and an optional JSON body. Requests are
/// plain data: hooks transform them by value, so a hook can never observe
/// another hook's intermediate state out of order.
///
/// # Design
///
/// Headers are an ordered `Vec` rather than a map. Registration order is
/// visible in the outgoing request, duplicate names are representable (HTTP
/// allows them), and lookup is case-insensitive per the usual header
/// semantics.
///
/// # Examples
///
/// ```
/// use refetch_core::request::{Method, Request};
/// use serde_json::json;
///
/// let request = Request::post("/session/refresh")
///     .with_header("Accept", "application/json")
///     .with_body(json!({ "scope": "full" }));
///
/// assert_eq!(request.method, Method::Post);
/// assert_eq!(request.header("accept"), Some("application/json"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request method.
    pub method: Method,

    /// Path relative to the pipeline's base endpoint (e.g. `"/users/42"`).
    pub path: String,

    /// Ordered header list as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,

    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
}

impl Request {
    /// Create a new request with the given method and path.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::{Method, Request};
    ///
    /// let request = Request::new(Method::Delete, "/sessions/7");
    /// assert_eq!(request.path, "/sessions/7");
    /// ```
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request for the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::{Method, Request};
    ///
    /// let request = Request::get("/users/42");
    /// assert_eq!(request.method, Method::Get);
    /// ```
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Create a POST request for the given path.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Append a header, preserving any existing headers with the same name.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::Request;
    ///
    /// let request = Request::get("/").with_header("Accept", "application/json");
    /// assert_eq!(request.header("Accept"), Some("application/json"));
    /// ```
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body, replacing any existing body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header, replacing an existing header with the same name
    /// (case-insensitive) or appending if none exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::Request;
    ///
    /// let mut request = Request::get("/").with_header("authorization", "Bearer old");
    /// request.set_header("Authorization", "Bearer fresh");
    ///
    /// assert_eq!(request.header("authorization"), Some("Bearer fresh"));
    /// assert_eq!(request.headers.len(), 1);
    /// ```
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, slot)) => *slot = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Look up the first header with the given name, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::Request;
    ///
    /// let request = Request::get("/").with_header("Content-Type", "application/json");
    /// assert_eq!(request.header("content-type"), Some("application/json"));
    /// assert_eq!(request.header("X-Missing"), None);
    /// ```
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An incoming response descriptor.
///
/// A response carries whatever the transport produced: a status code, a
/// header list, and an optional JSON body. The pipeline classifies the status
/// into the failure taxonomy; the response type itself makes no judgment
/// beyond [`is_success`](Response::is_success).
///
/// # Examples
///
/// ```
/// use refetch_core::request::Response;
/// use serde_json::json;
///
/// let response = Response::new(200).with_body(json!({ "id": 42 }));
/// assert!(response.is_success());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP-style status code.
    pub status: u16,

    /// Ordered header list as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,

    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
}

impl Response {
    /// Create a response with the given status and no headers or body.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::Response;
    ///
    /// let response = Response::new(204);
    /// assert_eq!(response.status, 204);
    /// ```
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body, replacing any existing body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Check whether the status code is in the success range (2xx).
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::request::Response;
    ///
    /// assert!(Response::new(201).is_success());
    /// assert!(!Response::new(404).is_success());
    /// ```
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, 200..=299)
    }

    /// Look up the first header with the given name, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
