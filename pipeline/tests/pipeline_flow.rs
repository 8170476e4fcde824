//! Integration tests for the full pipeline flow
//!
//! Tests cover hook ordering, failure classification at the send boundary,
//! bearer credential injection, and the designated 401 recovery.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use refetch_core::credentials::{AuthToken, CredentialStore};
use refetch_core::environment::Clock;
use refetch_core::error::{RequestError, TransportFailure};
use refetch_core::request::{Request, Response};
use refetch_pipeline::{FailureDisposition, Pipeline, PipelineConfig, bearer_auth_hook};
use refetch_testing::{
    MemoryCredentialStore, MockTransport, StaticAuthenticator, init_tracing, test_clock,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const ENDPOINT: &str = "https://api.example.com";

// ============================================================================
// Dispatch and hook ordering
// ============================================================================

#[tokio::test]
async fn send_returns_the_classified_success() {
    init_tracing();
    let transport = MockTransport::new();
    transport.respond_with(Response::new(200).with_body(json!({ "orders": [1, 2] })));

    let pipeline = Pipeline::new(ENDPOINT, transport.clone());
    let response = pipeline.send(Request::get("/orders")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, Some(json!({ "orders": [1, 2] })));

    let dispatches = transport.dispatched();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].0, ENDPOINT);
    assert_eq!(dispatches[0].1.path, "/orders");
}

#[tokio::test]
async fn default_headers_reach_the_transport_without_clobbering_the_caller() {
    let transport = MockTransport::new();
    let config = PipelineConfig::new()
        .with_default_header("Accept", "application/json")
        .with_default_header("X-Client", "refetch");
    let pipeline = Pipeline::with_config(ENDPOINT, transport.clone(), config);

    pipeline
        .send(Request::get("/orders").with_header("Accept", "text/csv"))
        .await
        .unwrap();

    let sent = &transport.dispatched()[0].1;
    assert_eq!(sent.header("Accept"), Some("text/csv"));
    assert_eq!(sent.header("X-Client"), Some("refetch"));
}

#[tokio::test]
async fn request_hooks_run_in_registration_order() {
    let transport = MockTransport::new();
    let mut pipeline = Pipeline::new(ENDPOINT, transport.clone());

    pipeline.add_request_hook(|request| request.with_header("X-Trace", "first"));
    pipeline.add_request_hook(|request| {
        let seen = request.header("X-Trace").unwrap_or("missing").to_string();
        request.with_header("X-Seen", seen)
    });

    pipeline.send(Request::get("/orders")).await.unwrap();

    let sent = &transport.dispatched()[0].1;
    assert_eq!(sent.header("X-Seen"), Some("first"));
}

#[tokio::test]
async fn protocol_failures_carry_the_server_message() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(500).with_body(json!({ "error": "database is down" })));

    let pipeline = Pipeline::new(ENDPOINT, transport);
    let outcome = pipeline.send(Request::get("/orders")).await;

    assert_eq!(
        outcome,
        Err(RequestError::Protocol {
            status: 500,
            message: "database is down".to_string(),
        })
    );
}

// ============================================================================
// Bearer credential injection
// ============================================================================

#[tokio::test]
async fn requests_without_stored_credentials_go_out_bare() {
    let transport = MockTransport::new();
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut pipeline = Pipeline::new(ENDPOINT, transport.clone());
    pipeline.add_request_hook(bearer_auth_hook(credentials, Arc::new(test_clock())));

    pipeline.send(Request::get("/public")).await.unwrap();

    assert_eq!(transport.dispatched()[0].1.header("Authorization"), None);
}

#[tokio::test]
async fn requests_carry_stored_bearer_credentials() {
    let transport = MockTransport::new();
    let credentials = Arc::new(MemoryCredentialStore::with_token(AuthToken::new("abc")));
    let mut pipeline = Pipeline::new(ENDPOINT, transport.clone());
    pipeline.add_request_hook(bearer_auth_hook(credentials, Arc::new(test_clock())));

    pipeline.send(Request::get("/profile")).await.unwrap();

    assert_eq!(
        transport.dispatched()[0].1.header("Authorization"),
        Some("Bearer abc")
    );
}

#[tokio::test]
async fn expired_tokens_are_not_injected() {
    let clock = test_clock();
    let expired = AuthToken::expiring(
        "stale".to_string(),
        clock.now() - chrono::Duration::minutes(5),
    );
    let transport = MockTransport::new();
    let credentials = Arc::new(MemoryCredentialStore::with_token(expired));
    let mut pipeline = Pipeline::new(ENDPOINT, transport.clone());
    pipeline.add_request_hook(bearer_auth_hook(credentials, Arc::new(clock)));

    pipeline.send(Request::get("/profile")).await.unwrap();

    assert_eq!(transport.dispatched()[0].1.header("Authorization"), None);
}

// ============================================================================
// Designated 401 recovery
// ============================================================================

#[tokio::test]
async fn unauthorized_triggers_exactly_one_reauthentication() {
    init_tracing();
    let transport = MockTransport::new();
    transport.respond_with(Response::new(401));
    transport.respond_with(Response::new(200).with_body(json!({ "profile": "me" })));

    let credentials = Arc::new(MemoryCredentialStore::with_token(AuthToken::new("stale")));
    let authenticator = Arc::new(StaticAuthenticator::new([AuthToken::new("fresh")]));

    let mut pipeline = Pipeline::new(ENDPOINT, transport.clone())
        .with_authenticator(credentials.clone(), authenticator.clone());
    pipeline.add_request_hook(bearer_auth_hook(credentials.clone(), Arc::new(test_clock())));

    let response = pipeline.send(Request::get("/profile")).await.unwrap();
    assert_eq!(response.status, 200);

    // The replay re-ran the hook chain with the re-minted token.
    let dispatches = transport.dispatched();
    assert_eq!(dispatches.len(), 2);
    assert_eq!(dispatches[0].1.header("Authorization"), Some("Bearer stale"));
    assert_eq!(dispatches[1].1.header("Authorization"), Some("Bearer fresh"));

    assert_eq!(authenticator.call_count(), 1);
    assert_eq!(credentials.get().map(|t| t.value), Some("fresh".to_string()));
}

#[tokio::test]
async fn the_reauth_budget_is_per_send_not_per_pipeline() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(401));
    transport.respond_with(Response::new(200));
    transport.respond_with(Response::new(401));
    transport.respond_with(Response::new(200));

    let credentials = Arc::new(MemoryCredentialStore::with_token(AuthToken::new("stale")));
    let authenticator = Arc::new(StaticAuthenticator::new([
        AuthToken::new("fresh-one"),
        AuthToken::new("fresh-two"),
    ]));

    let mut pipeline = Pipeline::new(ENDPOINT, transport.clone())
        .with_authenticator(credentials.clone(), authenticator.clone());
    pipeline.add_request_hook(bearer_auth_hook(credentials, Arc::new(test_clock())));

    // Each send spends its own single recovery attempt.
    assert!(pipeline.send(Request::get("/profile")).await.is_ok());
    assert_eq!(authenticator.call_count(), 1);

    assert!(pipeline.send(Request::get("/profile")).await.is_ok());
    assert_eq!(authenticator.call_count(), 2);

    let dispatches = transport.dispatched();
    assert_eq!(dispatches.len(), 4);
    assert_eq!(
        dispatches[1].1.header("Authorization"),
        Some("Bearer fresh-one")
    );
    assert_eq!(
        dispatches[3].1.header("Authorization"),
        Some("Bearer fresh-two")
    );
}

#[tokio::test]
async fn a_second_unauthorized_propagates_without_another_attempt() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(401));
    transport.respond_with(Response::new(401));

    let credentials = Arc::new(MemoryCredentialStore::new());
    let authenticator = Arc::new(StaticAuthenticator::new([AuthToken::new("fresh")]));

    let pipeline = Pipeline::new(ENDPOINT, transport.clone())
        .with_authenticator(credentials, authenticator.clone());

    let outcome = pipeline.send(Request::get("/profile")).await;

    assert!(matches!(
        outcome,
        Err(RequestError::Protocol { status: 401, .. })
    ));
    assert_eq!(transport.dispatch_count(), 2);
    assert_eq!(authenticator.call_count(), 1);
}

#[tokio::test]
async fn failed_reauthentication_propagates_the_original_401() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(401).with_body(json!({ "error": "token revoked" })));

    let credentials = Arc::new(MemoryCredentialStore::new());
    let authenticator = Arc::new(StaticAuthenticator::failing());

    let pipeline = Pipeline::new(ENDPOINT, transport.clone())
        .with_authenticator(credentials, authenticator.clone());

    let outcome = pipeline.send(Request::get("/profile")).await;

    assert_eq!(
        outcome,
        Err(RequestError::Protocol {
            status: 401,
            message: "token revoked".to_string(),
        })
    );
    assert_eq!(transport.dispatch_count(), 1);
    assert_eq!(authenticator.call_count(), 1);
}

#[tokio::test]
async fn unauthorized_without_an_authenticator_propagates() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(401));

    let pipeline = Pipeline::new(ENDPOINT, transport.clone());
    let outcome = pipeline.send(Request::get("/profile")).await;

    assert!(matches!(
        outcome,
        Err(RequestError::Protocol { status: 401, .. })
    ));
    assert_eq!(transport.dispatch_count(), 1);
}

#[tokio::test]
async fn recovery_settles_before_response_hooks_see_the_outcome() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(401));
    transport.respond_with(Response::new(200));

    let credentials = Arc::new(MemoryCredentialStore::new());
    let authenticator = Arc::new(StaticAuthenticator::new([AuthToken::new("fresh")]));

    let failures_seen = Arc::new(AtomicUsize::new(0));
    let counter = failures_seen.clone();

    let mut pipeline = Pipeline::new(ENDPOINT, transport)
        .with_authenticator(credentials, authenticator);
    pipeline.add_response_hook(
        |response| response,
        move |_failure| {
            counter.fetch_add(1, Ordering::SeqCst);
            FailureDisposition::Propagate
        },
    );

    let outcome = pipeline.send(Request::get("/profile")).await;

    // The recovered 401 never surfaces; hooks only see the final outcome.
    assert_eq!(outcome.map(|r| r.status), Ok(200));
    assert_eq!(failures_seen.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Response hooks
// ============================================================================

#[tokio::test]
async fn response_hooks_transform_successes_in_order() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(200));

    let mut pipeline = Pipeline::new(ENDPOINT, transport);
    pipeline.add_response_hook(
        |response| response.with_header("X-Stage", "first"),
        |_failure| FailureDisposition::Propagate,
    );
    pipeline.add_response_hook(
        |response| {
            let seen = response.header("X-Stage").unwrap_or("missing").to_string();
            response.with_header("X-Stage-Seen", seen)
        },
        |_failure| FailureDisposition::Propagate,
    );

    let response = pipeline.send(Request::get("/orders")).await.unwrap();
    assert_eq!(response.header("X-Stage-Seen"), Some("first"));
}

#[tokio::test]
async fn a_failure_hook_can_recover_the_outcome() {
    let transport = MockTransport::new();
    transport.respond_with(Response::new(500).with_body(json!({ "error": "boom" })));

    let later_successes = Arc::new(AtomicUsize::new(0));
    let counter = later_successes.clone();

    let mut pipeline = Pipeline::new(ENDPOINT, transport);
    pipeline.add_response_hook(
        |response| response,
        |_failure| {
            FailureDisposition::Recover(
                Response::new(200).with_body(json!({ "fallback": true })),
            )
        },
    );
    pipeline.add_response_hook(
        move |response| {
            counter.fetch_add(1, Ordering::SeqCst);
            response
        },
        |_failure| FailureDisposition::Propagate,
    );

    let response = pipeline.send(Request::get("/orders")).await.unwrap();

    assert_eq!(response.body, Some(json!({ "fallback": true })));
    assert_eq!(later_successes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_failures_reach_failure_hooks_as_transport_errors() {
    let transport = MockTransport::new();
    transport.fail_with(TransportFailure::Unreachable("connection refused".to_string()));

    let observed = Arc::new(Mutex::new(None));
    let slot = observed.clone();

    let mut pipeline = Pipeline::new(ENDPOINT, transport);
    pipeline.add_response_hook(
        |response| response,
        move |failure| {
            *slot.lock().unwrap() = Some(failure.is_transport());
            FailureDisposition::Propagate
        },
    );

    let outcome = pipeline.send(Request::get("/orders")).await;

    assert!(matches!(outcome, Err(RequestError::Transport(_))));
    assert_eq!(*observed.lock().unwrap(), Some(true));
}
