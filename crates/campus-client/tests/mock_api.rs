//! Mock API tests for the campus client.
//!
//! These tests use wiremock to simulate the LMS backend and exercise the
//! token lifecycle without network access: login/register/logout, the
//! 401 → refresh → replay pipeline, single-flight refresh under
//! concurrency, and durable credential persistence.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campus_client::{CredentialStore, FileStorage, Session};
use campus_core::{ApiUrl, AuthError, Credentials, Error, Role, TokenPair};

/// Helper to create an API URL from a mock server.
fn mock_api_url(server: &MockServer) -> ApiUrl {
    ApiUrl::new(server.uri()).unwrap()
}

/// Session over an in-memory store, optionally pre-seeded with tokens.
fn session_with_tokens(server: &MockServer, tokens: Option<TokenPair>) -> Session {
    let store = Arc::new(CredentialStore::in_memory());
    if let Some(pair) = tokens {
        store.set(pair).unwrap();
    }
    Session::new(mock_api_url(server), store)
}

fn alice_json() -> serde_json::Value {
    json!({
        "id": 1,
        "email": "a@x.com",
        "first_name": "Alice",
        "last_name": "Keys",
        "role": "student"
    })
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({
            "email": "a@x.com",
            "password": "pw"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t1",
            "refresh_token": "r1",
            "user": alice_json()
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, None);
    let user = session
        .login(&Credentials::new("a@x.com", "pw"))
        .await
        .unwrap();

    assert_eq!(user.id, 1);
    assert_eq!(user.role, Role::Student);

    let pair = session.api().store().get().unwrap();
    assert_eq!(pair.access.as_str(), "t1");
    assert_eq!(pair.refresh.as_str(), "r1");
    assert_eq!(session.cached_user().unwrap().email, "a@x.com");
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Incorrect email or password"
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, None);
    let err = session
        .login(&Credentials::new("bad@x.com", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
    assert!(session.api().store().get().is_none());
}

#[tokio::test]
async fn test_register_email_taken() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Email already registered"
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, None);
    let err = session
        .register(
            &Credentials::new("a@x.com", "pw"),
            "Alice",
            "Keys",
            Role::Student,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::EmailTaken)));
}

#[tokio::test]
async fn test_register_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/register"))
        .and(body_json(json!({
            "email": "a@x.com",
            "password": "pw",
            "first_name": "Alice",
            "last_name": "Keys",
            "role": "teacher"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access_token": "t1",
            "refresh_token": "r1",
            "user": {
                "id": 2,
                "email": "a@x.com",
                "first_name": "Alice",
                "last_name": "Keys",
                "role": "teacher"
            }
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, None);
    let user = session
        .register(
            &Credentials::new("a@x.com", "pw"),
            "Alice",
            "Keys",
            Role::Teacher,
        )
        .await
        .unwrap();

    assert_eq!(user.role, Role::Teacher);
    assert!(session.api().store().get().is_some());
}

// ============================================================================
// Refresh Pipeline Tests
// ============================================================================

/// The full lifecycle scenario: login yields t1/r1, a later call finds
/// t1 expired, the pipeline exchanges r1 for t2/r2 and replays, and the
/// caller only ever sees the final success.
#[tokio::test]
async fn test_expired_token_refreshed_and_replayed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t1",
            "refresh_token": "r1",
            "user": alice_json()
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Could not validate credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .and(body_json(json!({"refresh_token": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t2",
            "refresh_token": "r2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_json()))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, None);
    session
        .login(&Credentials::new("a@x.com", "pw"))
        .await
        .unwrap();

    let user = session.current_user().await.unwrap();
    assert_eq!(user.id, 1);

    let pair = session.api().store().get().unwrap();
    assert_eq!(pair.access.as_str(), "t2");
    assert_eq!(pair.refresh.as_str(), "r2");
}

/// A request that still gets 401 after a successful refresh terminates
/// with `Expired` and does not trigger a second refresh.
#[tokio::test]
async fn test_second_401_after_replay_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Could not validate credentials"
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t2",
            "refresh_token": "r2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));
    let err = session
        .api()
        .get::<serde_json::Value>("/courses")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::Expired)));
}

/// N interleaved requests that each hit a 401 share exactly one refresh
/// exchange and all resolve with its outcome.
#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Could not validate credentials"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // The delay widens the window in which the other requests observe
    // their own 401 while the refresh is still in flight.
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .and(body_json(json!({"refresh_token": "r1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_json(json!({
                    "access_token": "t2",
                    "refresh_token": "r2"
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            session.api().get::<serde_json::Value>("/courses").await
        }));
    }

    for task in tasks {
        let result = task.await.unwrap();
        assert!(result.is_ok(), "request failed: {:?}", result);
    }

    let pair = session.api().store().get().unwrap();
    assert_eq!(pair.access.as_str(), "t2");
}

/// A rejected refresh token ends the session: the store is emptied and
/// the pending request fails with `Expired`.
#[tokio::test]
async fn test_failed_refresh_clears_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Could not validate credentials"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Invalid refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));
    let err = session
        .api()
        .get::<serde_json::Value>("/courses")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::Expired)));
    assert!(session.api().store().get().is_none());
}

// ============================================================================
// Session Facade Tests
// ============================================================================

/// `logout` followed by `current_user` never touches the network.
#[tokio::test]
async fn test_current_user_after_logout_makes_no_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_json()))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, None);
    session.logout().await;

    assert!(session.current_user().await.is_none());
}

/// Any `current_user` failure is swallowed into "no authenticated user"
/// so startup with a stale token never fails.
#[tokio::test]
async fn test_current_user_swallows_server_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "detail": "Internal server error"
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));

    assert!(session.current_user().await.is_none());
    assert!(session.api().store().get().is_none());
}

/// A profile response that settles after logout is discarded rather
/// than resurrecting the dead session's cached state.
#[tokio::test]
async fn test_late_profile_response_discarded_after_logout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(alice_json()),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Successfully logged out"
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));

    let fetch = tokio::spawn({
        let session = session.clone();
        async move { session.current_user().await }
    });

    // Let the fetch reach the wire, then end the session under it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.logout().await;

    assert!(fetch.await.unwrap().is_none());
    assert!(session.cached_user().is_none());
    assert!(session.api().store().get().is_none());
}

#[tokio::test]
async fn test_logout_is_idempotent_and_revokes_server_side() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Successfully logged out"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));

    session.logout().await;
    assert!(session.api().store().get().is_none());
    assert!(session.cached_user().is_none());

    // Second logout is a no-op, including on the wire.
    session.logout().await;
}

#[tokio::test]
async fn test_relogin_replaces_tokens_wholesale() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"email": "a@x.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t1",
            "refresh_token": "r1",
            "user": alice_json()
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"email": "b@x.com", "password": "pw2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t9",
            "refresh_token": "r9",
            "user": {
                "id": 9,
                "email": "b@x.com",
                "first_name": "Bob",
                "last_name": "Moog",
                "role": "teacher"
            }
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, None);

    session
        .login(&Credentials::new("a@x.com", "pw"))
        .await
        .unwrap();
    session.logout().await;
    session
        .login(&Credentials::new("b@x.com", "pw2"))
        .await
        .unwrap();

    let pair = session.api().store().get().unwrap();
    assert_eq!(pair.access.as_str(), "t9");
    assert_eq!(pair.refresh.as_str(), "r9");
    assert_eq!(session.cached_user().unwrap().email, "b@x.com");
}

// ============================================================================
// Pipeline Error Surface Tests
// ============================================================================

#[tokio::test]
async fn test_server_detail_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "detail": "Course not found"
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));
    let err = session
        .api()
        .get::<serde_json::Value>("/courses/99")
        .await
        .unwrap_err();

    match err {
        Error::Api(api) => {
            assert_eq!(api.status, 404);
            assert_eq!(api.detail.as_deref(), Some("Course not found"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    // Nothing listens on this port.
    let api = ApiUrl::new("http://127.0.0.1:9").unwrap();
    let session = Session::new(api, Arc::new(CredentialStore::in_memory()));

    let err = session
        .api()
        .get::<serde_json::Value>("/courses")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
}

// ============================================================================
// Dialog Message Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_dialog_messages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/dialogs/7/messages"))
        .and(query_param("skip", "0"))
        .and(query_param("limit", "50"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "dialog_id": 7, "sender_id": 2, "content": "hello"},
            {"id": 2, "dialog_id": 7, "sender_id": 1, "content": "hi"}
        ])))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));
    let messages = session.messages(7, 0, 50).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].dialog_id, 7);
    assert_eq!(messages[1].content, "hi");
}

#[tokio::test]
async fn test_send_dialog_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/dialogs/7/messages"))
        .and(body_json(json!({"content": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "dialog_id": 7,
            "sender_id": 1,
            "content": "hello"
        })))
        .mount(&server)
        .await;

    let session = session_with_tokens(&server, Some(TokenPair::new("t1", "r1")));
    let message = session.send_message(7, "hello").await.unwrap();

    assert_eq!(message.id, Some(3));
    assert_eq!(message.dialog_id, 7);
}

// ============================================================================
// Persistence Tests
// ============================================================================

/// A login's tokens survive a simulated restart through the file store.
#[tokio::test]
async fn test_session_survives_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("tokens.json");

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t1",
            "refresh_token": "r1",
            "user": alice_json()
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_json()))
        .mount(&server)
        .await;

    {
        let store = Arc::new(CredentialStore::open(FileStorage::new(&token_path)).unwrap());
        let session = Session::new(mock_api_url(&server), store);
        session
            .login(&Credentials::new("a@x.com", "pw"))
            .await
            .unwrap();
    }

    // "Restart": a fresh store and session over the same file.
    let store = Arc::new(CredentialStore::open(FileStorage::new(&token_path)).unwrap());
    let session = Session::new(mock_api_url(&server), store);

    let user = session.current_user().await.unwrap();
    assert_eq!(user.email, "a@x.com");
}
