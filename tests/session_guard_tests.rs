//! Session Guard integration tests
//!
//! Every test runs against a wiremock backend.
//! Run with: cargo test --test session_guard_tests

use futures::future::join_all;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tinynote::api::{
    ApiError, AuthService, LoginRequest, NoteApi, Page, Revalidation, Revalidator, SessionGuard,
    UserApi,
};
use tinynote::events::{ClientEvent, EventEmitter, Notice, Route};
use tinynote::session::{MemorySessionStore, SessionContext, SessionState, SessionStore, UserInfo};
use tinynote::ClientConfig;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXPIRED_NOTICE: &str = "Session expired, please log in again";

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ClientEvent>>,
}

impl EventEmitter for Recorder {
    fn emit(&self, event: ClientEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Recorder {
    fn notices(&self) -> Vec<Notice> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Notice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    fn redirects(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    ClientEvent::Navigate {
                        route: Route::Login
                    }
                )
            })
            .count()
    }
}

fn logged_in() -> SessionState {
    SessionState {
        token: Some("tok-123".into()),
        user_info: Some(UserInfo {
            id: Some(42),
            username: Some("alice".into()),
            ..Default::default()
        }),
        nickname: Some("alice".into()),
        remembered_username: Some("alice".into()),
        ..Default::default()
    }
}

fn config_for(base: &str) -> ClientConfig {
    ClientConfig {
        api_base_url: format!("{}/api", base),
        chat_url: format!("{}/api/ai/chat", base),
        request_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

struct Harness {
    guard: Arc<SessionGuard>,
    events: Arc<Recorder>,
    store: Arc<MemorySessionStore>,
}

fn harness(base: &str, state: SessionState) -> Harness {
    let store = Arc::new(MemorySessionStore::new(state.clone()));
    let session = Arc::new(SessionContext::with_state(store.clone(), state));
    let events = Arc::new(Recorder::default());
    let guard = Arc::new(SessionGuard::new(&config_for(base), session, events.clone()).unwrap());
    Harness {
        guard,
        events,
        store,
    }
}

// ============================================================================
// Classification
// ============================================================================

#[tokio::test]
async fn test_code_200_yields_payload_with_credential_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/note/detail/7"))
        .and(query_param("userId", "42"))
        .and(header("authorization", "tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "ok",
            "data": {"id": 7, "title": "Groceries", "content": "milk", "type": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let note = assert_ok!(NoteApi::new(h.guard.clone()).detail(7, 42).await);

    assert_eq!(note.title, "Groceries");
    assert_eq!(note.note_type, Some(1));
    assert!(h.events.notices().is_empty());
}

#[tokio::test]
async fn test_business_error_is_surfaced_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/note/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 500,
            "message": "Title required",
            "data": null
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let draft = tinynote::api::NoteDraft {
        id: None,
        user_id: 42,
        title: String::new(),
        content: "x".into(),
        note_type: 0,
        is_markdown: 0,
    };
    let err = assert_err!(NoteApi::new(h.guard.clone()).create(&draft).await);

    assert!(matches!(err, ApiError::Business { ref message, .. } if message == "Title required"));
    assert_eq!(h.events.notices(), vec![Notice::error("Title required")]);
    // Business errors never touch the session
    assert!(h.guard.session().is_logged_in().await);
}

#[tokio::test]
async fn test_envelope_with_null_code_is_business_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/note/delete/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": null,
            "message": "boom",
            "data": null
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let err = assert_err!(NoteApi::new(h.guard.clone()).delete(7, 42).await);

    assert!(matches!(err, ApiError::Business { ref message, .. } if message == "boom"));
    assert_eq!(h.events.notices(), vec![Notice::error("boom")]);
}

#[tokio::test]
async fn test_login_envelope_with_non_string_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": 0,
            "data": {"token": "t", "userInfo": {"id": 42, "username": "alice"}}
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), SessionState::default());
    let auth = AuthService::new(h.guard.clone(), false);
    let request = LoginRequest {
        username: "alice".into(),
        password: "pw".into(),
    };
    let response = assert_ok!(auth.login(&request, false).await);

    assert_eq!(response.token, "t");
    assert!(auth.is_logged_in().await);
}

#[tokio::test]
async fn test_non_json_success_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/note/delete/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let err = assert_err!(NoteApi::new(h.guard.clone()).delete(7, 42).await);

    assert!(matches!(err, ApiError::InvalidResponse(_)));
    assert_eq!(h.events.notices().len(), 1);
    assert!(h.guard.session().is_logged_in().await);
}

#[tokio::test]
async fn test_lenient_success_flag_without_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/note/list"))
        .and(query_param("pageNum", "1"))
        .and(query_param("pageSize", "10"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "records": [{"id": 1, "title": "a"}]})),
        )
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let listing = assert_ok!(
        NoteApi::new(h.guard.clone())
            .list(42, Page::default())
            .await
    );

    assert_eq!(tinynote::api::notes_in_listing(&listing).len(), 1);
    assert!(h.events.notices().is_empty());
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/info/42"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let err = assert_err!(UserApi::new(h.guard.clone()).info(42).await);

    assert!(matches!(err, ApiError::Http { status: 503, .. }));
    assert!(err.is_retryable());
    assert_eq!(h.events.notices().len(), 1);
    assert!(h.guard.session().is_logged_in().await);
}

#[tokio::test]
async fn test_transport_error_notice() {
    // Nothing listens on the discard port
    let h = harness("http://127.0.0.1:9", logged_in());
    let err = assert_err!(UserApi::new(h.guard.clone()).info(42).await);

    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(
        h.events.notices(),
        vec![Notice::error("Network error, check the server connection")]
    );
    assert!(h.guard.session().is_logged_in().await);
}

// ============================================================================
// Auth expiry
// ============================================================================

#[tokio::test]
async fn test_concurrent_auth_expiry_tears_down_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/note/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 401,
            "message": "token expired",
            "data": null
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let notes = NoteApi::new(h.guard.clone());

    let results = join_all((0..5).map(|_| notes.list(42, Page::default()))).await;

    for result in &results {
        assert!(matches!(result, Err(ApiError::AuthExpired(m)) if m == "token expired"));
    }
    assert_eq!(h.events.redirects(), 1);
    assert_eq!(h.events.notices(), vec![Notice::error(EXPIRED_NOTICE)]);

    let persisted = h.store.load().await.unwrap();
    assert!(persisted.token.is_none());
    assert!(persisted.user_info.is_none());
    assert_eq!(persisted.remembered_username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_http_401_tears_down_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/info/42"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "Unauthorized"})))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let err = assert_err!(UserApi::new(h.guard.clone()).info(42).await);

    assert!(matches!(err, ApiError::AuthExpired(ref m) if m == "Unauthorized"));
    assert!(h.guard.session().credential().await.is_none());
    assert_eq!(h.events.redirects(), 1);

    // A second expiry finds nothing to clear
    let _ = UserApi::new(h.guard.clone()).info(42).await;
    assert_eq!(h.events.redirects(), 1);
}

// ============================================================================
// Login / logout
// ============================================================================

#[tokio::test]
async fn test_login_persists_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .and(body_json(json!({"username": "alice", "password": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "ok",
            "data": {
                "token": "new-tok",
                "userInfo": {"id": 42, "username": "alice", "avatar": "/uploads/a.png"}
            }
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), SessionState::default());
    let auth = AuthService::new(h.guard.clone(), false);
    let request = LoginRequest {
        username: "alice".into(),
        password: "s3cret".into(),
    };
    assert_ok!(auth.login(&request, true).await);

    let state = h.store.load().await.unwrap();
    assert_eq!(state.token.as_deref(), Some("new-tok"));
    // No nickname in the profile: falls back to the username
    assert_eq!(state.nickname.as_deref(), Some("alice"));
    assert_eq!(
        state.avatar_url,
        Some(format!("{}/uploads/a.png", server.uri()))
    );
    assert_eq!(state.remembered_username.as_deref(), Some("alice"));
    assert!(state.remembered_password.is_none());
    assert!(auth.is_logged_in().await);
    assert_eq!(h.events.notices(), vec![Notice::success("Logged in")]);

    assert!(auth.logout().await);
    assert!(!auth.is_logged_in().await);
    assert_eq!(
        auth.remembered_credentials().await.username.as_deref(),
        Some("alice")
    );
}

#[tokio::test]
async fn test_login_remembers_password_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "ok",
            "data": {"token": "t", "userInfo": {"id": 1, "nickname": "Bobby"}}
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), SessionState::default());
    let auth = AuthService::new(h.guard.clone(), true);
    let request = LoginRequest {
        username: "bob".into(),
        password: "pw".into(),
    };
    assert_ok!(auth.login(&request, true).await);

    let remembered = auth.remembered_credentials().await;
    assert_eq!(remembered.username.as_deref(), Some("bob"));
    assert_eq!(remembered.password.as_deref(), Some("pw"));
    assert_eq!(auth.display_name().await.as_deref(), Some("Bobby"));
}

#[tokio::test]
async fn test_failed_login_leaves_session_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 400,
            "message": "Wrong username or password",
            "data": null
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), SessionState::default());
    let auth = AuthService::new(h.guard.clone(), false);
    let request = LoginRequest {
        username: "alice".into(),
        password: "nope".into(),
    };
    assert_err!(auth.login(&request, true).await);

    assert!(!auth.is_logged_in().await);
    assert_eq!(
        h.events.notices(),
        vec![Notice::error("Wrong username or password")]
    );
    assert_eq!(h.events.redirects(), 0);
}

// ============================================================================
// Revalidation
// ============================================================================

#[tokio::test]
async fn test_revalidation_keeps_session_on_transport_failure() {
    let h = harness("http://127.0.0.1:9", logged_in());
    let revalidator = Revalidator::new(h.guard.clone(), "/user/validate", Duration::from_secs(60));

    assert_eq!(revalidator.revalidate_once().await, Revalidation::Inconclusive);
    assert!(h.guard.session().is_logged_in().await);
    // Background checks stay quiet
    assert!(h.events.notices().is_empty());
}

#[tokio::test]
async fn test_revalidation_explicit_invalid_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/validate"))
        .and(header("authorization", "tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 401,
            "message": "token expired",
            "data": null
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let revalidator = Revalidator::new(h.guard.clone(), "/user/validate", Duration::from_secs(60));

    assert_eq!(revalidator.revalidate_once().await, Revalidation::Invalid);
    assert!(h.guard.session().credential().await.is_none());
    assert_eq!(h.events.redirects(), 1);

    // Nothing left to check
    assert_eq!(revalidator.revalidate_once().await, Revalidation::Skipped);
}

#[tokio::test]
async fn test_revalidation_payload_false_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "ok",
            "data": false
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let revalidator = Revalidator::new(h.guard.clone(), "/user/validate", Duration::from_secs(60));

    assert_eq!(revalidator.revalidate_once().await, Revalidation::Invalid);
    assert!(!h.guard.session().is_logged_in().await);
}

#[tokio::test]
async fn test_revalidation_valid_and_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "ok",
            "data": true
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let revalidator = Revalidator::new(h.guard.clone(), "/user/validate", Duration::from_secs(60));
    assert_eq!(revalidator.revalidate_once().await, Revalidation::Valid);

    let anon = harness(&server.uri(), SessionState::default());
    let revalidator = Revalidator::new(anon.guard.clone(), "/user/validate", Duration::from_secs(60));
    assert_eq!(revalidator.revalidate_once().await, Revalidation::Skipped);
}

#[tokio::test]
async fn test_revalidation_loop_stops_on_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/validate"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), logged_in());
    let shutdown = CancellationToken::new();
    let task = Revalidator::new(h.guard.clone(), "/user/validate", Duration::from_millis(50))
        .spawn(shutdown.clone());

    let cleared = tokio::time::timeout(Duration::from_secs(5), async {
        while h.guard.session().credential().await.is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(cleared.is_ok(), "revalidation never cleared the session");

    shutdown.cancel();
    assert_ok!(tokio::time::timeout(Duration::from_secs(5), task).await);
    assert_eq!(h.events.redirects(), 1);
}
