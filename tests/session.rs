use std::{net::TcpListener, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use groovify::{
    config::Config,
    error::{Error, ErrorKind, Result},
    protocol::auth::UserProfile,
    session::{Session, SessionState},
    store::{FileTokenStore, MemoryTokenStore, TokenStore},
    token::SessionToken,
};

/// Store whose writes always fail. Loads return the token it was built with.
struct FailingStore {
    token: Option<SessionToken>,
}

#[async_trait]
impl TokenStore for FailingStore {
    async fn load(&self) -> Result<Option<SessionToken>> {
        Ok(self.token.clone())
    }

    async fn save(&self, _token: &SessionToken) -> Result<()> {
        Err(Error::storage_fault("disk full"))
    }

    async fn clear(&self) -> Result<()> {
        Err(Error::storage_fault("read-only file system"))
    }
}

fn token(s: &str) -> SessionToken {
    s.parse().unwrap()
}

fn profile() -> UserProfile {
    UserProfile {
        display_name: "Ada".to_owned(),
        email: "ada@example.com".to_owned(),
        id: "ada123".to_owned(),
    }
}

fn profile_json() -> serde_json::Value {
    json!({"display_name": "Ada", "email": "ada@example.com", "id": "ada123"})
}

fn session(base_url: &str, store: &Arc<MemoryTokenStore>) -> Session {
    let config = Config::with_base_url(base_url.parse().unwrap());
    Session::with_store(&config, Arc::clone(store)).unwrap()
}

/// Address nothing listens on, so requests fail to connect.
fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn bearer(session: &Session) -> Option<String> {
    session
        .backend()
        .http_client()
        .authorization()
        .map(|value| value.to_str().unwrap().to_owned())
}

#[tokio::test]
async fn bootstrap_without_token_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&server.uri(), &store);
    assert_eq!(session.state(), SessionState::Checking);

    assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(bearer(&session), None);
}

#[tokio::test]
async fn bootstrap_restores_valid_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&server.uri(), &store);

    assert_eq!(session.bootstrap().await, SessionState::Authenticated(profile()));
    assert_eq!(store.load().await.unwrap(), Some(token("abc")));
    assert_eq!(bearer(&session).as_deref(), Some("Bearer abc"));
}

#[tokio::test]
async fn bootstrap_discards_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Invalid or expired session token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("expired")));
    let session = session(&server.uri(), &store);

    assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(bearer(&session), None);
}

#[tokio::test]
async fn bootstrap_discards_token_on_network_fault() {
    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&unreachable_url(), &store);

    assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(bearer(&session), None);
}

#[tokio::test]
async fn bootstrap_treats_corrupt_storage_as_logged_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("session.toml");
    std::fs::write(&token_file, "spotify_session_token = [1, 2]").unwrap();

    let mut config = Config::with_base_url(server.uri().parse().unwrap());
    config.token_file = token_file.clone();
    let session = Session::new(&config).unwrap();

    assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
    assert!(!token_file.exists());
}

#[tokio::test]
async fn bootstrap_publishes_states() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&server.uri(), &store);
    let mut states = session.subscribe();

    session.bootstrap().await;

    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Authenticated(profile()));
}

#[tokio::test]
async fn redirect_logs_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .and(body_json(json!({"code": "XYZ"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"profile": profile_json(), "token": "T1"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/playlists"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&server.uri(), &store);

    let logged_in = session
        .handle_redirect("myapp://auth/success?code=XYZ")
        .await
        .unwrap();

    assert_eq!(logged_in, Some(profile()));
    assert_eq!(store.load().await.unwrap(), Some(token("T1")));
    assert_eq!(bearer(&session).as_deref(), Some("Bearer T1"));
    assert_eq!(session.state(), SessionState::Authenticated(profile()));

    // Later requests are authenticated.
    let playlists = session.backend().playlists().await.unwrap();
    assert!(playlists.items.is_empty());
}

#[tokio::test]
async fn redirect_without_code_changes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("old")));
    let session = session(&server.uri(), &store);
    session.backend().http_client().set_auth_token(Some(&token("old")));
    let mut states = session.subscribe();

    let err = session
        .handle_redirect("myapp://auth/success?state=1")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::MalformedRedirect);
    assert_eq!(err.user_message(Session::LOGIN_FAILED), Session::LOGIN_FAILED);
    assert_eq!(store.load().await.unwrap(), Some(token("old")));
    assert_eq!(bearer(&session).as_deref(), Some("Bearer old"));
    assert!(!states.has_changed().unwrap());
}

#[tokio::test]
async fn unrelated_urls_are_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&server.uri(), &store);

    assert_eq!(session.handle_redirect("https://example.com/?code=XYZ").await.unwrap(), None);
    assert_eq!(session.handle_redirect("myapp://settings").await.unwrap(), None);
}

#[tokio::test]
async fn rejected_code_surfaces_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Invalid or expired code"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&server.uri(), &store);

    let err = session
        .handle_redirect("myapp://auth/success?code=used")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::ExchangeFailed);
    assert_eq!(err.user_message(Session::LOGIN_FAILED), "Invalid or expired code");
    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(bearer(&session), None);
}

#[tokio::test]
async fn exchange_network_fault_is_not_an_exchange_failure() {
    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&unreachable_url(), &store);

    let err = session
        .handle_redirect("myapp://auth/success?code=XYZ")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NetworkFault);
    assert_eq!(err.user_message(Session::LOGIN_FAILED), Session::LOGIN_FAILED);
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_redirects_leave_store_and_header_in_step() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .and(body_json(json!({"code": "A"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"profile": profile_json(), "token": "TA"}))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .and(body_json(json!({"code": "B"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"profile": profile_json(), "token": "TB"})),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&server.uri(), &store);

    let (a, b) = tokio::join!(
        session.handle_redirect("myapp://auth/success?code=A"),
        session.handle_redirect("myapp://auth/success?code=B"),
    );
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());

    let stored = store.load().await.unwrap().unwrap();
    assert_eq!(bearer(&session), Some(format!("Bearer {}", stored.as_str())));
}

#[tokio::test]
async fn serve_redirects_alerts_and_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"profile": profile_json(), "token": "T1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let session = Arc::new(session(&server.uri(), &store));
    let mut alerts = session.subscribe_alerts();

    let (tx, rx) = mpsc::channel(4);
    let listener = tokio::spawn({
        let session = Arc::clone(&session);
        async move {
            session
                .serve_redirects(Some("myapp://auth/success".to_owned()), rx)
                .await;
        }
    });

    tx.send("https://example.com/unrelated".to_owned()).await.unwrap();
    tx.send("myapp://auth/success?code=XYZ".to_owned()).await.unwrap();
    drop(tx);
    tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(alerts.try_recv().unwrap(), Session::LOGIN_FAILED);
    assert!(alerts.try_recv().is_err());
    assert_eq!(session.state(), SessionState::Authenticated(profile()));
    assert_eq!(store.load().await.unwrap(), Some(token("T1")));
}

#[tokio::test]
async fn logout_clears_everything() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "logged_out"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&server.uri(), &store);
    session.backend().http_client().set_auth_token(Some(&token("abc")));

    session.logout().await;

    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(bearer(&session), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn logout_completes_when_backend_is_unreachable() {
    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&unreachable_url(), &store);
    session.backend().http_client().set_auth_token(Some(&token("abc")));

    session.logout().await;

    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(bearer(&session), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn logout_completes_when_backend_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&server.uri(), &store);
    session.backend().http_client().set_auth_token(Some(&token("abc")));

    session.logout().await;

    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(bearer(&session), None);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"profile": profile_json(), "token": "T1"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_base_url(server.uri().parse().unwrap());
    config.token_file = dir.path().join("session.toml");

    let first = Session::new(&config).unwrap();
    first
        .handle_redirect("myapp://auth/success?code=XYZ")
        .await
        .unwrap();
    drop(first);

    let second = Session::new(&config).unwrap();
    assert_eq!(second.bootstrap().await, SessionState::Authenticated(profile()));
    assert_eq!(
        FileTokenStore::new(&config.token_file).load().await.unwrap(),
        Some(token("T1"))
    );
    assert!(second
        .backend()
        .http_client()
        .get("/me")
        .unwrap()
        .headers()
        .contains_key(AUTHORIZATION));
}

#[tokio::test]
async fn bootstrap_accepts_profile_without_display_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"display_name": null, "id": "ada123"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&server.uri(), &store);

    let state = session.bootstrap().await;
    assert!(state.is_authenticated());
    assert_eq!(state.profile().map(|p| p.id.as_str()), Some("ada123"));
    assert_eq!(store.load().await.unwrap(), Some(token("abc")));
    assert_eq!(bearer(&session).as_deref(), Some("Bearer abc"));
}

#[tokio::test]
async fn redirect_accepts_profile_without_display_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profile": {"display_name": null, "email": null, "id": "ada123"},
            "token": "T1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&server.uri(), &store);

    let profile = session
        .handle_redirect("myapp://auth/success?code=XYZ")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(profile.id, "ada123");
    assert_eq!(profile.name(), "ada123");
    assert_eq!(store.load().await.unwrap(), Some(token("T1")));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn logout_invalidates_token_the_backend_could_not_confirm() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "logged_out"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token("abc")));
    let session = session(&server.uri(), &store);

    assert!(session.attach_stored().await);
    assert_eq!(session.state(), SessionState::Checking);
    session.logout().await;

    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(bearer(&session), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn attach_stored_without_token_attaches_nothing() {
    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&unreachable_url(), &store);

    assert!(!session.attach_stored().await);
    assert_eq!(bearer(&session), None);
}

#[tokio::test]
async fn failed_save_rolls_back_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/profile"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"profile": profile_json(), "token": "T1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::with_base_url(server.uri().parse().unwrap());
    let session = Session::with_store(&config, FailingStore { token: None }).unwrap();

    let err = session
        .handle_redirect("myapp://auth/success?code=XYZ")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::StorageFault);
    assert_eq!(bearer(&session), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn logout_completes_when_store_cannot_be_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "logged_out"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::with_base_url(server.uri().parse().unwrap());
    let session = Session::with_store(
        &config,
        FailingStore {
            token: Some(token("abc")),
        },
    )
    .unwrap();
    session.backend().http_client().set_auth_token(Some(&token("abc")));

    session.logout().await;

    assert_eq!(bearer(&session), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn rejected_token_is_detached_when_store_cannot_be_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::with_base_url(server.uri().parse().unwrap());
    let session = Session::with_store(
        &config,
        FailingStore {
            token: Some(token("expired")),
        },
    )
    .unwrap();

    assert_eq!(session.bootstrap().await, SessionState::Unauthenticated);
    assert_eq!(bearer(&session), None);
}
