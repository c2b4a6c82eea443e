use super::*;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tower::ServiceExt;
use wabridge_core::{
    config::WhatsAppConfig,
    message::{ChatSummary, ClientEvent, GroupInfo, SentMessage},
    traits::AutomationClient,
};

// -----------------------------------------------------------------------
// Mock automation client
// -----------------------------------------------------------------------

/// Records calls; the first `send_failures` sends fail with a transport error.
#[derive(Default)]
struct MockClient {
    calls: Mutex<Vec<String>>,
    send_failures: AtomicU32,
    chats: Vec<ChatSummary>,
}

impl MockClient {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn sends(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("send:"))
            .collect()
    }
}

#[async_trait]
impl AutomationClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initialize(&self) -> Result<(), BridgeError> {
        self.calls.lock().unwrap().push("initialize".into());
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BridgeError> {
        self.calls.lock().unwrap().push("destroy".into());
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, body: &str) -> Result<SentMessage, BridgeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("send:{chat_id}:{body}"));
        let left = self.send_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.send_failures.store(left - 1, Ordering::SeqCst);
            return Err(BridgeError::Client("Evaluation failed".into()));
        }
        Ok(SentMessage {
            id: "3EB0C767D26A1D".into(),
        })
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, BridgeError> {
        self.calls.lock().unwrap().push("list_chats".into());
        Ok(self.chats.clone())
    }

    async fn create_group(
        &self,
        title: &str,
        participants: &[String],
    ) -> Result<GroupInfo, BridgeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create_group:{title}"));
        Ok(GroupInfo {
            id: "120363000000000001@g.us".into(),
            name: title.into(),
            participants: participants.to_vec(),
        })
    }
}

// -----------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------

struct Harness {
    app: Router,
    client: Arc<MockClient>,
    session: Arc<WhatsAppSession>,
}

fn harness_with(client: MockClient, api: ApiConfig, whatsapp: WhatsAppConfig) -> Harness {
    let client = Arc::new(client);
    let dyn_client: Arc<dyn AutomationClient> = client.clone();
    let session = Arc::new(WhatsAppSession::new(dyn_client, whatsapp));
    let state = ApiState::new(&api, Arc::clone(&session), None);
    Harness {
        app: build_router(state),
        client,
        session,
    }
}

fn keyed_api() -> ApiConfig {
    ApiConfig {
        api_key: "secret".into(),
        ..Default::default()
    }
}

fn harness(client: MockClient) -> Harness {
    harness_with(client, keyed_api(), WhatsAppConfig::default())
}

async fn ready(h: &Harness) {
    h.session.handle_event(ClientEvent::Authenticated).await;
    h.session.handle_event(ClientEvent::Ready).await;
}

/// POST JSON with the test API key.
fn post_json(path: &str, body: &str) -> Request<Body> {
    Request::post(path)
        .header("Content-Type", "application/json")
        .header("x-api-key", "secret")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_req(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

/// Parse response body as JSON.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(resp: axum::http::Response<Body>) -> String {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

// -----------------------------------------------------------------------
// Read endpoints
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_root_is_plain_text() {
    let h = harness(MockClient::default());
    let resp = h.app.oneshot(get_req("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "WhatsApp bridge is running");
}

#[tokio::test]
async fn test_ping_reports_port() {
    let h = harness_with(
        MockClient::default(),
        ApiConfig {
            port: 8123,
            ..keyed_api()
        },
        WhatsAppConfig::default(),
    );
    let resp = h.app.oneshot(get_req("/ping")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "alive");
    assert_eq!(json["port"], 8123);
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn test_status_follows_readiness() {
    let h = harness(MockClient::default());
    let resp = h.app.clone().oneshot(get_req("/status")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(resp).await;
    assert_eq!(json["ready"], false);
    assert_eq!(json["state"], "initializing");

    ready(&h).await;
    let resp = h.app.clone().oneshot(get_req("/status")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["state"], "ready");

    let resp = h.app.oneshot(get_req("/ping")).await.unwrap();
    assert_eq!(body_json(resp).await["ready"], true);
}

#[tokio::test]
async fn test_health_follows_readiness() {
    let h = harness(MockClient::default());
    let resp = h.app.clone().oneshot(get_req("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["ready"], false);

    ready(&h).await;
    let resp = h.app.oneshot(get_req("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["ready"], true);
    assert_eq!(json["state"], "ready");
}

#[tokio::test]
async fn test_reads_open_unless_protected() {
    let h = harness(MockClient::default());
    let resp = h.app.oneshot(get_req("/status")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let h = harness_with(
        MockClient::default(),
        ApiConfig {
            protect_reads: true,
            ..keyed_api()
        },
        WhatsAppConfig::default(),
    );
    for path in ["/status", "/health", "/qr"] {
        let resp = h.app.clone().oneshot(get_req(path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
    let req = Request::get("/status")
        .header("x-api-key", "secret")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Ping is never gated.
    let resp = h.app.oneshot(get_req("/ping")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_qr_page_states() {
    let h = harness(MockClient::default());

    let resp = h.app.clone().oneshot(get_req("/qr")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("Waiting for a QR code"));

    h.session
        .handle_event(ClientEvent::Qr("2@abcdef,ghijk".into()))
        .await;
    let resp = h.app.clone().oneshot(get_req("/qr")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("<img src=\"data:image/png;base64,"));

    h.session.handle_event(ClientEvent::Ready).await;
    let resp = h.app.oneshot(get_req("/qr")).await.unwrap();
    assert!(body_text(resp).await.contains("already connected"));
}

// -----------------------------------------------------------------------
// Auth
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_missing_key_is_401_before_body_validation() {
    let h = harness(MockClient::default());
    let req = Request::post("/send")
        .header("Content-Type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "unauthorized");
}

#[tokio::test]
async fn test_wrong_key_is_401() {
    let h = harness(MockClient::default());
    ready(&h).await;
    for path in ["/send", "/sync-group", "/create-group", "/reset"] {
        let req = Request::post(path)
            .header("Content-Type", "application/json")
            .header("x-api-key", "secreT")
            .body(Body::from("{}"))
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_empty_key_disables_auth() {
    let h = harness_with(
        MockClient::default(),
        ApiConfig::default(),
        WhatsAppConfig::default(),
    );
    ready(&h).await;
    let req = Request::post("/send")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"to":"+34695706336","message":"hi"}"#))
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq("secret", "secret"));
    assert!(!constant_time_eq("secret", "secreT"));
    assert!(!constant_time_eq("secret", "secret1"));
    assert!(!constant_time_eq("", "x"));
}

// -----------------------------------------------------------------------
// POST /send
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_send_ok() {
    let h = harness(MockClient::default());
    ready(&h).await;

    let resp = h
        .app
        .oneshot(post_json("/send", r#"{"to":"+34695706336","message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["to"], "+34695706336");
    assert_eq!(json["message"], "hi");
    assert_eq!(json["id"], "3EB0C767D26A1D");
    assert_eq!(h.client.sends(), vec!["send:34695706336@c.us:hi"]);
}

#[tokio::test]
async fn test_send_missing_fields_is_400_even_when_not_ready() {
    let h = harness(MockClient::default());
    for body in [r#"{"message":"hi"}"#, r#"{"to":"+34695706336"}"#, "{}"] {
        let resp = h.app.clone().oneshot(post_json("/send", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(
            body_json(resp).await["error"],
            "missing parameters: to, message"
        );
    }
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_send_malformed_json_is_400() {
    let h = harness(MockClient::default());
    let resp = h.app.oneshot(post_json("/send", "{not json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert!(json["error"].as_str().unwrap().starts_with("invalid request"));
}

#[tokio::test]
async fn test_send_invalid_number_is_400() {
    let h = harness(MockClient::default());
    ready(&h).await;
    let resp = h
        .app
        .oneshot(post_json("/send", r#"{"to":"695 70 63 36","message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_send_lenient_policy_prepends_country_code() {
    let mut whatsapp = WhatsAppConfig::default();
    whatsapp.normalization.policy = wabridge_core::normalize::PolicyKind::Lenient;
    let h = harness_with(MockClient::default(), keyed_api(), whatsapp);
    ready(&h).await;

    let resp = h
        .app
        .oneshot(post_json("/send", r#"{"to":"695 70 63 36","message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.client.sends(), vec!["send:34695706336@c.us:hi"]);
}

#[tokio::test]
async fn test_send_not_ready_is_503_without_dispatch() {
    let h = harness(MockClient::default());
    let resp = h
        .app
        .oneshot(post_json("/send", r#"{"to":"+34695706336","message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(resp).await;
    assert!(json["error"].as_str().unwrap().contains("not ready"));
    assert!(h.client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_retry_then_success() {
    let client = MockClient::default();
    client.send_failures.store(1, Ordering::SeqCst);
    let h = harness(client);
    ready(&h).await;

    let resp = h
        .app
        .oneshot(post_json("/send", r#"{"to":"+34695706336","message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.client.sends().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_send_two_failures_is_500() {
    let client = MockClient::default();
    client.send_failures.store(2, Ordering::SeqCst);
    let h = harness(client);
    ready(&h).await;

    let resp = h
        .app
        .oneshot(post_json("/send", r#"{"to":"+34695706336","message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(resp).await["error"]
        .as_str()
        .unwrap()
        .contains("Evaluation failed"));
    assert_eq!(h.client.sends().len(), 2);
}

// -----------------------------------------------------------------------
// Groups
// -----------------------------------------------------------------------

fn team_chats() -> MockClient {
    MockClient {
        chats: vec![
            ChatSummary {
                id: "34600000000@c.us".into(),
                name: "Team A".into(),
                is_group: false,
            },
            ChatSummary {
                id: "120363111111111111@g.us".into(),
                name: " team a ".into(),
                is_group: true,
            },
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_sync_group_case_insensitive_trimmed() {
    let h = harness(team_chats());
    ready(&h).await;

    let resp = h
        .app
        .oneshot(post_json("/sync-group", r#"{"groupName":"Team A"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["id"], "120363111111111111@g.us");
}

#[tokio::test]
async fn test_sync_group_not_found_is_404() {
    let h = harness(team_chats());
    ready(&h).await;

    let resp = h
        .app
        .oneshot(post_json("/sync-group", r#"{"groupName":"Team B"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_group_validation_and_readiness() {
    let h = harness(team_chats());

    let resp = h
        .app
        .clone()
        .oneshot(post_json("/sync-group", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = h
        .app
        .oneshot(post_json("/sync-group", r#"{"groupName":"Team A"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_create_group_single_participant_is_400_without_client_call() {
    let h = harness(MockClient::default());
    let resp = h
        .app
        .oneshot(post_json(
            "/create-group",
            r#"{"groupTitle":"T","participants":["+15550001111"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_create_group_ok() {
    let h = harness(MockClient::default());
    ready(&h).await;

    let resp = h
        .app
        .oneshot(post_json(
            "/create-group",
            r#"{"groupTitle":"Ops","participants":["+15550001111","+15550002222"],"initialMessage":"hola"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["id"], "120363000000000001@g.us");
    assert_eq!(json["name"], "Ops");
    assert_eq!(
        json["participants"],
        serde_json::json!(["15550001111@c.us", "15550002222@c.us"])
    );
    assert_eq!(
        h.client.calls(),
        vec!["create_group:Ops", "send:120363000000000001@g.us:hola"]
    );
}

#[tokio::test]
async fn test_create_group_not_ready_is_503() {
    let h = harness(MockClient::default());
    let resp = h
        .app
        .oneshot(post_json(
            "/create-group",
            r#"{"groupTitle":"Ops","participants":["+15550001111","+15550002222"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// -----------------------------------------------------------------------
// POST /reset
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_reset_wipes_session_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let session_dir = tmp.path().join("auth");
    let cache_dir = tmp.path().join("cache");
    std::fs::create_dir_all(&session_dir).unwrap();
    std::fs::create_dir_all(&cache_dir).unwrap();
    std::fs::write(session_dir.join("creds.json"), "{}").unwrap();

    let whatsapp = WhatsAppConfig {
        session_dir: session_dir.to_string_lossy().into_owned(),
        cache_dir: cache_dir.to_string_lossy().into_owned(),
        ..Default::default()
    };
    let h = harness_with(MockClient::default(), keyed_api(), whatsapp);
    ready(&h).await;

    let resp = h.app.oneshot(post_json("/reset", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");

    assert!(!session_dir.exists());
    assert!(!cache_dir.exists());
    assert!(!h.session.is_ready().await);
    assert_eq!(h.client.calls()[0], "destroy");
}
