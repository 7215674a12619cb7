//! Black-box integration tests driving the gateway's own HTTP surface
//! end-to-end: a small `support`-style client helper spawns the server and
//! drives it with a real HTTP client, against this crate's in-process
//! gateway instead of a remote deployment.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use janus_gateway_core::core::{GatewayCore, NegotiationFactory};
use janus_gateway_core::http::build_router;
use janus_gateway_core::plugin::echotest::EchoTestPlugin;
use janus_gateway_core::plugin::PluginRegistry;
use janus_gateway_core::supervisor;
use serde_json::{json, Value};

struct Gateway {
    base_url: String,
    core: Arc<GatewayCore>,
    client: reqwest::Client,
}

impl Gateway {
    async fn spawn() -> Self {
        let core = GatewayCore::new(NegotiationFactory::stub());

        let mut registry = PluginRegistry::new();
        let config_dir = tempfile::tempdir().unwrap();
        registry
            .register(Arc::new(EchoTestPlugin::default()), config_dir.path(), &core)
            .expect("echotest plugin should register");

        let (_shutdown_tx, shutdown_rx) = supervisor::shutdown_channel();
        let router = build_router(core.clone(), Arc::new(registry), "/janus", shutdown_rx);

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = axum::Server::bind(&addr).serve(router.into_make_service());
        let local_addr = server.local_addr();

        tokio::spawn(async move {
            let _ = server.await;
        });

        Gateway {
            base_url: format!("http://{}/janus", local_addr),
            core,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("request should reach the gateway")
    }

    async fn post_raw(&self, path: &str, body: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .body(body.to_owned())
            .send()
            .await
            .expect("request should reach the gateway")
    }

    async fn create_session(&self) -> u64 {
        let response = self.post("", json!({"janus": "create", "transaction": "t-create"})).await;
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["janus"], "success");
        body["data"]["id"].as_u64().expect("created session should carry a numeric id")
    }

    async fn attach_echotest(&self, session_id: u64) -> u64 {
        let response = self
            .post(
                &format!("/{}", session_id),
                json!({"janus": "attach", "plugin": "janus.plugin.echotest", "transaction": "t-attach"}),
            )
            .await;
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["janus"], "success");
        body["data"]["id"].as_u64().expect("attach should carry a numeric handle id")
    }

    async fn poll(&self, session_id: u64) -> Value {
        self.client
            .get(format!("{}/{}", self.base_url, session_id))
            .send()
            .await
            .expect("long poll should reach the gateway")
            .json()
            .await
            .unwrap()
    }
}

// Session creation.
#[tokio::test]
async fn creates_a_session_with_a_positive_unique_id() {
    let gateway = Gateway::spawn().await;

    let response = gateway.post("", json!({"janus": "create", "transaction": "t1"})).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "success");
    assert_eq!(body["transaction"], "t1");

    let id = body["data"]["id"].as_u64().unwrap();
    assert!(id >= 1);
    assert!(gateway.core.sessions.contains(janus_gateway_core::session::SessionId::new(id)));
}

// Unknown verb at session scope.
#[tokio::test]
async fn unknown_verb_at_session_scope_is_an_error_envelope() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;

    let response = gateway
        .post(&format!("/{}", session_id), json!({"janus": "nope", "transaction": "t2"}))
        .await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "error");
    assert_eq!(body["transaction"], "t2");
    // INVALID_REQUEST_PATH per the stable error code taxonomy.
    assert_eq!(body["error"]["code"], 457);
}

// Attach to a missing plugin creates no handle.
#[tokio::test]
async fn attach_to_missing_plugin_is_rejected_without_creating_a_handle() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;

    let response = gateway
        .post(
            &format!("/{}", session_id),
            json!({"janus": "attach", "plugin": "does.not.exist", "transaction": "t3"}),
        )
        .await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "error");
    assert_eq!(body["error"]["code"], 460); // PLUGIN_NOT_FOUND

    let session = gateway
        .core
        .sessions
        .get(janus_gateway_core::session::SessionId::new(session_id))
        .unwrap();
    assert_eq!(session.handles().len(), 0);
}

// A long poll on an empty queue blocks rather than returning immediately;
// it only resolves once an event is pushed. The 30s ceiling itself is
// exercised by `http::longpoll`'s own unit tests rather than a real-time
// wait here.
#[tokio::test]
async fn long_poll_blocks_until_an_event_is_pushed() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;
    let handle_id = gateway.attach_echotest(session_id).await;

    let base_url = gateway.base_url.clone();
    let poll_task = tokio::spawn(async move {
        reqwest::get(format!("{}/{}", base_url, session_id))
            .await
            .unwrap()
            .json::<Value>()
            .await
            .unwrap()
    });

    // Give the poll time to actually start waiting, then confirm it hasn't
    // resolved yet (no event has been pushed).
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!poll_task.is_finished());

    gateway
        .post(
            &format!("/{}/{}", session_id, handle_id),
            json!({"janus": "message", "transaction": "t4", "body": {"ping": true}}),
        )
        .await;

    let event = tokio::time::timeout(Duration::from_secs(5), poll_task)
        .await
        .expect("poll should resolve once the echo plugin pushes its event")
        .unwrap();

    assert_eq!(event["janus"], "event");
    assert_eq!(event["transaction"], "t4");
    assert_eq!(event["plugindata"]["data"]["echo"]["ping"], true);
}

// Event delivery order is FIFO per session.
#[tokio::test]
async fn events_are_delivered_in_fifo_order() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;
    let handle_id = gateway.attach_echotest(session_id).await;

    for n in 1..=3 {
        gateway
            .post(
                &format!("/{}/{}", session_id, handle_id),
                json!({"janus": "message", "transaction": format!("t-{}", n), "body": {"n": n}}),
            )
            .await;
    }

    for n in 1..=3 {
        let event = gateway.poll(session_id).await;
        assert_eq!(event["janus"], "event");
        assert_eq!(event["transaction"], format!("t-{}", n));
        assert_eq!(event["plugindata"]["data"]["echo"]["n"], n);
    }
}

// A fourth path component is rejected with 404, and CORS headers are
// still present on transport-level error responses.
#[tokio::test]
async fn extra_path_component_is_404_with_cors_headers() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;
    let handle_id = gateway.attach_echotest(session_id).await;

    let response = gateway
        .client
        .post(format!("{}/{}/{}/extra", gateway.base_url, session_id, handle_id))
        .json(&json!({"janus": "detach", "transaction": "t6"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");
}

// Law (a): create then destroy leaves the session table unchanged.
#[tokio::test]
async fn create_then_destroy_leaves_the_session_table_unchanged() {
    let gateway = Gateway::spawn().await;
    let before = gateway.core.sessions.len();

    let session_id = gateway.create_session().await;
    assert_eq!(gateway.core.sessions.len(), before + 1);

    let response = gateway
        .post(&format!("/{}", session_id), json!({"janus": "destroy", "transaction": "t-destroy"}))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "success");

    assert_eq!(gateway.core.sessions.len(), before);
}

// Law (b): attach then detach leaves the handle table unchanged, and the
// plugin observes exactly one create_session/destroy_session pair (checked
// indirectly: detach succeeds and the handle disappears from the session).
#[tokio::test]
async fn attach_then_detach_leaves_the_handle_table_unchanged() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;

    let session = gateway
        .core
        .sessions
        .get(janus_gateway_core::session::SessionId::new(session_id))
        .unwrap();
    let before = session.handles().len();

    let handle_id = gateway.attach_echotest(session_id).await;
    assert_eq!(session.handles().len(), before + 1);

    let response = gateway
        .post(&format!("/{}/{}", session_id, handle_id), json!({"janus": "detach", "transaction": "t-detach"}))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "success");

    assert_eq!(session.handles().len(), before);
}

// `message` without a `body` is rejected before reaching the plugin.
#[tokio::test]
async fn message_without_body_is_missing_mandatory_element() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;
    let handle_id = gateway.attach_echotest(session_id).await;

    let response = gateway
        .post(&format!("/{}/{}", session_id, handle_id), json!({"janus": "message", "transaction": "t-nobody"}))
        .await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "error");
    assert_eq!(body["error"]["code"], 456); // MISSING_MANDATORY_ELEMENT
}

// `attach` without a `plugin` field is rejected the same way.
#[tokio::test]
async fn attach_without_plugin_is_missing_mandatory_element() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;

    let response = gateway
        .post(&format!("/{}", session_id), json!({"janus": "attach", "transaction": "t-noplugin"}))
        .await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "error");
    assert_eq!(body["error"]["code"], 456);
}

// A body that fails to parse as JSON at all is INVALID_JSON (454), distinct
// from a well-formed non-object body (INVALID_JSON_OBJECT, 455) — and still
// answered with the crate's own error envelope at HTTP 200, not a bare
// transport-level 400.
#[tokio::test]
async fn malformed_json_body_is_invalid_json() {
    let gateway = Gateway::spawn().await;

    let response = gateway.post_raw("", "{not valid json").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "error");
    assert_eq!(body["error"]["code"], 454); // INVALID_JSON
}

// Once a session is marked `destroying`, attaching a new handle to it is
// rejected even though the session record itself hasn't been removed yet.
#[tokio::test]
async fn attach_to_a_destroying_session_is_rejected() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;

    let session = gateway
        .core
        .sessions
        .get(janus_gateway_core::session::SessionId::new(session_id))
        .unwrap();
    session.mark_destroying();

    let response = gateway
        .post(
            &format!("/{}", session_id),
            json!({"janus": "attach", "plugin": "janus.plugin.echotest", "transaction": "t-destroying"}),
        )
        .await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["janus"], "error");
    assert_eq!(body["error"]["code"], 458); // SESSION_NOT_FOUND
    assert_eq!(session.handles().len(), 0);
}

// A GET on a handle URL redirects (302) to the session URL.
#[tokio::test]
async fn get_on_a_handle_url_redirects_to_the_session_url() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;
    let handle_id = gateway.attach_echotest(session_id).await;

    let client = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap();
    let response = client
        .get(format!("{}/{}/{}", gateway.base_url, session_id, handle_id))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::FOUND);
    let location = response.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.ends_with(&format!("/janus/{}", session_id)));
}

// An offer/answer negotiated over `message` strips the endpoint's ICE
// identity from the SDP handed to the plugin.
#[tokio::test]
async fn message_with_an_offer_jsep_is_anonymized_before_reaching_the_plugin() {
    let gateway = Gateway::spawn().await;
    let session_id = gateway.create_session().await;
    let handle_id = gateway.attach_echotest(session_id).await;

    let offer_sdp = "v=0\r\na=ice-ufrag:clientufrag\r\nm=audio 1 RTP/AVP 0\r\n";

    let poll_task = {
        let base_url = gateway.base_url.clone();
        tokio::spawn(async move {
            reqwest::get(format!("{}/{}", base_url, session_id))
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap()
        })
    };

    let response = gateway
        .post(
            &format!("/{}/{}", session_id, handle_id),
            json!({
                "janus": "message",
                "transaction": "t-offer",
                "body": {},
                "jsep": {"type": "offer", "sdp": offer_sdp},
            }),
        )
        .await;
    let ack: Value = response.json().await.unwrap();
    assert_eq!(ack["janus"], "ack");
    assert_eq!(ack["transaction"], "t-offer");

    let event = tokio::time::timeout(Duration::from_secs(5), poll_task).await.unwrap().unwrap();
    let echoed_sdp = event["plugindata"]["data"]["echo"].as_object();
    assert!(echoed_sdp.is_none() || echoed_sdp.unwrap().is_empty());
    assert_eq!(event["jsep"]["type"], "offer");
    assert!(!event["jsep"]["sdp"].as_str().unwrap().contains("clientufrag"));
}
