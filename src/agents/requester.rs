//! Requester agent: bridges local callers to the responder agent.
//!
//! A chat request registers a fresh session, sends the query out, and waits
//! on a one-shot channel for the reply that arrives on the webhook side of
//! the process. The session ID travels round-trip in the envelope, so
//! concurrent callers each get their own reply.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::envelope::{Envelope, Payload};
use crate::error::{Error, Result};
use crate::identity::AgentIdentity;
use crate::transport::Transport;

pub const AGENT_TITLE: &str = "ASI1 Client Agent";

pub const AGENT_README: &str = r#"
![domain:innovation-lab](https://img.shields.io/badge/innovation--lab-3D8BD3)
domain:asi1

<description>Este agente envía preguntas al agente ASI1 y recibe respuestas.</description>
<use_cases>
    <use_case>Enviar preguntas al agente ASI1.</use_case>
</use_cases>
<payload_requirements>
    <description>Enviar preguntas como texto.</description>
    <payload>
        <requirement>
            <parameter>query</parameter>
            <description>Texto de la pregunta.</description>
        </requirement>
    </payload>
</payload_requirements>
"#;

/// Replies awaited by in-flight chat requests, keyed by session.
#[derive(Default)]
pub struct PendingReplies {
    waiters: DashMap<Uuid, oneshot::Sender<String>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and get the receiving end of its reply channel.
    pub fn register(&self, session: Uuid) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(session, tx);
        rx
    }

    /// Complete a session with its reply. Returns false when nobody is
    /// waiting (late or unsolicited reply).
    pub fn complete(&self, session: &Uuid, value: String) -> bool {
        match self.waiters.remove(session) {
            Some((_, tx)) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Drop a session that timed out or failed before sending.
    pub fn forget(&self, session: &Uuid) {
        self.waiters.remove(session);
    }
}

/// Shared state injected into the requester handlers.
#[derive(Clone)]
pub struct RequesterState {
    pub identity: Arc<AgentIdentity>,
    pub transport: Arc<dyn Transport>,
    pub pending: Arc<PendingReplies>,
    pub server_agent_address: String,
    pub reply_timeout: Duration,
}

/// Create the requester router.
pub fn create_router(state: RequesterState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/webhook", post(webhook))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the requester agent server.
pub async fn serve(state: RequesterState, port: u16) -> Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Requester agent listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Synchronous chat endpoint for local callers.
async fn chat(State(state): State<RequesterState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let query = match body.get("query").and_then(Value::as_str) {
        Some(query) if !query.is_empty() => query.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Missing query"})),
            )
        }
    };

    info!("Consulta recibida del frontend: {}", query);

    match relay_query(&state, query).await {
        Ok(Some(response)) => (StatusCode::OK, Json(json!({"response": response}))),
        Ok(None) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({"error": "Timeout esperando respuesta del agente"})),
        ),
        Err(e) => {
            error!("Error en /api/chat: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// Send the query to the responder and wait for its reply or the timeout.
///
/// The waiter is registered before the envelope goes out, so a reply that
/// races the send cannot be lost. `None` means the ceiling elapsed.
async fn relay_query(state: &RequesterState, query: String) -> Result<Option<String>> {
    let session = Uuid::new_v4();
    let receiver = state.pending.register(session);

    let mut payload = Payload::new();
    payload.insert("query".to_string(), Value::String(query));

    if let Err(e) = state
        .transport
        .deliver(
            &state.identity,
            &state.server_agent_address,
            session,
            payload,
        )
        .await
    {
        state.pending.forget(&session);
        return Err(e);
    }

    match tokio::time::timeout(state.reply_timeout, receiver).await {
        Ok(Ok(response)) => Ok(Some(response)),
        Ok(Err(_)) => Err(Error::Delivery("reply channel closed".to_string())),
        Err(_) => {
            state.pending.forget(&session);
            Ok(None)
        }
    }
}

/// Webhook receiving the responder's asynchronous reply.
async fn webhook(State(state): State<RequesterState>, body: String) -> (StatusCode, Json<Value>) {
    info!("Mensaje recibido en webhook cliente");

    match handle_reply(&state, &body) {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "success"}))),
        Err(e) => {
            error!("Error procesando respuesta en el cliente: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// Decode the reply and hand it to the waiting chat request.
fn handle_reply(state: &RequesterState, raw: &str) -> Result<()> {
    let envelope = Envelope::parse(raw)?;
    envelope.verify()?;

    let payload = envelope.decode_payload()?;
    // A missing response field is delivered as an empty string rather than
    // rejected, unlike the responder's required query field.
    let response = payload
        .get("response")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    info!("Respuesta del servidor: {}", response);

    if !state.pending.complete(&envelope.session, response) {
        warn!("No pending query for session {}", envelope.session);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Transport that records deliveries and optionally completes the
    /// pending session, standing in for the remote responder round trip.
    struct LoopbackTransport {
        pending: Arc<PendingReplies>,
        reply: Option<String>,
        deliveries: Mutex<Vec<(String, Uuid, Payload)>>,
    }

    impl LoopbackTransport {
        fn replying(pending: Arc<PendingReplies>, reply: &str) -> Self {
            Self {
                pending,
                reply: Some(reply.to_string()),
                deliveries: Mutex::new(Vec::new()),
            }
        }

        fn silent(pending: Arc<PendingReplies>) -> Self {
            Self {
                pending,
                reply: None,
                deliveries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for LoopbackTransport {
        async fn deliver(
            &self,
            _sender: &AgentIdentity,
            target: &str,
            session: Uuid,
            payload: Payload,
        ) -> Result<()> {
            self.deliveries
                .lock()
                .unwrap()
                .push((target.to_string(), session, payload));
            if let Some(reply) = &self.reply {
                self.pending.complete(&session, reply.clone());
            }
            Ok(())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn deliver(
            &self,
            _sender: &AgentIdentity,
            _target: &str,
            _session: Uuid,
            _payload: Payload,
        ) -> Result<()> {
            Err(Error::Delivery("connection refused".to_string()))
        }
    }

    fn state_with(transport: Arc<dyn Transport>, pending: Arc<PendingReplies>) -> RequesterState {
        RequesterState {
            identity: Arc::new(AgentIdentity::from_seed("otra_clave_secreta", 0).unwrap()),
            transport,
            pending,
            server_agent_address: "agent1qresponder".to_string(),
            reply_timeout: Duration::from_millis(50),
        }
    }

    fn reply_envelope(state: &RequesterState, session: Uuid, payload: Payload) -> String {
        let responder = AgentIdentity::from_seed("clave_secreta", 0).unwrap();
        let envelope =
            Envelope::enclose(&responder, state.identity.address(), session, &payload).unwrap();
        serde_json::to_string(&envelope).unwrap()
    }

    #[tokio::test]
    async fn test_chat_missing_query_sends_nothing() {
        let pending = Arc::new(PendingReplies::new());
        let transport = Arc::new(LoopbackTransport::silent(pending.clone()));
        let state = state_with(transport.clone(), pending);

        let (status, Json(body)) = chat(State(state.clone()), Json(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing query");

        let (status, _) = chat(State(state), Json(json!({"query": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(transport.deliveries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_returns_the_relayed_reply() {
        let pending = Arc::new(PendingReplies::new());
        let transport = Arc::new(LoopbackTransport::replying(
            pending.clone(),
            "A → B via Hwy 15, $120 toll, 3h",
        ));
        let state = state_with(transport.clone(), pending);

        let (status, Json(body)) =
            chat(State(state), Json(json!({"query": "ruta de A a B"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "A → B via Hwy 15, $120 toll, 3h");

        let deliveries = transport.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "agent1qresponder");
        assert_eq!(deliveries[0].2.get("query").unwrap(), "ruta de A a B");
    }

    #[tokio::test]
    async fn test_chat_times_out_when_no_reply_arrives() {
        let pending = Arc::new(PendingReplies::new());
        let transport = Arc::new(LoopbackTransport::silent(pending.clone()));
        let state = state_with(transport.clone(), pending.clone());

        let (status, Json(body)) = chat(State(state), Json(json!({"query": "ruta"}))).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "Timeout esperando respuesta del agente");
        assert_eq!(transport.deliveries.lock().unwrap().len(), 1);
        // The stale waiter is gone, so a late reply finds nobody.
        let session = transport.deliveries.lock().unwrap()[0].1;
        assert!(!pending.complete(&session, "tarde".to_string()));
    }

    #[tokio::test]
    async fn test_chat_surfaces_send_failures() {
        let pending = Arc::new(PendingReplies::new());
        let state = state_with(Arc::new(FailingTransport), pending);

        let (status, Json(body)) = chat(State(state), Json(json!({"query": "ruta"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_webhook_delivers_reply_to_waiter_byte_for_byte() {
        let pending = Arc::new(PendingReplies::new());
        let transport = Arc::new(LoopbackTransport::silent(pending.clone()));
        let state = state_with(transport, pending.clone());

        let session = Uuid::new_v4();
        let receiver = pending.register(session);

        let mut payload = Payload::new();
        payload.insert(
            "response".to_string(),
            Value::String("  informe con espacios  ".to_string()),
        );
        let raw = reply_envelope(&state, session, payload);

        let (status, Json(body)) = webhook(State(state), raw).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(receiver.await.unwrap(), "  informe con espacios  ");
    }

    #[tokio::test]
    async fn test_webhook_defaults_missing_response_to_empty() {
        let pending = Arc::new(PendingReplies::new());
        let transport = Arc::new(LoopbackTransport::silent(pending.clone()));
        let state = state_with(transport, pending.clone());

        let session = Uuid::new_v4();
        let receiver = pending.register(session);

        let mut payload = Payload::new();
        payload.insert("status".to_string(), Value::String("ok".to_string()));
        let raw = reply_envelope(&state, session, payload);

        let (status, _) = webhook(State(state), raw).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(receiver.await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_webhook_accepts_unsolicited_reply() {
        let pending = Arc::new(PendingReplies::new());
        let transport = Arc::new(LoopbackTransport::silent(pending.clone()));
        let state = state_with(transport, pending);

        let mut payload = Payload::new();
        payload.insert("response".to_string(), Value::String("tarde".to_string()));
        let raw = reply_envelope(&state, Uuid::new_v4(), payload);

        let (status, Json(body)) = webhook(State(state), raw).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn test_webhook_malformed_envelope() {
        let pending = Arc::new(PendingReplies::new());
        let transport = Arc::new(LoopbackTransport::silent(pending.clone()));
        let state = state_with(transport, pending);

        let (status, Json(body)) = webhook(State(state), "no es un sobre".to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_concurrent_chats_get_their_own_replies() {
        let pending = Arc::new(PendingReplies::new());

        let first = pending.register(Uuid::from_u128(1));
        let second = pending.register(Uuid::from_u128(2));

        assert!(pending.complete(&Uuid::from_u128(2), "segunda".to_string()));
        assert!(pending.complete(&Uuid::from_u128(1), "primera".to_string()));

        assert_eq!(first.await.unwrap(), "primera");
        assert_eq!(second.await.unwrap(), "segunda");
    }
}
