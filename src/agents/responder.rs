//! Responder agent: answers route queries relayed by other agents.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::asi1::RouteGateway;
use crate::envelope::{Envelope, Payload};
use crate::error::{Error, Result};
use crate::identity::AgentIdentity;
use crate::transport::Transport;

pub const AGENT_TITLE: &str = "ASI1 Routing Agent";

pub const AGENT_README: &str = r#"
![domain:routes](https://img.shields.io/badge/route-assistant-blue)
domain:routing-helper

<description>Este agente responde con rutas óptimas entre ciudades en México.</description>
<use_cases>
    <use_case>Obtener rutas entre dos ciudades.</use_case>
</use_cases>
<payload_requirements>
<description>Requiere una consulta tipo texto con la ciudad origen y destino.</description>
<payload>
    <requirement>
        <parameter>query</parameter>
        <description>Consulta de ruta a procesar.</description>
    </requirement>
</payload>
</payload_requirements>
"#;

/// Shared state injected into the responder handlers.
#[derive(Clone)]
pub struct ResponderState {
    pub identity: Arc<AgentIdentity>,
    pub gateway: Arc<dyn RouteGateway>,
    pub transport: Arc<dyn Transport>,
}

/// Create the responder router.
pub fn create_router(state: ResponderState) -> Router {
    Router::new()
        .route("/api/webhook", post(webhook))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the responder agent server.
pub async fn serve(state: ResponderState, port: u16) -> Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Responder agent listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Inbound envelope endpoint.
async fn webhook(State(state): State<ResponderState>, body: String) -> (StatusCode, Json<Value>) {
    info!("Mensaje recibido en webhook");

    match handle_envelope(&state, &body).await {
        Ok(answer) => (
            StatusCode::OK,
            Json(json!({"status": "success", "data": answer})),
        ),
        Err(e) => {
            error!("Error procesando mensaje: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// Decode the query, answer it, and send the reply back to the sender.
///
/// The reply envelope goes out before the HTTP response is built, so a
/// delivery failure surfaces to the HTTP caller as an error.
async fn handle_envelope(state: &ResponderState, raw: &str) -> Result<String> {
    let envelope = Envelope::parse(raw)?;
    envelope.verify()?;

    let payload = envelope.decode_payload()?;
    let query = payload
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingField("query".to_string()))?
        .trim()
        .to_string();

    info!("Consulta recibida: {}", query);

    let answer = state.gateway.route_report(&query).await;

    info!("Respuesta generada: {}", answer);

    let mut reply = Payload::new();
    reply.insert("response".to_string(), Value::String(answer.clone()));

    state
        .transport
        .deliver(&state.identity, &envelope.sender, envelope.session, reply)
        .await?;

    Ok(answer)
}
