//! ASI1 chat gateway client.
//!
//! Every failure class is folded into the answer text rather than raised:
//! callers always get a report string back, and a gateway outage reads like
//! an answer whose content happens to describe the error.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Default ASI1 gateway base URL.
pub const DEFAULT_ASI1_URL: &str = "https://api.asi1.ai";

const DEFAULT_MODEL: &str = "asi1-mini";

const SYSTEM_PROMPT: &str = "Eres un asistente que ayuda a encontrar la ruta de una ciudad A a una ciudad B, responde en formato de informe. Incluye: carretera, casetas, cobros, tiempo estimado. Que sea breve";

const EMPTY_REPLY: &str = "La API de ASI1 devolvió una respuesta vacía.";

/// Gateway answering route queries with a free-text report.
#[async_trait]
pub trait RouteGateway: Send + Sync {
    /// Answer a route query. Never fails; errors come back as report text.
    async fn route_report(&self, query: &str) -> String;
}

/// HTTP client for the ASI1 chat-completion API.
pub struct Asi1Client {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl Asi1Client {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_ASI1_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl RouteGateway for Asi1Client {
    async fn route_report(&self, query: &str) -> String {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: query.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return connection_error(e),
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return gateway_error(status, &body);
        }

        match response.json::<ChatResponse>().await {
            Ok(parsed) => extract_answer(parsed),
            Err(e) => connection_error(e),
        }
    }
}

fn extract_answer(response: ChatResponse) -> String {
    response
        .choices
        .first()
        .map(|choice| choice.message.content.trim().to_string())
        .unwrap_or_else(|| EMPTY_REPLY.to_string())
}

fn gateway_error(status: u16, body: &str) -> String {
    format!("Error de ASI1 API: {}, {}", status, body)
}

fn connection_error(error: impl std::fmt::Display) -> String {
    format!("Error al conectar con la API de ASI1: {}", error)
}
