//! AgentVerse directory client.
//!
//! The directory maps agent addresses to reachable webhook endpoints. Each
//! agent registers itself once at startup (fatal on failure) and resolves
//! peer addresses through the same service when delivering envelopes.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::AgentIdentity;

/// Default AgentVerse base URL.
pub const DEFAULT_AGENTVERSE_URL: &str = "https://agentverse.ai";

/// HTTP client for the AgentVerse registry.
pub struct AgentverseClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct RegistrationRequest<'a> {
    address: &'a str,
    challenge: String,
    challenge_response: String,
    endpoint: &'a str,
    agent_title: &'a str,
    readme: &'a str,
}

#[derive(Deserialize)]
struct AgentRecord {
    endpoints: Vec<AgentEndpoint>,
}

#[derive(Deserialize)]
struct AgentEndpoint {
    url: String,
}

impl AgentverseClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Register an agent's webhook endpoint and capability readme.
    ///
    /// Ownership of the address is proven by signing a fresh challenge with
    /// the agent's identity.
    pub async fn register(
        &self,
        identity: &AgentIdentity,
        endpoint: &str,
        agent_title: &str,
        readme: &str,
    ) -> Result<()> {
        let challenge = Uuid::new_v4().to_string();
        let digest: [u8; 32] = Sha256::digest(challenge.as_bytes()).into();
        let challenge_response = identity.sign_digest(digest)?;

        let request = RegistrationRequest {
            address: identity.address(),
            challenge,
            challenge_response,
            endpoint,
            agent_title,
            readme,
        };

        let response = self
            .client
            .post(format!("{}/v1/agents", self.base_url))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Registration(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Registration(format!("HTTP {status}: {body}")));
        }

        tracing::info!("Registered {} at {}", identity.address(), endpoint);
        Ok(())
    }

    /// Resolve an agent address to its registered webhook endpoint.
    pub async fn resolve_endpoint(&self, address: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/v1/almanac/agents/{}", self.base_url, address))
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("directory lookup failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Delivery(format!(
                "directory lookup for {address} answered HTTP {status}"
            )));
        }

        let record: AgentRecord = response
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("invalid directory record: {e}")))?;

        record
            .endpoints
            .first()
            .map(|endpoint| endpoint.url.clone())
            .ok_or_else(|| Error::Delivery(format!("no endpoints registered for {address}")))
    }
}
