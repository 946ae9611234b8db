//! Envelope delivery to other agents.

use async_trait::async_trait;
use reqwest::Client;
use uuid::Uuid;

use crate::envelope::{Envelope, Payload};
use crate::error::{Error, Result};
use crate::identity::AgentIdentity;
use crate::registry::AgentverseClient;

/// Outbound envelope transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sign a payload and deliver it to the target agent within a session.
    async fn deliver(
        &self,
        sender: &AgentIdentity,
        target: &str,
        session: Uuid,
        payload: Payload,
    ) -> Result<()>;
}

/// Transport that resolves the target through the directory and POSTs the
/// envelope to its webhook.
pub struct HttpTransport {
    client: Client,
    directory: AgentverseClient,
}

impl HttpTransport {
    pub fn new(directory: AgentverseClient) -> Self {
        Self {
            client: Client::new(),
            directory,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(
        &self,
        sender: &AgentIdentity,
        target: &str,
        session: Uuid,
        payload: Payload,
    ) -> Result<()> {
        let envelope = Envelope::enclose(sender, target, session, &payload)?;
        let url = self.directory.resolve_endpoint(target).await?;

        let response = self
            .client
            .post(&url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("failed to reach {url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!(
                "{url} answered HTTP {status}: {body}"
            )));
        }

        tracing::debug!("Delivered session {} envelope to {}", session, target);
        Ok(())
    }
}
