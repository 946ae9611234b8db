//! CLI commands for the rutas agents using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::agents::{requester, responder};
use crate::asi1::Asi1Client;
use crate::config::{RequesterConfig, ResponderConfig};
use crate::identity::AgentIdentity;
use crate::registry::AgentverseClient;
use crate::transport::HttpTransport;

/// Rutas - cooperating HTTP agents that relay route queries to ASI1.
#[derive(Parser)]
#[command(name = "rutas")]
#[command(version = "0.1.0")]
#[command(about = "Cooperating route-query relay agents", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the responder agent (answers route queries via ASI1)
    Responder,

    /// Run the requester agent (bridges local callers to the responder)
    Requester,

    /// Print the agent address derived from a seed
    Address {
        /// Identity seed
        seed: String,

        /// Key index
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
}

impl Commands {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Responder => run_responder().await,
            Command::Requester => run_requester().await,
            Command::Address { seed, index } => {
                let identity = AgentIdentity::from_seed(&seed, index)?;
                println!("{}", identity.address());
                Ok(())
            }
        }
    }
}

async fn run_responder() -> Result<()> {
    let config = ResponderConfig::from_env()?;
    let identity = Arc::new(AgentIdentity::from_seed(&config.agent_seed, 0)?);

    tracing::info!("Responder agent address: {}", identity.address());

    // Registration is fatal: an unreachable agent must not serve traffic.
    let registry = AgentverseClient::new(&config.agentverse_base_url, &config.agentverse_api_key);
    registry
        .register(
            &identity,
            &config.webhook_url(),
            responder::AGENT_TITLE,
            responder::AGENT_README,
        )
        .await?;

    let state = responder::ResponderState {
        identity,
        gateway: Arc::new(
            Asi1Client::new(&config.asi1_api_key).with_base_url(&config.asi1_base_url),
        ),
        transport: Arc::new(HttpTransport::new(registry)),
    };

    responder::serve(state, config.port).await?;
    Ok(())
}

async fn run_requester() -> Result<()> {
    let config = RequesterConfig::from_env()?;
    let identity = Arc::new(AgentIdentity::from_seed(&config.agent_seed, 0)?);

    tracing::info!("Requester agent address: {}", identity.address());

    let registry = AgentverseClient::new(&config.agentverse_base_url, &config.agentverse_api_key);
    registry
        .register(
            &identity,
            &config.webhook_url(),
            requester::AGENT_TITLE,
            requester::AGENT_README,
        )
        .await?;

    let state = requester::RequesterState {
        identity,
        transport: Arc::new(HttpTransport::new(registry)),
        pending: Arc::new(requester::PendingReplies::new()),
        server_agent_address: config.server_agent_address.clone(),
        reply_timeout: config.reply_timeout,
    };

    requester::serve(state, config.port).await?;
    Ok(())
}
