//! Environment configuration for the rutas agents.
//!
//! Each agent reads its configuration once at startup into an immutable
//! struct that is passed into the handlers, so nothing reads the process
//! environment after boot.

use std::env;
use std::time::Duration;

use crate::asi1::DEFAULT_ASI1_URL;
use crate::error::{Error, Result};
use crate::registry::DEFAULT_AGENTVERSE_URL;

/// Default port for the responder agent.
pub const DEFAULT_RESPONDER_PORT: u16 = 5002;

/// Default port for the requester agent.
pub const DEFAULT_REQUESTER_PORT: u16 = 5055;

/// Default ceiling for waiting on an asynchronous reply.
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 10;

/// Configuration for the responder agent.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// API key for the ASI1 chat gateway
    pub asi1_api_key: String,
    /// Seed for the agent's signing identity
    pub agent_seed: String,
    /// API key for the AgentVerse directory
    pub agentverse_api_key: String,
    /// Listen port
    pub port: u16,
    /// Publicly reachable base URL for this agent
    pub public_url: String,
    /// ASI1 gateway base URL
    pub asi1_base_url: String,
    /// AgentVerse directory base URL
    pub agentverse_base_url: String,
}

impl ResponderConfig {
    /// Load the responder configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let port = parse_port(env::var("RESPONDER_PORT").ok(), DEFAULT_RESPONDER_PORT)?;

        Ok(Self {
            asi1_api_key: required("ASI1_API_KEY")?,
            agent_seed: required("AGENT_SECRET_KEY_1")?,
            agentverse_api_key: required("AGENTVERSE_API_KEY")?,
            port,
            public_url: env::var("RESPONDER_PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            asi1_base_url: env::var("ASI1_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ASI1_URL.to_string()),
            agentverse_base_url: env::var("AGENTVERSE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_AGENTVERSE_URL.to_string()),
        })
    }

    /// Webhook endpoint registered with the directory.
    pub fn webhook_url(&self) -> String {
        webhook_url(&self.public_url)
    }
}

/// Configuration for the requester agent.
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    /// Seed for the agent's signing identity
    pub agent_seed: String,
    /// API key for the AgentVerse directory
    pub agentverse_api_key: String,
    /// Address of the responder agent queries are relayed to
    pub server_agent_address: String,
    /// Listen port
    pub port: u16,
    /// Publicly reachable base URL for this agent
    pub public_url: String,
    /// AgentVerse directory base URL
    pub agentverse_base_url: String,
    /// Ceiling for waiting on a reply before answering 504
    pub reply_timeout: Duration,
}

impl RequesterConfig {
    /// Load the requester configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let port = parse_port(env::var("REQUESTER_PORT").ok(), DEFAULT_REQUESTER_PORT)?;
        let timeout_secs = parse_secs(
            env::var("REPLY_TIMEOUT_SECS").ok(),
            DEFAULT_REPLY_TIMEOUT_SECS,
        )?;

        Ok(Self {
            agent_seed: required("AGENT_SECRET_KEY_2")?,
            agentverse_api_key: required("AGENTVERSE_API_KEY")?,
            server_agent_address: required("SERVER_AGENT_ADDRESS")?,
            port,
            public_url: env::var("REQUESTER_PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            agentverse_base_url: env::var("AGENTVERSE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_AGENTVERSE_URL.to_string()),
            reply_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Webhook endpoint registered with the directory.
    pub fn webhook_url(&self) -> String {
        webhook_url(&self.public_url)
    }
}

fn webhook_url(public_url: &str) -> String {
    format!("{}/api/webhook", public_url.trim_end_matches('/'))
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{name} is not set")))
}

fn parse_port(raw: Option<String>, default: u16) -> Result<u16> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| Error::Config(format!("invalid port: {value}"))),
        None => Ok(default),
    }
}

fn parse_secs(raw: Option<String>, default: u64) -> Result<u64> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| Error::Config(format!("invalid timeout: {value}"))),
        None => Ok(default),
    }
}
