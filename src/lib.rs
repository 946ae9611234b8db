//! Rutas library root.

pub mod agents;
pub mod asi1;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod logging;
pub mod registry;
pub mod transport;

pub use cli::Commands;
pub use envelope::{Envelope, Payload};
pub use error::{Error, Result};
pub use identity::AgentIdentity;
pub use registry::AgentverseClient;
pub use transport::{HttpTransport, Transport};
