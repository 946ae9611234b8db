//! Signed message envelopes exchanged between agents.
//!
//! An envelope wraps a JSON payload with addressing metadata and a signature
//! from the sender's identity. A query travels as `{"query": ...}` and the
//! reply within the same session travels back as `{"response": ...}`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::{self, AgentIdentity};

/// Wire format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Schema digest for free-form JSON payloads.
pub const JSON_PAYLOAD_DIGEST: &str = "model:none";

/// A JSON object payload carried by an envelope.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Signed envelope as posted to an agent's webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire format version
    pub version: u8,
    /// Sender agent address
    pub sender: String,
    /// Recipient agent address
    pub target: String,
    /// Session ID correlating a query with its reply
    pub session: Uuid,
    /// Digest of the payload schema
    pub schema_digest: String,
    /// Digest of the protocol, unused for plain JSON payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_digest: Option<String>,
    /// Base64-encoded JSON payload
    pub payload: String,
    /// Expiration timestamp (unix seconds, optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<u64>,
    /// Bech32 signature over the envelope digest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Envelope {
    /// Build and sign an envelope from a sender identity to a target address.
    pub fn enclose(
        sender: &AgentIdentity,
        target: &str,
        session: Uuid,
        payload: &Payload,
    ) -> Result<Self> {
        let encoded = BASE64.encode(serde_json::to_vec(payload)?);

        let mut envelope = Self {
            version: ENVELOPE_VERSION,
            sender: sender.address().to_string(),
            target: target.to_string(),
            session,
            schema_digest: JSON_PAYLOAD_DIGEST.to_string(),
            protocol_digest: None,
            payload: encoded,
            expires: None,
            signature: None,
        };

        envelope.signature = Some(sender.sign_digest(envelope.digest())?);
        Ok(envelope)
    }

    /// Parse an envelope from raw webhook text.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Check the signature against the sender address.
    pub fn verify(&self) -> Result<()> {
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| Error::Decode("envelope is not signed".to_string()))?;

        identity::verify_digest(&self.sender, self.digest(), signature)
    }

    /// Decode the payload into a JSON object.
    pub fn decode_payload(&self) -> Result<Payload> {
        let bytes = BASE64
            .decode(&self.payload)
            .map_err(|e| Error::Decode(format!("invalid payload encoding: {e}")))?;

        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(format!("invalid payload: {e}")))
    }

    /// Digest covered by the envelope signature.
    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.sender.as_bytes());
        hasher.update(self.target.as_bytes());
        hasher.update(self.session.as_bytes());
        hasher.update(self.schema_digest.as_bytes());
        hasher.update(Sha256::digest(self.payload.as_bytes()));
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn test_identity() -> AgentIdentity {
        AgentIdentity::from_seed("clave_secreta", 0).unwrap()
    }

    fn query_payload(text: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("query".to_string(), Value::String(text.to_string()));
        payload
    }

    #[test]
    fn test_enclose_and_parse_round_trip() {
        let sender = test_identity();
        let session = Uuid::new_v4();
        let payload = query_payload("ruta de CDMX a Puebla");

        let envelope = Envelope::enclose(&sender, "agent1qtarget", session, &payload).unwrap();
        let raw = serde_json::to_string(&envelope).unwrap();
        let parsed = Envelope::parse(&raw).unwrap();

        assert_eq!(parsed.sender, sender.address());
        assert_eq!(parsed.target, "agent1qtarget");
        assert_eq!(parsed.session, session);
        assert_eq!(parsed.decode_payload().unwrap(), payload);
        parsed.verify().unwrap();
    }

    #[test]
    fn test_reencode_preserves_envelope() {
        let sender = test_identity();
        let envelope = Envelope::enclose(
            &sender,
            "agent1qtarget",
            Uuid::new_v4(),
            &query_payload("ruta"),
        )
        .unwrap();

        let raw = serde_json::to_string(&envelope).unwrap();
        let reencoded = serde_json::to_string(&Envelope::parse(&raw).unwrap()).unwrap();

        assert_eq!(raw, reencoded);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Envelope::parse("not json"), Err(Error::Decode(_))));
        assert!(matches!(
            Envelope::parse(r#"{"hola": "mundo"}"#),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let sender = test_identity();
        let mut envelope = Envelope::enclose(
            &sender,
            "agent1qtarget",
            Uuid::new_v4(),
            &query_payload("ruta"),
        )
        .unwrap();

        envelope.payload = BASE64.encode(serde_json::to_vec(&json!({"query": "otra"})).unwrap());

        assert!(envelope.verify().is_err());
    }

    #[test]
    fn test_verify_rejects_unsigned() {
        let sender = test_identity();
        let mut envelope = Envelope::enclose(
            &sender,
            "agent1qtarget",
            Uuid::new_v4(),
            &query_payload("ruta"),
        )
        .unwrap();

        envelope.signature = None;

        assert!(envelope.verify().is_err());
    }

    #[test]
    fn test_decode_payload_rejects_non_object() {
        let sender = test_identity();
        let mut envelope = Envelope::enclose(
            &sender,
            "agent1qtarget",
            Uuid::new_v4(),
            &query_payload("ruta"),
        )
        .unwrap();

        envelope.payload = BASE64.encode(b"\"solo texto\"");

        assert!(envelope.decode_payload().is_err());
    }
}
