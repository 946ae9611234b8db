//! Deterministic agent identity for envelope signing.
//!
//! An identity is a secp256k1 keypair derived from a seed string. The same
//! (seed, index) pair always yields the same keys, so an agent keeps its
//! address across restarts. Addresses and signatures travel bech32-encoded.

use bech32::{Bech32, Hrp};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Human-readable part for agent addresses.
const ADDRESS_HRP: &str = "agent";

/// Human-readable part for envelope signatures.
const SIGNATURE_HRP: &str = "sig";

/// A signing identity held by an agent for its process lifetime.
#[derive(Clone)]
pub struct AgentIdentity {
    secret: SecretKey,
    public: PublicKey,
    address: String,
}

impl AgentIdentity {
    /// Derive an identity from a seed string and key index.
    pub fn from_seed(seed: &str, index: u32) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hasher.update(index.to_be_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        let secret =
            SecretKey::from_slice(&digest).map_err(|e| Error::Identity(e.to_string()))?;
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        let address = encode_address(&public)?;

        Ok(Self {
            secret,
            public,
            address,
        })
    }

    /// The bech32 address other agents use to reach this one.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a 32-byte digest, returning a bech32-encoded signature.
    pub fn sign_digest(&self, digest: [u8; 32]) -> Result<String> {
        let secp = Secp256k1::new();
        let signature = secp.sign_ecdsa(&Message::from_digest(digest), &self.secret);

        let hrp = Hrp::parse(SIGNATURE_HRP).map_err(|e| Error::Identity(e.to_string()))?;
        bech32::encode::<Bech32>(hrp, &signature.serialize_compact())
            .map_err(|e| Error::Identity(e.to_string()))
    }
}

impl std::fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("address", &self.address)
            .field("public", &hex::encode(self.public.serialize()))
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// Encode a public key as a bech32 agent address.
pub fn encode_address(key: &PublicKey) -> Result<String> {
    let hrp = Hrp::parse(ADDRESS_HRP).map_err(|e| Error::Identity(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, &key.serialize()).map_err(|e| Error::Identity(e.to_string()))
}

/// Decode an agent address back into its public key.
pub fn decode_address(address: &str) -> Result<PublicKey> {
    let (hrp, data) =
        bech32::decode(address).map_err(|e| Error::Decode(format!("invalid address: {e}")))?;

    if hrp.as_str() != ADDRESS_HRP {
        return Err(Error::Decode(format!(
            "invalid address prefix: expected {ADDRESS_HRP}, got {hrp}"
        )));
    }

    PublicKey::from_slice(&data).map_err(|e| Error::Decode(format!("invalid address key: {e}")))
}

/// Verify a bech32 signature over a digest against a sender address.
pub fn verify_digest(address: &str, digest: [u8; 32], signature: &str) -> Result<()> {
    let key = decode_address(address)?;

    let (hrp, data) =
        bech32::decode(signature).map_err(|e| Error::Decode(format!("invalid signature: {e}")))?;

    if hrp.as_str() != SIGNATURE_HRP {
        return Err(Error::Decode(format!(
            "invalid signature prefix: expected {SIGNATURE_HRP}, got {hrp}"
        )));
    }

    let signature = Signature::from_compact(&data)
        .map_err(|e| Error::Decode(format!("invalid signature bytes: {e}")))?;

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&Message::from_digest(digest), &signature, &key)
        .map_err(|e| Error::Decode(format!("signature mismatch: {e}")))
}
