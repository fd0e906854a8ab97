//! Operator signing.
//!
//! Records the relay synthesizes on its own authority (join approvals,
//! bootstrap grants, summaries) are signed under the operator key before
//! they leave the core.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use coterie_proto::{PublicKey, Record};

/// Signing failure.
#[derive(Debug, Error)]
pub enum SignError {
    /// The configured secret key could not be decoded.
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// Signs records under a relay-controlled identity.
pub trait RecordSigner: Send + Sync {
    /// Hex pubkey synthesized records are authored under.
    fn public_key(&self) -> &str;

    /// Fill `author`, derive `id` from the signing payload, attach `sig`.
    fn sign(&self, record: &mut Record) -> Result<(), SignError>;
}

/// Ed25519 operator key.
pub struct Ed25519Signer {
    key: SigningKey,
    public: PublicKey,
}

impl Ed25519Signer {
    /// Load the key from 32 hex-encoded secret bytes.
    pub fn from_secret_hex(secret: &str) -> Result<Self, SignError> {
        let bytes =
            hex::decode(secret).map_err(|e| SignError::InvalidSecretKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignError::InvalidSecretKey("expected 32 bytes".into()))?;
        Ok(Ed25519Signer::from_secret_bytes(&bytes))
    }

    /// Build the signer from raw secret bytes.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let key = SigningKey::from_bytes(secret);
        let public = hex::encode(key.verifying_key().to_bytes());
        Ed25519Signer { key, public }
    }

    /// Generate a fresh random key, for ephemeral relays and tests.
    pub fn generate() -> Self {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let public = hex::encode(key.verifying_key().to_bytes());
        Ed25519Signer { key, public }
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl RecordSigner for Ed25519Signer {
    fn public_key(&self) -> &str {
        &self.public
    }

    fn sign(&self, record: &mut Record) -> Result<(), SignError> {
        record.author = self.public.clone();
        record.sig = None;
        let digest = Sha256::digest(record.signing_payload().as_bytes());
        record.id = hex::encode(digest);
        let signature = self.key.sign(digest.as_slice());
        record.sig = Some(hex::encode(signature.to_bytes()));
        Ok(())
    }
}
