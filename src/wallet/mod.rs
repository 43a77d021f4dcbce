// src/wallet/mod.rs
//! Subject-side signing.

pub mod key_management;

use crate::models::identifier::Identifier;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The subject declined to sign.
    #[error("signature request rejected: {0}")]
    Rejected(String),
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// Signs challenge messages on behalf of a subject. Implementations may
/// wait on a user prompt, so callers bound the wait themselves.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Identifier the credential will be issued to.
    fn subject_id(&self) -> Identifier;

    /// Signs `message` and returns the signature in its wire encoding.
    async fn sign(&self, message: &str) -> Result<String, SignerError>;
}
