// src/wallet/key_management.rs
//! In-process key management for a subject wallet.
//!
//! Provides generation, import and usage of a Pallas key pair for:
//! - Signing issuer challenge messages
//! - Verifying such signatures
//! - Deriving the subject's `mina:publickey` identifier
//!
//! A challenge message is encoded into one field element with the
//! `utf8-bytes -> bytes-uint -> mina:mod.order -> uint-mina:field` chain,
//! hashed with Poseidon, and the hash is signed.

use crate::models::identifier::Identifier;
use crate::wallet::{Signer, SignerError};
use crate::zkp::field::Field;
use crate::zkp::poseidon;
use crate::zkp::signature::{self, KeyError, PrivateKey, PublicKey, Signature};
use crate::zkp::transform::{transform_value, Step, TrValue, TransformError};
use async_trait::async_trait;
use log::debug;

const MESSAGE_STEPS: [Step; 4] = [Step::Utf8Bytes, Step::BytesUint, Step::ModOrder, Step::UintField];

fn message_hash(message: &str) -> Result<Field, TransformError> {
    match transform_value(TrValue::Str(message.to_string()), &MESSAGE_STEPS)? {
        TrValue::Field(field) => Ok(poseidon::hash(&[field])),
        _ => Err(TransformError::NotField {
            path: "message".into(),
            produced: "a non-field value",
        }),
    }
}

/// Key management system for a subject wallet.
///
/// # Security Notes
/// - The private key is never exposed except through an explicit export
/// - Keys are generated from the thread-local CSPRNG
/// - Signatures are deterministic
#[derive(Clone)]
pub struct KeyManager {
    /// Private key (never exposed)
    private_key: PrivateKey,
    /// Derived public key for verification
    pub public_key: PublicKey,
}

impl KeyManager {
    /// Generates a KeyManager with a fresh key pair.
    ///
    /// # Returns
    /// New KeyManager containing:
    /// - Randomly generated Pallas private key
    /// - Derived public key
    pub fn new() -> Self {
        Self::from_private_key(PrivateKey::generate(&mut rand::thread_rng()))
    }

    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        KeyManager {
            private_key,
            public_key,
        }
    }

    /// Imports a base58 encoded private key.
    ///
    /// # Arguments
    /// * `encoded` - Base58 private key as produced by [`KeyManager::export_base58`]
    ///
    /// # Returns
    /// `Result<KeyManager, KeyError>` where:
    /// - `Ok(manager)` holds the imported key pair
    /// - `Err` describes why the key failed to decode
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        PrivateKey::from_base58(encoded).map(Self::from_private_key)
    }

    pub fn export_base58(&self) -> String {
        self.private_key.to_base58()
    }

    /// `mina:publickey` identifier of this wallet.
    pub fn subject_id(&self) -> Identifier {
        self.public_key.identifier()
    }

    /// Signs a challenge message.
    ///
    /// # Arguments
    /// * `message` - Challenge text received from the issuer
    ///
    /// # Returns
    /// Base58 signature over the Poseidon hash of the encoded message
    pub fn sign_message(&self, message: &str) -> Result<String, TransformError> {
        let hash = message_hash(message)?;
        let signature = signature::sign(&self.private_key, &[hash]);
        debug!("signed challenge message for {}", self.subject_id());
        Ok(signature.to_base58())
    }

    /// Verifies a signature produced by [`KeyManager::sign_message`].
    /// Undecodable signatures verify as `false`.
    pub fn verify_message(public_key: &PublicKey, message: &str, signature: &str) -> bool {
        let Ok(signature) = Signature::from_base58(signature) else {
            return false;
        };
        match message_hash(message) {
            Ok(hash) => signature::verify(public_key, &[hash], &signature),
            Err(_) => false,
        }
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signer for KeyManager {
    fn subject_id(&self) -> Identifier {
        KeyManager::subject_id(self)
    }

    async fn sign(&self, message: &str) -> Result<String, SignerError> {
        self.sign_message(message)
            .map_err(|e| SignerError::Unavailable(e.to_string()))
    }
}
