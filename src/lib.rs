// src/lib.rs
//! # zcred
//!
//! Client-side protocol engine for zcred verifiable credentials.
//!
//! ## Layers
//! 1. **Models**: wire types of credentials, proofs and the issuer protocol
//! 2. **ZKP**: canonical schema transformer, Poseidon/Pallas provers and verifiers
//! 3. **Services**: exception taxonomy, HTTP issuer client, issuance session
//! 4. **Wallet**: subject-side signing

pub mod config;
pub mod models;
pub mod services;
pub mod utils;
pub mod wallet;
pub mod zkp;

pub use crate::config::ClientConfig;
pub use crate::models::credential::{HttpCredential, Proof, ZkCredential};
pub use crate::services::exceptions::{ErrorCode, ZcredException};
pub use crate::services::http_issuer::{HttpIssuer, Issuer};
pub use crate::services::issuance::{IssuanceSession, SessionError, SessionState};
pub use crate::zkp::proof_verification::{CredentialVerifier, ProofError, Verdict};
