// src/main.rs

//! # zcred command line client
//!
//! Thin front end over the `zcred` library.
//!
//! ## Commands
//! - `zcred info`: print the configured issuer's self-description
//! - `zcred issue <subject-key>`: run an issuance session and print the credential
//! - `zcred verify <credential.json> [proof-type] [reference]`: check one proof
//!
//! ## Configuration
//! - `ZCRED_ISSUER_URI`: issuer base URI (or `issuer_uri` in `zcred.toml`)
//! - `ZCRED_ACCESS_TOKEN`: (Optional) bearer token for the issuer
//! - `RUST_LOG`: log filter, e.g. `zcred=debug`

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use zcred::models::credential::ZkCredential;
use zcred::models::issuer::ChallengeReq;
use zcred::models::registry::ProofType;
use zcred::services::http_issuer::{HttpIssuer, Issuer};
use zcred::services::issuance::{IssuanceSession, LogSurface};
use zcred::wallet::key_management::KeyManager;
use zcred::zkp::proof_verification::{CredentialVerifier, Verdict};
use zcred::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "zcred")]
#[command(about = "Client for zcred credential issuers and proofs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print the configured issuer's self-description
    Info,
    /// Run an issuance session and print the credential
    Issue {
        /// Base58 subject private key
        subject_key: String,
    },
    /// Check one proof of a stored credential
    Verify {
        /// Credential JSON file
        path: PathBuf,
        /// Proof type to check
        #[arg(default_value_t = ProofType::MinaPoseidonPasta)]
        proof_type: ProofType,
        /// Proof reference, the first one when omitted
        reference: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    match Cli::parse().command {
        Command::Info => info_command().await,
        Command::Issue { subject_key } => issue_command(&subject_key).await,
        Command::Verify {
            path,
            proof_type,
            reference,
        } => verify_command(&path, proof_type, reference.as_deref()),
    }
}

async fn info_command() -> Result<()> {
    let config = ClientConfig::load()?;
    let issuer = HttpIssuer::from_config(&config)?;
    let info = issuer.get_info().await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Runs a full issuance session for the wallet behind `key`.
///
/// # Arguments
/// * `key` - Base58 subject private key
///
/// Ctrl-C cancels the session.
async fn issue_command(key: &str) -> Result<()> {
    let config = ClientConfig::load()?;
    let issuer = HttpIssuer::from_config(&config)?;
    let wallet = KeyManager::from_base58(key).context("subject key is not a valid private key")?;

    let mut session = IssuanceSession::new(&issuer, &config);
    let cancel = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    info!("requesting credential from {} for {}", issuer.uri(), wallet.subject_id());
    let req = ChallengeReq::new(wallet.subject_id());
    let credential = session.run(&req, &wallet, &LogSurface).await?;
    println!("{}", serde_json::to_string_pretty(&credential)?);
    Ok(())
}

fn verify_command(path: &Path, proof_type: ProofType, reference: Option<&str>) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let credential: ZkCredential = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a zcred credential", path.display()))?;

    match CredentialVerifier::new(proof_type).verify(&credential, reference)? {
        Verdict::Verified => {
            println!("{}: verified", proof_type);
            Ok(())
        }
        Verdict::Rejected(reason) => bail!("{}: rejected, {}", proof_type, reason),
    }
}
