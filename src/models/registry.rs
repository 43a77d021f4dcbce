// src/models/registry.rs
//! Closed registries of credential types, proof types and chain identifiers.
//!
//! Each registry is an enum so that adding a new kind forces every `match`
//! over it to be revisited.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a wire string is not part of the registry it is parsed into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {registry}: {value}")]
pub struct UnknownVariant {
    pub registry: &'static str,
    pub value: String,
}

/// CAIP-2 chain identifier pattern, e.g. `eip155:1` or `mina:berkeley`.
static CHAIN_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[-a-z0-9]{3,8}:[-_a-zA-Z0-9]{1,32}$").expect("chain id pattern is valid")
});

/// Checks a chain identifier against the CAIP-2 syntax.
pub fn is_chain_id(chain_id: &str) -> bool {
    CHAIN_ID_REGEX.is_match(chain_id)
}

/// Credential types an issuer may serve.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredType {
    #[serde(rename = "passport")]
    Passport,
    #[serde(rename = "passport-test")]
    PassportTest,
}

impl CredType {
    pub const ALL: [CredType; 2] = [CredType::Passport, CredType::PassportTest];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredType::Passport => "passport",
            CredType::PassportTest => "passport-test",
        }
    }
}

/// Proof families a credential may carry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProofType {
    /// Poseidon hash over the Pasta field signed with a Schnorr key
    #[serde(rename = "mina:poseidon-pasta")]
    MinaPoseidonPasta,
    /// Attributes content identifier: a Poseidon commitment, no key involved
    #[serde(rename = "aci:mina-poseidon")]
    AciMinaPoseidon,
}

impl ProofType {
    pub const ALL: [ProofType; 2] = [ProofType::MinaPoseidonPasta, ProofType::AciMinaPoseidon];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProofType::MinaPoseidonPasta => "mina:poseidon-pasta",
            ProofType::AciMinaPoseidon => "aci:mina-poseidon",
        }
    }
}

/// Mina networks recognised in challenge options.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinaChainId {
    #[serde(rename = "mina:mainnet")]
    Mainnet,
    #[serde(rename = "mina:berkeley")]
    Berkeley,
}

impl MinaChainId {
    pub const ALL: [MinaChainId; 2] = [MinaChainId::Mainnet, MinaChainId::Berkeley];

    pub fn as_str(&self) -> &'static str {
        match self {
            MinaChainId::Mainnet => "mina:mainnet",
            MinaChainId::Berkeley => "mina:berkeley",
        }
    }
}

macro_rules! registry_string_impls {
    ($ty:ty, $name:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .into_iter()
                    .find(|variant| variant.as_str() == s)
                    .ok_or_else(|| UnknownVariant {
                        registry: $name,
                        value: s.to_string(),
                    })
            }
        }
    };
}

registry_string_impls!(CredType, "credential type");
registry_string_impls!(ProofType, "proof type");
registry_string_impls!(MinaChainId, "mina chain id");
