// src/models/identifier.rs
//! Public identities used as credential subjects and proof issuers.
//!
//! An [`Identifier`] is the loose wire form: any `type` string is accepted.
//! A [`StrictId`] additionally requires the `type` to belong to the closed
//! [`IdType`] registry and is obtained through `TryFrom`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a string does not name a registered identifier kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported identifier type: {0}")]
pub struct UnknownIdType(pub String);

/// Closed registry of supported identifier kinds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
    /// Hex encoded Ethereum account address
    #[serde(rename = "ethereum:address")]
    EthereumAddress,
    /// Base58 encoded Mina public key
    #[serde(rename = "mina:publickey")]
    MinaPublicKey,
}

impl IdType {
    /// Every registered kind, in registry order.
    pub const ALL: [IdType; 2] = [IdType::EthereumAddress, IdType::MinaPublicKey];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdType::EthereumAddress => "ethereum:address",
            IdType::MinaPublicKey => "mina:publickey",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = UnknownIdType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdType::ALL
            .into_iter()
            .find(|id_type| id_type.as_str() == s)
            .ok_or_else(|| UnknownIdType(s.to_string()))
    }
}

/// A namespaced public identity, e.g. a blockchain address or public key.
///
/// # Example
/// ```json
/// { "type": "mina:publickey", "key": "B62qqXhJ8qgXdApGoAvZHeX..." }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    /// Identifier kind, e.g. `mina:publickey`
    #[serde(rename = "type")]
    pub id_type: String,
    /// Kind-specific key material
    pub key: String,
}

impl Identifier {
    pub fn new(id_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id_type: id_type.into(),
            key: key.into(),
        }
    }

    /// Conventional proof reference for proofs issued by this identity:
    /// `"<type>:<key>"`.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.id_type, self.key)
    }

    /// Loose validation: both parts must be present and non-empty.
    pub fn is_loose_valid(&self) -> bool {
        !self.id_type.is_empty() && !self.key.is_empty()
    }

    /// Strict validation: the kind must be registered.
    pub fn is_strict_valid(&self) -> bool {
        StrictId::try_from(self).is_ok()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id_type, self.key)
    }
}

/// An identifier whose kind belongs to the [`IdType`] registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrictId {
    pub id_type: IdType,
    pub key: String,
}

impl StrictId {
    pub fn new(id_type: IdType, key: impl Into<String>) -> Self {
        Self {
            id_type,
            key: key.into(),
        }
    }

    /// Normalizes key spelling so equal identities compare equal.
    ///
    /// Ethereum addresses are lower-cased and always carry the `0x` prefix;
    /// other kinds are case sensitive and returned unchanged.
    pub fn normalize(&self) -> StrictId {
        match self.id_type {
            IdType::EthereumAddress => {
                let key = self.key.to_lowercase();
                let key = if key.starts_with("0x") {
                    key
                } else {
                    format!("0x{}", key)
                };
                StrictId::new(self.id_type, key)
            }
            IdType::MinaPublicKey => self.clone(),
        }
    }
}

impl TryFrom<&Identifier> for StrictId {
    type Error = UnknownIdType;

    fn try_from(id: &Identifier) -> Result<Self, Self::Error> {
        let id_type = id.id_type.parse::<IdType>()?;
        Ok(StrictId::new(id_type, id.key.clone()))
    }
}

impl From<StrictId> for Identifier {
    fn from(id: StrictId) -> Self {
        Identifier::new(id.id_type.as_str(), id.key)
    }
}
