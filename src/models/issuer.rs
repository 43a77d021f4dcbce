// src/models/issuer.rs
//! Request and response bodies of the HTTP issuer protocol, plus the
//! canonical path builder for issuer endpoints.
//!
//! Shape is enforced by serde; each body also has a `validate()` for the
//! format rules (URLs, dates, chain ids) serde cannot express.

use crate::models::credential::MetaIssuerType;
use crate::models::identifier::{Identifier, StrictId};
use crate::models::registry::{is_chain_id, CredType};
use crate::models::schema::AttributesDefinitions;
use crate::utils::validation::{is_http_url, is_iso_datetime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// Optional parameters of a challenge request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOptions {
    /// Chain id according to CAIP-2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Where to send the subject after out-of-band verification (e.g. KYC)
    #[serde(default, rename = "redirectURL", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl ChallengeOptions {
    pub fn validate(&self) -> bool {
        self.chain_id.as_deref().map_or(true, is_chain_id)
            && self.redirect_url.as_deref().map_or(true, is_http_url)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSubject {
    pub id: Identifier,
}

/// Opens an issuance session for a subject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeReq {
    pub subject: ChallengeSubject,
    /// Date when the credential becomes valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    /// Date when the credential stops being valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ChallengeOptions>,
}

impl ChallengeReq {
    pub fn new(subject_id: Identifier) -> Self {
        Self {
            subject: ChallengeSubject { id: subject_id },
            valid_from: None,
            valid_until: None,
            options: None,
        }
    }

    /// Requests a validity window for the credential.
    pub fn with_validity(mut self, valid_from: Option<String>, valid_until: Option<String>) -> Self {
        self.valid_from = valid_from;
        self.valid_until = valid_until;
        self
    }

    pub fn with_options(mut self, options: ChallengeOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn validate(&self) -> bool {
        self.subject.id.is_loose_valid()
            && self.valid_from.as_deref().map_or(true, is_iso_datetime)
            && self.valid_until.as_deref().map_or(true, is_iso_datetime)
            && self.options.as_ref().map_or(true, ChallengeOptions::validate)
    }

    /// A strict request additionally names a registered subject id kind.
    pub fn is_strict(&self) -> bool {
        self.validate() && StrictId::try_from(&self.subject.id).is_ok()
    }
}

/// Issuer's answer to a challenge request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Issuing session unique identifier
    pub session_id: String,
    /// Message the subject must sign
    pub message: String,
    /// Out-of-band verification page that must be completed before issuance
    #[serde(default, rename = "verifyURL", skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,
}

impl Challenge {
    pub fn validate(&self) -> bool {
        self.verify_url.as_deref().map_or(true, is_http_url)
    }

    /// Parsed verification URL, if the issuer asked for one.
    pub fn verify_url(&self) -> Option<Url> {
        self.verify_url.as_deref().and_then(|url| Url::parse(url).ok())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanIssueReq {
    pub session_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanIssue {
    pub can_issue: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssueReq {
    pub session_id: String,
    /// Subject's signature of the challenge message
    pub signature: String,
}

/// "strict": only the issuer sets the property. "custom": the subject may.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttributePolicy {
    Strict,
    Custom,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JwsInfo {
    /// Key id used to verify the credential JWS
    pub kid: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InfoProtection {
    pub jws: JwsInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InfoIssuer {
    #[serde(rename = "type")]
    pub issuer_type: MetaIssuerType,
    pub uri: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributesPolicy {
    pub valid_from: AttributePolicy,
    pub valid_until: AttributePolicy,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfoCredential {
    #[serde(rename = "type")]
    pub cred_type: String,
    pub attributes_policy: AttributesPolicy,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InfoDefinitions {
    pub attributes: AttributesDefinitions,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfoProofs {
    /// When true the issuer provides the update-proofs method
    pub updatable: bool,
    /// When a proof type was last added to credentials
    pub updated_at: String,
    /// Proof type -> references the issuer signs with
    pub types: IndexMap<String, Vec<String>>,
}

/// Issuer self-description returned by the `info` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub protection: InfoProtection,
    pub issuer: InfoIssuer,
    pub credential: InfoCredential,
    pub definitions: InfoDefinitions,
    pub proofs: InfoProofs,
}

impl Info {
    pub fn validate(&self) -> bool {
        is_http_url(&self.issuer.uri) && is_iso_datetime(&self.proofs.updated_at)
    }
}

/// Canonical endpoint paths of an issuer serving one credential type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerPaths {
    base: String,
}

impl IssuerPaths {
    pub fn new(cred_type: CredType) -> Self {
        Self {
            base: format!("/api/v1/zcred/issuers/{}", cred_type),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn info(&self) -> String {
        format!("{}/info", self.base)
    }

    pub fn challenge(&self) -> String {
        format!("{}/challenge", self.base)
    }

    pub fn can_issue(&self) -> String {
        format!("{}/can-issue", self.base)
    }

    pub fn issue(&self) -> String {
        format!("{}/issue", self.base)
    }

    pub fn update_proofs(&self) -> String {
        format!("{}/update-proofs", self.base)
    }

    /// Full issuer endpoint on `domain`, e.g. `https://issuer.example/api/v1/zcred/issuers/passport`.
    pub fn endpoint(&self, domain: &str) -> Result<Url, url::ParseError> {
        Url::parse(domain)?.join(&self.base)
    }
}
