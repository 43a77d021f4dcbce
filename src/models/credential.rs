// src/models/credential.rs
//! Zero-knowledge credential data model.
//!
//! A credential is an attribute document plus a two-level proof map
//! (`proof type -> reference -> proof`). The inner maps preserve insertion
//! order: when a verifier is not told which reference to check, it takes the
//! first one that was inserted.
//!
//! # Example
//! ```json
//! {
//!   "attributes": { "type": "passport", "subject": { "id": { ... } }, ... },
//!   "proofs": {
//!     "mina:poseidon-pasta": {
//!       "mina:publickey:B62qmNen...": { "type": "mina:poseidon-pasta", ... }
//!     }
//!   }
//! }
//! ```

use crate::models::identifier::Identifier;
use crate::models::schema::{AttributesDefinitions, AttributesSchema, IdentifierSchema};
use crate::utils::validation::{is_http_url, is_iso_datetime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Deref;

/// Credential subject: its identifier plus any issuer-defined fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Subject {
    pub id: Identifier,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subject {
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            extra: Map::new(),
        }
    }
}

/// Attribute document of a credential.
///
/// The mandatory fields are typed; everything else the issuer attests to is
/// kept in `extra` and flattened back on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    #[serde(rename = "type")]
    pub cred_type: String,
    pub issuance_date: String,
    pub valid_from: String,
    pub valid_until: String,
    pub subject: Subject,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attributes {
    /// Renders the attributes as the plain JSON document the transformer walks.
    pub fn to_document(&self) -> Value {
        let mut subject = self.subject.extra.clone();
        let mut id = Map::new();
        id.insert("type".into(), Value::String(self.subject.id.id_type.clone()));
        id.insert("key".into(), Value::String(self.subject.id.key.clone()));
        subject.insert("id".into(), Value::Object(id));

        let mut document = self.extra.clone();
        document.insert("type".into(), Value::String(self.cred_type.clone()));
        document.insert("issuanceDate".into(), Value::String(self.issuance_date.clone()));
        document.insert("validFrom".into(), Value::String(self.valid_from.clone()));
        document.insert("validUntil".into(), Value::String(self.valid_until.clone()));
        document.insert("subject".into(), Value::Object(subject));
        Value::Object(document)
    }

    /// Checks the date fields are ISO-8601 date-times and the subject id is present.
    pub fn validate(&self) -> bool {
        is_iso_datetime(&self.issuance_date)
            && is_iso_datetime(&self.valid_from)
            && is_iso_datetime(&self.valid_until)
            && self.subject.id.is_loose_valid()
            && !self.cred_type.is_empty()
    }
}

/// Issuer of a signature proof.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProofIssuer {
    pub id: Identifier,
}

/// Encoding schema of the proof issuer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProofIssuerSchema {
    pub id: IdentifierSchema,
}

/// Self-describing schema of a [`SignatureProof`]: how the attributes and
/// the proof's own metadata were encoded before hashing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignatureProofSchema {
    #[serde(rename = "type")]
    pub proof_type: Vec<String>,
    pub issuer: ProofIssuerSchema,
    pub signature: Vec<String>,
    pub attributes: AttributesSchema,
}

/// Issuer signature over the linearized attributes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignatureProof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub issuer: ProofIssuer,
    pub signature: String,
    pub schema: SignatureProofSchema,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AciProofSchema {
    pub attributes: AttributesSchema,
    #[serde(rename = "type")]
    pub proof_type: Vec<String>,
    pub aci: Vec<String>,
}

/// Attributes content identifier: a one-way commitment to the attributes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AciProof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub aci: String,
    pub schema: AciProofSchema,
}

/// A proof found in a credential.
///
/// Proofs this crate cannot interpret are kept verbatim as `Unrecognized` so
/// that a foreign or malformed proof never prevents the rest of the
/// credential from being read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Proof {
    Signature(SignatureProof),
    Aci(AciProof),
    Unrecognized(Value),
}

impl Proof {
    /// The `type` field of the proof, if it has one.
    pub fn proof_type(&self) -> Option<&str> {
        match self {
            Proof::Signature(proof) => Some(&proof.proof_type),
            Proof::Aci(proof) => Some(&proof.proof_type),
            Proof::Unrecognized(value) => value.get("type").and_then(Value::as_str),
        }
    }
}

/// `proof type -> reference -> proof`, both levels in insertion order.
pub type Proofs = IndexMap<String, IndexMap<String, Proof>>;

/// Credential carrying attributes and their proofs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ZkCredential {
    pub attributes: Attributes,
    #[serde(default)]
    pub proofs: Proofs,
}

impl ZkCredential {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            proofs: Proofs::new(),
        }
    }

    /// Resolves a proof: the named reference when given, otherwise the first
    /// reference inserted under `proof_type`. An empty reference counts as none.
    pub fn find_proof(&self, proof_type: &str, reference: Option<&str>) -> Option<(&str, &Proof)> {
        let namespace = self.proofs.get(proof_type)?;
        match reference.filter(|reference| !reference.is_empty()) {
            Some(reference) => namespace
                .get_key_value(reference)
                .map(|(key, proof)| (key.as_str(), proof)),
            None => namespace
                .get_index(0)
                .map(|(key, proof)| (key.as_str(), proof)),
        }
    }

    /// Adds a proof under a new reference. Existing proofs are never
    /// overwritten; returns `false` when the reference is already taken.
    pub fn insert_proof(
        &mut self,
        proof_type: impl Into<String>,
        reference: impl Into<String>,
        proof: Proof,
    ) -> bool {
        let namespace = self.proofs.entry(proof_type.into()).or_default();
        let reference = reference.into();
        if namespace.contains_key(&reference) {
            return false;
        }
        namespace.insert(reference, proof);
        true
    }

    /// Whether every proof of `other` is present here, unchanged.
    pub fn contains_proofs_of(&self, other: &ZkCredential) -> bool {
        other.proofs.iter().all(|(proof_type, namespace)| {
            namespace.iter().all(|(reference, proof)| {
                self.proof_at(proof_type, reference)
                    .is_some_and(|found| found == proof)
            })
        })
    }

    /// Whether this credential keeps every proof of `other` and adds at
    /// least one under a `(type, reference)` pair `other` does not have.
    pub fn extends_proofs_of(&self, other: &ZkCredential) -> bool {
        let adds_one = self.proofs.iter().any(|(proof_type, namespace)| {
            namespace
                .keys()
                .any(|reference| other.proof_at(proof_type, reference).is_none())
        });
        adds_one && self.contains_proofs_of(other)
    }

    fn proof_at(&self, proof_type: &str, reference: &str) -> Option<&Proof> {
        self.proofs.get(proof_type)?.get(reference)
    }
}

/// Kinds of issuer transport a credential may name.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetaIssuerType {
    Http,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetaIssuer {
    #[serde(rename = "type")]
    pub issuer_type: MetaIssuerType,
    pub uri: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Definitions {
    pub attributes: AttributesDefinitions,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Meta {
    pub issuer: MetaIssuer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<Definitions>,
}

/// Envelope protection of the whole document, independent of attribute proofs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Protection {
    pub jws: String,
}

/// Credential produced by an HTTP issuer at the end of a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HttpCredential {
    #[serde(flatten)]
    pub credential: ZkCredential,
    pub meta: Meta,
    pub protection: Protection,
}

impl HttpCredential {
    /// Checks attribute formats and the issuer URI.
    pub fn validate(&self) -> bool {
        self.credential.attributes.validate() && is_http_url(&self.meta.issuer.uri)
    }
}

impl Deref for HttpCredential {
    type Target = ZkCredential;

    fn deref(&self) -> &Self::Target {
        &self.credential
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::json;

    pub fn passport_attributes() -> Attributes {
        serde_json::from_value(json!({
            "type": "passport",
            "issuanceDate": "2024-02-26T14:13:12.174Z",
            "validFrom": "2015-01-01T00:00:00.000Z",
            "validUntil": "2029-12-30T21:00:00.000Z",
            "subject": {
                "id": { "type": "ethereum:address", "key": "0x5bd3a1e95c3d5b362fa9bbbbd541aa93f38ec3c0" },
                "firstName": "John",
                "lastName": "Smith",
                "birthDate": "1995-01-01T00:00:00.000Z",
                "gender": "male"
            },
            "countryCode": "GBR",
            "document": {
                "id": "test-passport:123456",
                "sybilId": "zqvg9dLUQLpTPCXanojTPRhaFhZ"
            }
        }))
        .unwrap()
    }

    /// Issued passport credential without proofs.
    pub fn http_credential() -> HttpCredential {
        HttpCredential {
            credential: ZkCredential::new(passport_attributes()),
            meta: Meta {
                issuer: MetaIssuer {
                    issuer_type: MetaIssuerType::Http,
                    uri: "https://issuer.zcred.test/api/v1/zcred/issuers/passport".into(),
                },
                definitions: None,
            },
            protection: Protection {
                jws: "eyJhbGciOiJFUzI1NiJ9..c2lnbmF0dXJl".into(),
            },
        }
    }

    pub fn passport_schema() -> AttributesSchema {
        serde_json::from_value(json!({
            "type": ["ascii-bytes", "bytes-uint128", "uint128-mina:field"],
            "issuanceDate": ["isodate-unixtime", "unixtime-uint64", "uint64-mina:field"],
            "validFrom": ["isodate-unixtime", "unixtime-uint64", "uint64-mina:field"],
            "validUntil": ["isodate-unixtime", "unixtime-uint64", "uint64-mina:field"],
            "subject": {
                "id": {
                    "type": ["ascii-bytes", "bytes-uint128", "uint128-mina:field"],
                    "key": ["hex-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"]
                },
                "firstName": ["utf8-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"],
                "lastName": ["utf8-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"],
                "birthDate": ["isodate-unixtime19", "unixtime19-uint64", "uint64-mina:field"],
                "gender": ["ascii-bytes", "bytes-uint64", "uint64-mina:field"]
            },
            "countryCode": ["ascii-bytes", "bytes-uint32", "uint32-mina:field"],
            "document": {
                "id": ["utf8-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"],
                "sybilId": ["base58-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"]
            }
        }))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    fn unrecognized(tag: &str) -> Proof {
        Proof::Unrecognized(json!({ "tag": tag }))
    }

    #[test]
    fn test_attributes_keep_extra_fields() {
        let attributes = passport_attributes();
        assert!(attributes.validate());
        assert_eq!(attributes.subject.extra["firstName"], "John");

        let document = attributes.to_document();
        assert_eq!(document["document"]["id"], "test-passport:123456");
        assert_eq!(document["subject"]["id"]["type"], "ethereum:address");
        assert_eq!(serde_json::to_value(&attributes).unwrap(), document);
    }

    #[test]
    fn test_attributes_reject_bad_dates() {
        let mut attributes = passport_attributes();
        attributes.issuance_date = String::new();
        assert!(!attributes.validate());
    }

    #[test]
    fn test_find_proof_prefers_first_inserted_reference() {
        let mut credential = ZkCredential::new(passport_attributes());
        assert!(credential.insert_proof("mina:poseidon-pasta", "mina:publickey:second", unrecognized("b")));
        assert!(credential.insert_proof("mina:poseidon-pasta", "mina:publickey:first", unrecognized("a")));

        let (reference, _) = credential.find_proof("mina:poseidon-pasta", None).unwrap();
        assert_eq!(reference, "mina:publickey:second");

        let (reference, proof) = credential
            .find_proof("mina:poseidon-pasta", Some("mina:publickey:first"))
            .unwrap();
        assert_eq!(reference, "mina:publickey:first");
        assert_eq!(proof, &unrecognized("a"));

        assert!(credential.find_proof("mina:poseidon-pasta", Some("nope")).is_none());
        assert!(credential.find_proof("aci:mina-poseidon", None).is_none());
    }

    #[test]
    fn test_insert_proof_never_overwrites() {
        let mut credential = ZkCredential::new(passport_attributes());
        assert!(credential.insert_proof("t", "r", unrecognized("a")));
        assert!(!credential.insert_proof("t", "r", unrecognized("b")));
        assert_eq!(credential.find_proof("t", Some("r")).unwrap().1, &unrecognized("a"));
    }

    #[test]
    fn test_contains_proofs_of() {
        let mut original = ZkCredential::new(passport_attributes());
        original.insert_proof("t", "r1", unrecognized("a"));

        let mut extended = original.clone();
        extended.insert_proof("t", "r2", unrecognized("b"));
        assert!(extended.contains_proofs_of(&original));
        assert!(!original.contains_proofs_of(&extended));

        let mut altered = ZkCredential::new(passport_attributes());
        altered.insert_proof("t", "r1", unrecognized("changed"));
        assert!(!altered.contains_proofs_of(&original));
    }

    #[test]
    fn test_extends_proofs_of_needs_a_new_reference() {
        let mut original = ZkCredential::new(passport_attributes());
        original.insert_proof("t", "r1", unrecognized("a"));
        assert!(!original.extends_proofs_of(&original));

        let mut extended = original.clone();
        extended.insert_proof("u", "r1", unrecognized("b"));
        assert!(extended.extends_proofs_of(&original));
        assert!(!original.extends_proofs_of(&extended));

        let mut replaced = ZkCredential::new(passport_attributes());
        replaced.insert_proof("t", "r2", unrecognized("a"));
        assert!(!replaced.extends_proofs_of(&original));
    }

    #[test]
    fn test_empty_reference_resolves_first() {
        let mut credential = ZkCredential::new(passport_attributes());
        credential.insert_proof("t", "r1", unrecognized("a"));
        credential.insert_proof("t", "r2", unrecognized("b"));
        assert_eq!(credential.find_proof("t", Some("")).unwrap().0, "r1");
    }

    #[test]
    fn test_foreign_proof_does_not_break_parsing() {
        let mut value = serde_json::to_value(ZkCredential::new(passport_attributes())).unwrap();
        value["proofs"] = json!({
            "mina:poseidon-pasta": { "ref": { "issuer": { "id": { "type": "x", "key": "y" } } } }
        });
        let credential: ZkCredential = serde_json::from_value(value).unwrap();
        let (_, proof) = credential.find_proof("mina:poseidon-pasta", None).unwrap();
        assert!(matches!(proof, Proof::Unrecognized(_)));
        assert_eq!(proof.proof_type(), None);
    }

    #[test]
    fn test_http_credential_wire_format() {
        let mut value = serde_json::to_value(ZkCredential::new(passport_attributes())).unwrap();
        value["meta"] = json!({
            "issuer": { "type": "http", "uri": "https://issuer.example/api/v1/zcred/issuers/passport" }
        });
        value["protection"] = json!({ "jws": "eyJhbGciOi..." });

        let credential: HttpCredential = serde_json::from_value(value.clone()).unwrap();
        assert!(credential.validate());
        assert_eq!(credential.attributes.cred_type, "passport");
        assert_eq!(serde_json::to_value(&credential).unwrap(), value);

        value["meta"]["issuer"]["type"] = json!("ipfs");
        assert!(serde_json::from_value::<HttpCredential>(value).is_err());
    }
}
