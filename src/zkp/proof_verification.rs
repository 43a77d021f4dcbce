// src/zkp/proof_verification.rs
//! # Credential proof verification
//!
//! Verifiers resolve a proof inside a credential's proof map and re-derive
//! what it attests to from the credential's own attributes.
//!
//! Resolution is `proofs[type][reference]`, or the first inserted reference
//! when none is given. An absent proof is an error; a present proof that
//! does not check out is a [`Verdict::Rejected`], never an error, so that
//! untrusted credentials can be processed without failing the caller.

use crate::models::credential::{AciProof, Proof, SignatureProof, ZkCredential};
use crate::models::identifier::IdType;
use crate::models::registry::ProofType;
use crate::zkp::poseidon;
use crate::zkp::proof_generation::attributes_content_id;
use crate::zkp::signature::{self, PublicKey, Signature};
use crate::zkp::transform::{linearize, TransformError};
use log::{debug, warn};
use std::fmt;
use thiserror::Error;

/// Outcome of checking a proof that was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Verified,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified)
    }
}

/// Why a present proof failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The proof does not have the structure of its declared type.
    Malformed(String),
    /// Decoding succeeded but the signature does not match.
    SignatureMismatch,
    /// The attributes could not be linearized with the proof's schema.
    Transform(TransformError),
    /// Recomputed content identifier differs from the stored one.
    CommitmentMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed(reason) => write!(f, "malformed proof: {}", reason),
            Rejection::SignatureMismatch => f.write_str("signature mismatch"),
            Rejection::Transform(err) => write!(f, "attributes do not fit proof schema: {}", err),
            Rejection::CommitmentMismatch => f.write_str("content identifier mismatch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("can not find proof by proof type {proof_type} & reference {}", .reference.as_deref().unwrap_or("<first>"))]
    NotFound {
        proof_type: ProofType,
        reference: Option<String>,
    },
}

/// Checks one proof family.
pub trait ProofVerifier {
    fn proof_type(&self) -> ProofType;

    /// Checks a proof already resolved from `credential`.
    fn check(&self, credential: &ZkCredential, proof: &Proof) -> Verdict;

    /// Resolves and checks the proof of this verifier's type.
    ///
    /// # Arguments
    /// * `credential` - Credential holding the attributes and proofs
    /// * `reference` - Proof reference, the first inserted one when `None`
    ///
    /// # Returns
    /// `Err(ProofError::NotFound)` if there is no such proof, otherwise the verdict
    fn verify(&self, credential: &ZkCredential, reference: Option<&str>) -> Result<Verdict, ProofError> {
        let proof_type = self.proof_type();
        let (found, proof) = credential
            .find_proof(proof_type.as_str(), reference)
            .ok_or_else(|| ProofError::NotFound {
                proof_type,
                reference: reference.map(str::to_string),
            })?;
        let verdict = self.check(credential, proof);
        match &verdict {
            Verdict::Verified => debug!("{} proof {} verified", proof_type, found),
            Verdict::Rejected(reason) => warn!("{} proof {} rejected: {}", proof_type, found, reason),
        }
        Ok(verdict)
    }
}

fn expect_type(declared: &str, expected: ProofType) -> Result<(), Rejection> {
    if declared == expected.as_str() {
        Ok(())
    } else {
        Err(Rejection::Malformed(format!(
            "declared type {} under {}",
            declared, expected
        )))
    }
}

/// Verifier of `mina:poseidon-pasta` signature proofs.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoseidonPastaVerifier;

impl PoseidonPastaVerifier {
    fn check_signature(credential: &ZkCredential, proof: &SignatureProof) -> Result<(), Rejection> {
        expect_type(&proof.proof_type, ProofType::MinaPoseidonPasta)?;
        if proof.issuer.id.id_type != IdType::MinaPublicKey.as_str() {
            return Err(Rejection::Malformed(format!(
                "unsupported issuer id type {}",
                proof.issuer.id.id_type
            )));
        }
        let public_key = PublicKey::from_base58(&proof.issuer.id.key)
            .map_err(|e| Rejection::Malformed(format!("issuer key: {}", e)))?;
        let signature = Signature::from_base58(&proof.signature)
            .map_err(|e| Rejection::Malformed(format!("signature: {}", e)))?;

        let linear = linearize(&credential.attributes.to_document(), &proof.schema.attributes)
            .map_err(Rejection::Transform)?;
        let message = poseidon::hash(&linear);
        if signature::verify(&public_key, &[message], &signature) {
            Ok(())
        } else {
            Err(Rejection::SignatureMismatch)
        }
    }
}

impl ProofVerifier for PoseidonPastaVerifier {
    fn proof_type(&self) -> ProofType {
        ProofType::MinaPoseidonPasta
    }

    fn check(&self, credential: &ZkCredential, proof: &Proof) -> Verdict {
        let result = match proof {
            Proof::Signature(proof) => Self::check_signature(credential, proof),
            _ => Err(Rejection::Malformed("not a signature proof".into())),
        };
        match result {
            Ok(()) => Verdict::Verified,
            Err(reason) => Verdict::Rejected(reason),
        }
    }
}

/// Verifier of `aci:mina-poseidon` commitments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AciPoseidonVerifier;

impl AciPoseidonVerifier {
    fn check_commitment(credential: &ZkCredential, proof: &AciProof) -> Result<(), Rejection> {
        expect_type(&proof.proof_type, ProofType::AciMinaPoseidon)?;
        let aci = attributes_content_id(&credential.attributes, &proof.schema.attributes)
            .map_err(Rejection::Transform)?;
        if aci == proof.aci {
            Ok(())
        } else {
            Err(Rejection::CommitmentMismatch)
        }
    }
}

impl ProofVerifier for AciPoseidonVerifier {
    fn proof_type(&self) -> ProofType {
        ProofType::AciMinaPoseidon
    }

    fn check(&self, credential: &ZkCredential, proof: &Proof) -> Verdict {
        let result = match proof {
            Proof::Aci(proof) => Self::check_commitment(credential, proof),
            _ => Err(Rejection::Malformed("not an ACI proof".into())),
        };
        match result {
            Ok(()) => Verdict::Verified,
            Err(reason) => Verdict::Rejected(reason),
        }
    }
}

/// Dispatches to the verifier of one proof type.
pub struct CredentialVerifier {
    verifier: Box<dyn ProofVerifier + Send + Sync>,
}

impl CredentialVerifier {
    pub fn new(proof_type: ProofType) -> Self {
        let verifier: Box<dyn ProofVerifier + Send + Sync> = match proof_type {
            ProofType::MinaPoseidonPasta => Box::new(PoseidonPastaVerifier),
            ProofType::AciMinaPoseidon => Box::new(AciPoseidonVerifier),
        };
        Self { verifier }
    }

    pub fn proof_type(&self) -> ProofType {
        self.verifier.proof_type()
    }

    pub fn verify(&self, credential: &ZkCredential, reference: Option<&str>) -> Result<Verdict, ProofError> {
        self.verifier.verify(credential, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::fixtures::{passport_attributes, passport_schema};
    use crate::models::credential::Attributes;
    use crate::zkp::proof_generation::{aci_proof, PoseidonPastaProver, SignatureProver};
    use crate::zkp::signature::PrivateKey;
    use serde_json::json;

    fn prover() -> PoseidonPastaProver {
        PoseidonPastaProver::new(PrivateKey::generate(&mut rand::thread_rng()))
    }

    fn signed_credential(prover: &PoseidonPastaProver) -> ZkCredential {
        let mut credential = ZkCredential::new(passport_attributes());
        let proof = prover
            .sign_attributes(&credential.attributes, &passport_schema())
            .unwrap();
        credential.insert_proof(
            proof.proof_type.clone(),
            prover.issuer_id().reference(),
            Proof::Signature(proof),
        );
        credential
    }

    #[test]
    fn test_sign_then_verify() {
        let credential = signed_credential(&prover());
        let verdict = CredentialVerifier::new(ProofType::MinaPoseidonPasta)
            .verify(&credential, None)
            .unwrap();
        assert_eq!(verdict, Verdict::Verified);
    }

    #[test]
    fn test_verify_survives_serialization() {
        let credential = signed_credential(&prover());
        let json = serde_json::to_string(&credential).unwrap();
        let parsed: ZkCredential = serde_json::from_str(&json).unwrap();
        assert!(PoseidonPastaVerifier.verify(&parsed, None).unwrap().is_verified());
    }

    #[test]
    fn test_tampered_leaf_is_rejected() {
        let mut credential = signed_credential(&prover());
        credential
            .attributes
            .subject
            .extra
            .insert("lastName".into(), json!("Smyth"));
        assert_eq!(
            PoseidonPastaVerifier.verify(&credential, None).unwrap(),
            Verdict::Rejected(Rejection::SignatureMismatch)
        );
    }

    /// Copies of `attributes` with exactly one schema leaf changed, each
    /// still valid for its transformation steps.
    fn single_leaf_mutations(attributes: &Attributes) -> Vec<(String, Attributes)> {
        passport_schema()
            .leaves()
            .into_iter()
            .map(|(path, steps)| {
                let mut document = attributes.to_document();
                let pointer = format!("/{}", path.join("/"));
                let leaf = document.pointer_mut(&pointer).unwrap();
                let current = leaf.as_str().unwrap().to_string();
                let changed = if steps[0].starts_with("isodate") {
                    if current == "2001-02-03T04:05:06.000Z" {
                        "2002-02-03T04:05:06.000Z".to_string()
                    } else {
                        "2001-02-03T04:05:06.000Z".to_string()
                    }
                } else {
                    let mut chars: Vec<char> = current.chars().collect();
                    let last = chars.last_mut().unwrap();
                    *last = if *last == '2' { '3' } else { '2' };
                    chars.into_iter().collect()
                };
                *leaf = json!(changed);
                (pointer, serde_json::from_value(document).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_every_tampered_leaf_is_rejected() {
        let credential = signed_credential(&prover());
        let mutations = single_leaf_mutations(&credential.attributes);
        assert_eq!(mutations.len(), passport_schema().leaves().len());
        for (pointer, attributes) in mutations {
            let mut tampered = credential.clone();
            tampered.attributes = attributes;
            assert_eq!(
                PoseidonPastaVerifier.verify(&tampered, None).unwrap(),
                Verdict::Rejected(Rejection::SignatureMismatch),
                "tampering {} went unnoticed",
                pointer
            );
        }
    }

    #[test]
    fn test_every_tampered_leaf_breaks_aci() {
        let mut credential = ZkCredential::new(passport_attributes());
        let proof = aci_proof(&credential.attributes, &passport_schema()).unwrap();
        credential.insert_proof("aci:mina-poseidon", proof.aci.clone(), Proof::Aci(proof));
        for (pointer, attributes) in single_leaf_mutations(&credential.attributes) {
            let mut tampered = credential.clone();
            tampered.attributes = attributes;
            assert_eq!(
                AciPoseidonVerifier.verify(&tampered, None).unwrap(),
                Verdict::Rejected(Rejection::CommitmentMismatch),
                "tampering {} went unnoticed",
                pointer
            );
        }
    }

    #[test]
    fn test_empty_reference_verifies_first_proof() {
        let credential = signed_credential(&prover());
        assert!(PoseidonPastaVerifier.verify(&credential, Some("")).unwrap().is_verified());
    }

    #[test]
    fn test_added_attribute_is_rejected() {
        let mut credential = signed_credential(&prover());
        credential.attributes.extra.insert("nationality".into(), json!("GBR"));
        assert!(matches!(
            PoseidonPastaVerifier.verify(&credential, None).unwrap(),
            Verdict::Rejected(Rejection::Transform(TransformError::MissingSchema { .. }))
        ));
    }

    #[test]
    fn test_resolves_first_and_named_reference() {
        let first = prover();
        let second = prover();
        let mut credential = signed_credential(&first);
        let proof = second
            .sign_attributes(&credential.attributes, &passport_schema())
            .unwrap();
        let mut forged = proof.clone();
        forged.signature = first
            .sign_attributes(&credential.attributes, &passport_schema())
            .unwrap()
            .signature;
        credential.insert_proof("mina:poseidon-pasta", second.issuer_id().reference(), Proof::Signature(proof));
        credential.insert_proof("mina:poseidon-pasta", "forged", Proof::Signature(forged));

        let verifier = PoseidonPastaVerifier;
        assert!(verifier.verify(&credential, None).unwrap().is_verified());
        assert!(verifier
            .verify(&credential, Some(&second.issuer_id().reference()))
            .unwrap()
            .is_verified());
        assert_eq!(
            verifier.verify(&credential, Some("forged")).unwrap(),
            Verdict::Rejected(Rejection::SignatureMismatch)
        );
    }

    #[test]
    fn test_absent_proof_is_an_error() {
        let credential = signed_credential(&prover());
        let err = PoseidonPastaVerifier
            .verify(&credential, Some("mina:publickey:unknown"))
            .unwrap_err();
        assert_eq!(
            err,
            ProofError::NotFound {
                proof_type: ProofType::MinaPoseidonPasta,
                reference: Some("mina:publickey:unknown".into())
            }
        );
        assert!(AciPoseidonVerifier.verify(&credential, None).is_err());
    }

    #[test]
    fn test_malformed_proof_is_rejected() {
        let mut credential = ZkCredential::new(passport_attributes());
        credential.insert_proof(
            "mina:poseidon-pasta",
            "garbage",
            Proof::Unrecognized(json!({ "type": "mina:poseidon-pasta" })),
        );
        assert!(matches!(
            PoseidonPastaVerifier.verify(&credential, None).unwrap(),
            Verdict::Rejected(Rejection::Malformed(_))
        ));

        let mut proof = prover()
            .sign_attributes(&credential.attributes, &passport_schema())
            .unwrap();
        proof.signature = "not-base58-0OIl".into();
        credential.insert_proof("mina:poseidon-pasta", "bad-signature", Proof::Signature(proof));
        assert!(matches!(
            PoseidonPastaVerifier.verify(&credential, Some("bad-signature")).unwrap(),
            Verdict::Rejected(Rejection::Malformed(_))
        ));
    }

    #[test]
    fn test_aci_round_trip_and_tamper() {
        let mut credential = ZkCredential::new(passport_attributes());
        let proof = aci_proof(&credential.attributes, &passport_schema()).unwrap();
        credential.insert_proof("aci:mina-poseidon", proof.aci.clone(), Proof::Aci(proof));

        let verifier = CredentialVerifier::new(ProofType::AciMinaPoseidon);
        assert_eq!(verifier.proof_type(), ProofType::AciMinaPoseidon);
        assert!(verifier.verify(&credential, None).unwrap().is_verified());

        credential.attributes.extra.insert("countryCode".into(), json!("USA"));
        assert_eq!(
            verifier.verify(&credential, None).unwrap(),
            Verdict::Rejected(Rejection::CommitmentMismatch)
        );
    }
}
