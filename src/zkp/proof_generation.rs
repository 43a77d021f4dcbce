// src/zkp/proof_generation.rs
//! Proof generation over the Pallas/Poseidon stack.
//!
//! Two proof families are produced here:
//! - `mina:poseidon-pasta` signature proofs, binding the attributes to an
//!   issuer key
//! - `aci:mina-poseidon` commitments, a keyless content identifier of the
//!   attributes
//!
//! Both embed the canonical attribute schema they were computed with, plus
//! fixed encodings for their own metadata, so a verifier needs nothing
//! beyond the proof itself.

use crate::models::credential::{
    AciProof, AciProofSchema, Attributes, ProofIssuer, ProofIssuerSchema, SignatureProof,
    SignatureProofSchema,
};
use crate::models::identifier::Identifier;
use crate::models::registry::ProofType;
use crate::models::schema::{AttributesSchema, IdentifierSchema};
use crate::zkp::field::field_to_uint;
use crate::zkp::poseidon;
use crate::zkp::signature::{self, KeyError, PrivateKey, PublicKey};
use crate::zkp::transform::{linearize, transform_value, Step, TrValue, TransformError};
use log::debug;

/// Encoding of the proof `type` string and of the issuer id type.
pub const TYPE_SCHEMA: [&str; 4] = ["ascii-bytes", "bytes-uint", "mina:mod.order", "uint-mina:field"];

/// Encoding of the issuer public key.
pub const PUBLIC_KEY_SCHEMA: [&str; 1] = ["base58-mina:publickey"];

/// Encoding of the signature string.
pub const SIGNATURE_SCHEMA: [&str; 1] = ["base58-mina:signature"];

/// Pipeline turning the attributes hash into the ACI string.
pub const ACI_STEPS: [Step; 2] = [Step::Uint256Bytes, Step::BytesBase58];

fn owned(steps: &[&str]) -> Vec<String> {
    steps.iter().map(|step| step.to_string()).collect()
}

/// Signs attribute documents on behalf of an issuer.
pub trait SignatureProver {
    fn proof_type(&self) -> ProofType;

    fn issuer_id(&self) -> Identifier;

    fn sign_attributes(
        &self,
        attributes: &Attributes,
        schema: &AttributesSchema,
    ) -> Result<SignatureProof, TransformError>;
}

/// Issuer-side prover for `mina:poseidon-pasta` proofs.
pub struct PoseidonPastaProver {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl PoseidonPastaProver {
    pub fn new(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Builds a prover from a base58 private key.
    ///
    /// # Arguments
    /// * `private_key` - Base58 encoded Pallas private key
    ///
    /// # Returns
    /// The prover, or a `KeyError` when the key fails to decode
    pub fn from_base58(private_key: &str) -> Result<Self, KeyError> {
        PrivateKey::from_base58(private_key).map(Self::new)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl SignatureProver for PoseidonPastaProver {
    fn proof_type(&self) -> ProofType {
        ProofType::MinaPoseidonPasta
    }

    fn issuer_id(&self) -> Identifier {
        self.public_key.identifier()
    }

    /// Linearizes the attributes, hashes them and signs the hash.
    ///
    /// # Arguments
    /// * `attributes` - Attribute document to sign
    /// * `schema` - Transform schema mirroring `attributes`
    ///
    /// # Returns
    /// A `SignatureProof` carrying the canonical schema, or the
    /// `TransformError` that stopped linearization
    fn sign_attributes(
        &self,
        attributes: &Attributes,
        schema: &AttributesSchema,
    ) -> Result<SignatureProof, TransformError> {
        let linear = linearize(&attributes.to_document(), schema)?;
        let hash = poseidon::hash(&linear);
        let signature = signature::sign(&self.private_key, &[hash]);
        debug!(
            "signed {} attribute fields for issuer {}",
            linear.len(),
            self.issuer_id()
        );

        Ok(SignatureProof {
            proof_type: self.proof_type().to_string(),
            issuer: ProofIssuer {
                id: self.issuer_id(),
            },
            signature: signature.to_base58(),
            schema: SignatureProofSchema {
                proof_type: owned(&TYPE_SCHEMA),
                issuer: ProofIssuerSchema {
                    id: IdentifierSchema {
                        id_type: owned(&TYPE_SCHEMA),
                        key: owned(&PUBLIC_KEY_SCHEMA),
                    },
                },
                signature: owned(&SIGNATURE_SCHEMA),
                attributes: schema.clone(),
            },
        })
    }
}

/// Computes the attributes content identifier: the Poseidon hash of the
/// linearized attributes, as 32 big-endian bytes in base58.
pub fn attributes_content_id(
    attributes: &Attributes,
    schema: &AttributesSchema,
) -> Result<String, TransformError> {
    let linear = linearize(&attributes.to_document(), schema)?;
    let hash = poseidon::hash(&linear);
    match transform_value(TrValue::Uint(field_to_uint(&hash)), &ACI_STEPS)? {
        TrValue::Str(aci) => Ok(aci),
        _ => Err(TransformError::NotField {
            path: "aci".into(),
            produced: "a non-string value",
        }),
    }
}

/// Builds an `aci:mina-poseidon` proof for the attributes.
pub fn aci_proof(attributes: &Attributes, schema: &AttributesSchema) -> Result<AciProof, TransformError> {
    let aci = attributes_content_id(attributes, schema)?;
    Ok(AciProof {
        proof_type: ProofType::AciMinaPoseidon.to_string(),
        aci,
        schema: AciProofSchema {
            attributes: schema.clone(),
            proof_type: owned(&TYPE_SCHEMA),
            aci: ACI_STEPS.iter().map(|step| step.name().to_string()).collect(),
        },
    })
}
