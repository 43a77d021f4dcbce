// src/zkp/signature.rs
//! Schnorr signatures over the Pallas curve with Poseidon challenges.
//!
//! Keys and signatures travel as base58 strings prefixed with a one-byte
//! version tag, so a public key can never be mistaken for a signature.
//!
//! ## Scheme
//! - `R = k·G`, with `k` negated when needed so that `R.y` is even
//! - `e = Poseidon(pk.x, pk.y, R.x, m...)`
//! - `s = k + e·sk`, signature is `(R.x, s)`
//! - verification recomputes `s·G - e·PK` and compares its x coordinate

use crate::models::identifier::{IdType, Identifier};
use crate::zkp::field::{field_to_scalar, is_odd, scalar_to_field, Field, Scalar};
use crate::zkp::poseidon;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::Zero;
use ark_pallas::Affine;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use rand::{CryptoRng, RngCore};
use std::fmt;
use thiserror::Error;

const PRIVATE_KEY_VERSION: u8 = 0x5a;
const PUBLIC_KEY_VERSION: u8 = 0xcb;
const SIGNATURE_VERSION: u8 = 0x9a;

/// Key or signature decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("unexpected version byte {found:#04x}, expected {expected:#04x}")]
    Version { expected: u8, found: u8 },
    #[error("invalid {what} encoding")]
    Encoding { what: &'static str },
    #[error("public key is the point at infinity")]
    Identity,
}

fn decode_versioned(encoded: &str, version: u8) -> Result<Vec<u8>, KeyError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| KeyError::Base58(e.to_string()))?;
    match bytes.split_first() {
        Some((&found, rest)) if found == version => Ok(rest.to_vec()),
        Some((&found, _)) => Err(KeyError::Version {
            expected: version,
            found,
        }),
        None => Err(KeyError::Base58("empty input".into())),
    }
}

fn encode_versioned(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    bs58::encode(bytes).into_string()
}

fn serialize<T: CanonicalSerialize>(value: &T) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    // Writing into a Vec cannot fail
    let _ = value.serialize_compressed(&mut bytes);
    bytes
}

/// Secret signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Scalar);

impl PrivateKey {
    /// Generates a fresh key from a cryptographically secure RNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let scalar = Scalar::rand(rng);
            if !scalar.is_zero() {
                return PrivateKey(scalar);
            }
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey((Affine::generator() * self.0).into_affine())
    }

    pub fn to_base58(&self) -> String {
        encode_versioned(PRIVATE_KEY_VERSION, &serialize(&self.0))
    }

    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let bytes = decode_versioned(encoded, PRIVATE_KEY_VERSION)?;
        let scalar = Scalar::deserialize_compressed(&bytes[..])
            .map_err(|_| KeyError::Encoding { what: "private key" })?;
        if scalar.is_zero() {
            return Err(KeyError::Encoding { what: "private key" });
        }
        Ok(PrivateKey(scalar))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Public verification key: a point on the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(Affine);

impl PublicKey {
    pub fn to_base58(&self) -> String {
        encode_versioned(PUBLIC_KEY_VERSION, &serialize(&self.0))
    }

    /// Decodes and checks the point is on the curve and not the identity.
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let bytes = decode_versioned(encoded, PUBLIC_KEY_VERSION)?;
        let point = Affine::deserialize_compressed(&bytes[..])
            .map_err(|_| KeyError::Encoding { what: "public key" })?;
        if point.infinity {
            return Err(KeyError::Identity);
        }
        Ok(PublicKey(point))
    }

    /// Field representation: the x coordinate followed by the parity of y.
    pub fn to_fields(&self) -> [Field; 2] {
        [self.0.x, Field::from(is_odd(&self.0.y) as u64)]
    }

    /// The `mina:publickey` identifier of this key.
    pub fn identifier(&self) -> Identifier {
        Identifier::new(IdType::MinaPublicKey.as_str(), self.to_base58())
    }
}

/// Schnorr signature `(r, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    r: Field,
    s: Scalar,
}

impl Signature {
    pub fn to_base58(&self) -> String {
        let mut payload = serialize(&self.r);
        payload.extend(serialize(&self.s));
        encode_versioned(SIGNATURE_VERSION, &payload)
    }

    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let bytes = decode_versioned(encoded, SIGNATURE_VERSION)?;
        let field_len = Field::zero().compressed_size();
        if bytes.len() != field_len + Scalar::zero().compressed_size() {
            return Err(KeyError::Encoding { what: "signature" });
        }
        let (r_bytes, s_bytes) = bytes.split_at(field_len);
        let r = Field::deserialize_compressed(r_bytes)
            .map_err(|_| KeyError::Encoding { what: "signature" })?;
        let s = Scalar::deserialize_compressed(s_bytes)
            .map_err(|_| KeyError::Encoding { what: "signature" })?;
        Ok(Signature { r, s })
    }
}

fn challenge(public_key: &PublicKey, r: Field, message: &[Field]) -> Scalar {
    let mut input = Vec::with_capacity(message.len() + 3);
    input.push(public_key.0.x);
    input.push(public_key.0.y);
    input.push(r);
    input.extend_from_slice(message);
    field_to_scalar(&poseidon::hash(&input))
}

fn derive_nonce(private_key: &PrivateKey, public_key: &PublicKey, message: &[Field]) -> Scalar {
    let mut input = Vec::with_capacity(message.len() + 3);
    input.push(scalar_to_field(&private_key.0));
    input.push(public_key.0.x);
    input.push(public_key.0.y);
    input.extend_from_slice(message);
    let nonce = field_to_scalar(&poseidon::hash(&input));
    if nonce.is_zero() {
        Scalar::from(1u64)
    } else {
        nonce
    }
}

/// Signs a field-element message. Deterministic: the nonce is derived from
/// the key and the message.
pub fn sign(private_key: &PrivateKey, message: &[Field]) -> Signature {
    let public_key = private_key.public_key();
    let mut k = derive_nonce(private_key, &public_key, message);
    let mut r_point = (Affine::generator() * k).into_affine();
    if is_odd(&r_point.y) {
        k = -k;
        r_point = (Affine::generator() * k).into_affine();
    }
    let e = challenge(&public_key, r_point.x, message);
    Signature {
        r: r_point.x,
        s: k + e * private_key.0,
    }
}

/// Checks a signature over a field-element message.
pub fn verify(public_key: &PublicKey, message: &[Field], signature: &Signature) -> bool {
    let e = challenge(public_key, signature.r, message);
    let r_point = (Affine::generator() * signature.s - public_key.0 * e).into_affine();
    !r_point.infinity && !is_odd(&r_point.y) && r_point.x == signature.r
}
