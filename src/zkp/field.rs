// src/zkp/field.rs
//! Field elements of the Pallas curve.
//!
//! Attributes are linearized into the base field [`Field`]; signatures use
//! the scalar field [`Scalar`] for secret keys and nonces.

use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use once_cell::sync::Lazy;

/// Pallas base field: the unit hashed and signed.
pub type Field = ark_pallas::Fq;

/// Pallas scalar field.
pub type Scalar = ark_pallas::Fr;

static FIELD_MODULUS: Lazy<BigUint> = Lazy::new(|| Field::MODULUS.into());

/// Modulus of [`Field`] as an unsigned integer.
pub fn modulus() -> &'static BigUint {
    &FIELD_MODULUS
}

/// Converts an integer already known to be below the modulus.
///
/// Returns `None` when `value >= modulus`.
pub fn field_from_uint(value: &BigUint) -> Option<Field> {
    if value >= modulus() {
        return None;
    }
    Some(Field::from_le_bytes_mod_order(&value.to_bytes_le()))
}

/// Reduces an arbitrary integer into the field.
pub fn field_mod_order(value: &BigUint) -> Field {
    Field::from_le_bytes_mod_order(&value.to_bytes_le())
}

pub fn field_to_uint(value: &Field) -> BigUint {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le())
}

/// Reinterprets a base-field element as a scalar. Lossless on Pallas since
/// the base modulus is below the scalar modulus.
pub fn field_to_scalar(value: &Field) -> Scalar {
    Scalar::from_le_bytes_mod_order(&value.into_bigint().to_bytes_le())
}

/// Reduces a scalar into the base field.
pub fn scalar_to_field(value: &Scalar) -> Field {
    Field::from_le_bytes_mod_order(&value.into_bigint().to_bytes_le())
}

/// Parity of the canonical representative.
pub fn is_odd(value: &Field) -> bool {
    value.into_bigint().is_odd()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_uint_enforces_modulus() {
        let below = modulus() - 1u32;
        assert!(field_from_uint(&below).is_some());
        assert!(field_from_uint(modulus()).is_none());
        assert_eq!(field_mod_order(modulus()), Field::from(0u64));
    }

    #[test]
    fn test_uint_round_trip() {
        let value = BigUint::from(123_456_789u64);
        let field = field_from_uint(&value).unwrap();
        assert_eq!(field_to_uint(&field), value);
        assert_eq!(field, Field::from(123_456_789u64));
        assert!(is_odd(&field));
        assert_eq!(scalar_to_field(&field_to_scalar(&field)), field);
    }
}
