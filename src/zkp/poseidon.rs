// src/zkp/poseidon.rs
//! Poseidon hashing over the Pallas base field.
//!
//! Parameters are generated once with the Grain LFSR procedure and cached
//! for the life of the process.
//!
//! ## Parameters
//! - Full rounds: 8
//! - Partial rounds: 56
//! - Alpha (S-box): 5
//! - Rate: 2
//! - Capacity: 1

use crate::zkp::field::Field;
use ark_crypto_primitives::sponge::poseidon::{
    find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge,
};
use ark_crypto_primitives::sponge::{CryptographicSponge, FieldBasedCryptographicSponge};
use ark_ff::PrimeField;
use once_cell::sync::Lazy;

const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 56;
const ALPHA: u64 = 5;
const RATE: usize = 2;
const CAPACITY: usize = 1;

static POSEIDON_CONFIG: Lazy<PoseidonConfig<Field>> = Lazy::new(generate_poseidon_config);

/// Builds the Poseidon configuration used by every hash in this crate.
pub fn generate_poseidon_config() -> PoseidonConfig<Field> {
    let (ark, mds) = find_poseidon_ark_and_mds::<Field>(
        Field::MODULUS_BIT_SIZE as u64,
        RATE,
        FULL_ROUNDS as u64,
        PARTIAL_ROUNDS as u64,
        0,
    );
    PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
}

/// Hashes an ordered sequence of field elements into one field element.
pub fn hash(fields: &[Field]) -> Field {
    let mut sponge = PoseidonSponge::new(&POSEIDON_CONFIG);
    for field in fields {
        sponge.absorb(field);
    }
    sponge.squeeze_native_field_elements(1)[0]
}
