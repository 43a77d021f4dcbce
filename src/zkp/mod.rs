// src/zkp/mod.rs
pub mod field;
pub mod poseidon;
pub mod proof_generation;
pub mod proof_verification;
pub mod signature;
pub mod transform;
