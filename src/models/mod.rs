// src/models/mod.rs
//! Wire data model shared by the prover, the verifiers and the issuer client.

pub mod credential;
pub mod identifier;
pub mod issuer;
pub mod registry;
pub mod schema;
