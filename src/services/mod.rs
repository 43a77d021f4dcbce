// src/services/mod.rs
pub mod cred_holder;
pub mod exceptions;
pub mod http_issuer;
pub mod issuance;
