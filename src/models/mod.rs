// src/models/mod.rs
pub mod badge;
pub mod registry;

pub use badge::{Badge, Issuer, Recipient, Signature};
pub use registry::Registry;
