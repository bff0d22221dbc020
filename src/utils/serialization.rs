// src/utils/serialization.rs
//! JSON helpers for the persisted registry documents.
//!
//! Documents are written pretty-printed with a trailing newline so that the
//! registry directory stays diffable when kept under version control.

use serde::{de::DeserializeOwned, Serialize};

/// Serializes a value to the on-disk document format.
///
/// # Returns
/// - `Ok(Vec<u8>)` with two-space indented JSON and a trailing newline
/// - `Err(serde_json::Error)` if serialization fails
pub fn to_document<T: Serialize>(data: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(data)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserializes a document read from disk.
pub fn from_document<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}
