// src/models/badge.rs
//! Badge data model.
//!
//! A badge is the issued credential record. Once committed to the registry it
//! is never rewritten; every later read returns the same bytes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An issued, identifier-addressed, optionally signed credential.
///
/// # Serialization
/// Field names are camelCase on the wire (`issuedOn`, `verifyUrl`) so that the
/// persisted documents stay readable by existing badge viewers.
///
/// # Integrity
/// Only `id`, `name`, `recipient.name` and `issuedOn` are covered by the
/// signature. See [`crate::utils::crypto::CRITICAL_FIELDS`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    /// Random UUID v4, lowercase hyphenated.
    pub id: String,

    /// Credential title
    pub name: String,

    /// Free text, empty when the issuer supplied none
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub recipient: Recipient,

    /// Issuer metadata copied by value at issuance time. Older registries
    /// may hold `{}` here.
    #[serde(default)]
    pub issuer: Issuer,

    /// Server-assigned RFC 3339 UTC timestamp
    /// Example: "2025-03-14T09:26:53.589Z"
    pub issued_on: String,

    /// Display order is significant, duplicates are allowed
    #[serde(default)]
    pub skills: Vec<String>,

    /// Artwork reference (relative path or URL), never dereferenced
    pub image: String,

    /// Deep link of the form `<site_base>#id=<id>`
    pub verify_url: String,

    /// Present only when a signing secret was configured at issuance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

/// The person a badge was issued to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Recipient {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Recipient {
    /// Builds a recipient, dropping an empty email address.
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Recipient {
            name: name.into(),
            email: email.filter(|e| !e.trim().is_empty()),
        }
    }
}

/// Issuer metadata.
///
/// Unknown keys are kept in `extra` so that whatever an operator put into the
/// registry's issuer block is carried into every badge unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Issuer {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub website: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Issuer {
    pub fn new(name: impl Into<String>, website: impl Into<String>) -> Self {
        Issuer {
            name: name.into(),
            website: website.into(),
            extra: Map::new(),
        }
    }
}

/// Keyed integrity stamp attached to a badge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Algorithm identifier, always "HS256" for badges issued by this crate
    pub alg: String,

    /// Lowercase hex digest
    pub value: String,
}
