// src/utils/crypto.rs
//! Badge signature engine.
//!
//! Computes and verifies an HMAC-SHA256 stamp over a badge's critical fields.
//!
//! # Critical string
//! The signed message is the concatenation, in this exact order and joined by
//! [`SEPARATOR`], of:
//!
//! | # | field            | when absent |
//! |---|------------------|-------------|
//! | 1 | `id`             | n/a         |
//! | 2 | `name`           | n/a         |
//! | 3 | `recipient.name` | `""`        |
//! | 4 | `issuedOn`       | n/a         |
//!
//! Description, skills, image, email and issuer are NOT covered. Verifiers
//! holding the secret can recompute the digest from any stored badge without
//! contacting the issuer.
//!
//! # Degraded mode
//! When no secret is configured the engine signs nothing and reports every
//! badge as [`SignatureStatus::Unsigned`]. Badges issued in this mode carry no
//! `signature` block and are authentic only to the extent the registry itself
//! is trusted.

use crate::models::badge::{Badge, Signature};
use ring::hmac;
use serde::Serialize;

/// Algorithm identifier written into `signature.alg`.
pub const SIGNATURE_ALG: &str = "HS256";

/// Separator between critical fields.
pub const SEPARATOR: &str = "|";

/// Covered fields, in signing order.
pub const CRITICAL_FIELDS: [&str; 4] = ["id", "name", "recipient.name", "issuedOn"];

/// Outcome of recomputing a badge's signature.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Stored digest matches the recomputed one.
    #[serde(rename = "valid")]
    Valid,

    /// Digest mismatch, malformed or missing signature while a secret is configured.
    #[serde(rename = "signature_invalid")]
    Invalid,

    /// No secret configured, nothing can be checked.
    #[serde(rename = "unsigned")]
    Unsigned,
}

impl SignatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureStatus::Valid => "valid",
            SignatureStatus::Invalid => "signature_invalid",
            SignatureStatus::Unsigned => "unsigned",
        }
    }
}

/// Value of one entry of [`CRITICAL_FIELDS`], by its wire path.
fn critical_field<'a>(badge: &'a Badge, path: &str) -> &'a str {
    match path {
        "id" => &badge.id,
        "name" => &badge.name,
        "recipient.name" => &badge.recipient.name,
        "issuedOn" => &badge.issued_on,
        _ => "",
    }
}

/// Builds the canonical message covered by the signature: the
/// [`CRITICAL_FIELDS`] in order, joined by [`SEPARATOR`].
pub fn critical_string(badge: &Badge) -> String {
    CRITICAL_FIELDS
        .iter()
        .map(|path| critical_field(badge, path))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Keyed signer/verifier for badges.
///
/// Cheap to clone; the HMAC key is shared by value and holds no I/O handles.
#[derive(Clone)]
pub struct SignatureEngine {
    key: Option<hmac::Key>,
}

impl SignatureEngine {
    /// Creates an engine. `None` or an empty secret selects the degraded
    /// unsigned mode.
    pub fn new(secret: Option<&str>) -> Self {
        let key = secret
            .filter(|s| !s.is_empty())
            .map(|s| hmac::Key::new(hmac::HMAC_SHA256, s.as_bytes()));
        SignatureEngine { key }
    }

    /// Engine with no secret.
    pub fn unsigned() -> Self {
        SignatureEngine { key: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Hex digest of the critical string, or `None` in degraded mode.
    pub fn digest(&self, badge: &Badge) -> Option<String> {
        self.key.as_ref().map(|key| {
            let tag = hmac::sign(key, critical_string(badge).as_bytes());
            hex::encode(tag.as_ref())
        })
    }

    /// Attaches a signature block to the badge.
    ///
    /// In degraded mode the badge is returned unchanged and unsigned.
    pub fn sign(&self, mut badge: Badge) -> Badge {
        if let Some(value) = self.digest(&badge) {
            badge.signature = Some(Signature {
                alg: SIGNATURE_ALG.to_string(),
                value,
            });
        }
        badge
    }

    /// Recomputes the digest and compares it to the stored one in constant time.
    pub fn verify(&self, badge: &Badge) -> SignatureStatus {
        let key = match &self.key {
            Some(key) => key,
            None => return SignatureStatus::Unsigned,
        };
        let signature = match &badge.signature {
            Some(sig) if sig.alg == SIGNATURE_ALG => sig,
            _ => return SignatureStatus::Invalid,
        };
        let stored = match hex::decode(&signature.value) {
            Ok(bytes) => bytes,
            Err(_) => return SignatureStatus::Invalid,
        };

        match hmac::verify(key, critical_string(badge).as_bytes(), &stored) {
            Ok(()) => SignatureStatus::Valid,
            Err(_) => SignatureStatus::Invalid,
        }
    }
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::badge::{Issuer, Recipient};
    use proptest::prelude::*;

    const SECRET: &str = "correct-horse-battery-staple";

    fn badge(id: &str, name: &str, recipient: &str, issued_on: &str) -> Badge {
        Badge {
            id: id.to_string(),
            name: name.to_string(),
            description: "Completed the course".to_string(),
            recipient: Recipient::new(recipient, Some("ada@example.org".into())),
            issuer: Issuer::new("BugBox", "https://bugbox.example"),
            issued_on: issued_on.to_string(),
            skills: vec!["Figma".to_string()],
            image: "assets/badges/sample.png".to_string(),
            verify_url: format!("#id={}", id),
            signature: None,
        }
    }

    fn sample() -> Badge {
        badge(
            "3f1c6a52-5a43-4d8b-9b53-2a0c2c3c1d11",
            "Figma Fundamentals",
            "Ada Lovelace",
            "2025-03-14T09:26:53.589Z",
        )
    }

    #[test]
    fn test_critical_string_layout() {
        assert_eq!(
            critical_string(&sample()),
            "3f1c6a52-5a43-4d8b-9b53-2a0c2c3c1d11|Figma Fundamentals|Ada Lovelace|2025-03-14T09:26:53.589Z"
        );
    }

    #[test]
    fn test_critical_fields_name_the_signed_values() {
        // Each covered field holds its own wire path, so the message spells
        // out the constant.
        let named = badge("id", "name", "recipient.name", "issuedOn");
        assert_eq!(critical_string(&named), CRITICAL_FIELDS.join(SEPARATOR));
    }

    #[test]
    fn test_known_digest() {
        // HMAC-SHA256(key="key", msg="a|b|c|d")
        let engine = SignatureEngine::new(Some("key"));
        let signed = engine.sign(badge("a", "b", "c", "d"));
        let sig = signed.signature.unwrap();
        assert_eq!(sig.alg, "HS256");
        assert_eq!(
            sig.value,
            "ea39911e9e7c726d84c0485b7cf6e1d007c039ea16439e0d7257aa2408e2b3e2"
        );
    }

    #[test]
    fn test_degraded_mode_leaves_badge_unsigned() {
        let engine = SignatureEngine::new(None);
        let signed = engine.sign(sample());
        assert!(signed.signature.is_none());
        assert_eq!(engine.verify(&signed), SignatureStatus::Unsigned);

        let empty = SignatureEngine::new(Some(""));
        assert!(!empty.is_enabled());
    }

    #[test]
    fn test_sign_then_verify() {
        let engine = SignatureEngine::new(Some(SECRET));
        let signed = engine.sign(sample());
        assert_eq!(engine.verify(&signed), SignatureStatus::Valid);
    }

    #[test]
    fn test_missing_signature_is_invalid_when_secret_configured() {
        let engine = SignatureEngine::new(Some(SECRET));
        assert_eq!(engine.verify(&sample()), SignatureStatus::Invalid);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let signed = SignatureEngine::new(Some(SECRET)).sign(sample());
        let other = SignatureEngine::new(Some("another-secret-entirely"));
        assert_eq!(other.verify(&signed), SignatureStatus::Invalid);
    }

    #[test]
    fn test_malformed_signature_is_invalid() {
        let engine = SignatureEngine::new(Some(SECRET));
        let mut signed = engine.sign(sample());
        signed.signature.as_mut().unwrap().value = "not-hex".to_string();
        assert_eq!(engine.verify(&signed), SignatureStatus::Invalid);

        let mut signed = engine.sign(sample());
        signed.signature.as_mut().unwrap().alg = "none".to_string();
        assert_eq!(engine.verify(&signed), SignatureStatus::Invalid);
    }

    #[test]
    fn test_uncovered_fields_do_not_affect_signature() {
        let engine = SignatureEngine::new(Some(SECRET));
        let mut signed = engine.sign(sample());
        signed.description = "rewritten".to_string();
        signed.skills.push("Forgery".to_string());
        signed.image = "elsewhere.png".to_string();
        signed.recipient.email = None;
        assert_eq!(engine.verify(&signed), SignatureStatus::Valid);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(SignatureStatus::Invalid).unwrap(),
            serde_json::json!("signature_invalid")
        );
        assert_eq!(SignatureStatus::Valid.as_str(), "valid");
    }

    proptest! {
        #[test]
        fn test_tampering_any_critical_field_is_detected(
            name in "[A-Za-z ]{1,24}",
            recipient in "[A-Za-z ]{1,24}",
            suffix in "[a-z0-9]{1,8}",
            field in 0usize..4,
        ) {
            let engine = SignatureEngine::new(Some(SECRET));
            let original = engine.sign(badge(
                "0b6d8f0e-1c3a-4b7e-9d2f-5a6b7c8d9e0f",
                &name,
                &recipient,
                "2025-03-14T09:26:53.589Z",
            ));
            prop_assert_eq!(engine.verify(&original), SignatureStatus::Valid);

            let mut tampered = original.clone();
            match field {
                0 => tampered.id.push_str(&suffix),
                1 => tampered.name.push_str(&suffix),
                2 => tampered.recipient.name.push_str(&suffix),
                _ => tampered.issued_on.push_str(&suffix),
            }
            prop_assert_eq!(engine.verify(&tampered), SignatureStatus::Invalid);
            prop_assert_ne!(engine.digest(&tampered), engine.digest(&original));
        }
    }
}
