// src/services/verifier.rs
//! Badge verification service.
//!
//! Resolves badge ids against the registry. Lookups return the stored record
//! untouched, signature block included, so a verifier can recompute the
//! digest independently. Checking the signature is a separate call.

use crate::error::BadgeError;
use crate::models::badge::Badge;
use crate::storage::badge_store::BadgeStore;
use crate::utils::crypto::{SignatureEngine, SignatureStatus};

/// Read-only view over the registry.
#[derive(Debug, Clone)]
pub struct VerificationService {
    store: BadgeStore,
    signer: SignatureEngine,
}

impl VerificationService {
    /// Constructs a new VerificationService.
    ///
    /// # Arguments
    /// * `store` - Registry to resolve ids against
    /// * `signer` - Engine used by [`Self::check_signature`]; in unsigned mode
    ///   every check reports `Unsigned`
    pub fn new(store: BadgeStore, signer: SignatureEngine) -> Self {
        VerificationService { store, signer }
    }

    /// Looks up a badge by id.
    ///
    /// # Returns
    /// - `Ok(badge)` exactly as it was stored at issuance
    /// - `Err(BadgeError::NotFound)` for unknown or malformed ids
    /// - `Err` for storage failures
    pub fn verify(&self, id: &str) -> Result<Badge, BadgeError> {
        self.store.get_by_id(id)?.ok_or(BadgeError::NotFound)
    }

    /// Recomputes the badge's signature with the configured secret.
    pub fn check_signature(&self, badge: &Badge) -> SignatureStatus {
        self.signer.verify(badge)
    }

    /// Lookup followed by a signature check.
    pub fn verify_with_signature(&self, id: &str) -> Result<(Badge, SignatureStatus), BadgeError> {
        let badge = self.verify(id)?;
        let status = self.check_signature(&badge);
        if status == SignatureStatus::Invalid {
            log::warn!("badge {} failed signature check", badge.id);
        }
        Ok((badge, status))
    }
}
