// src/lib.rs

//! # Badge Registry
//!
//! Issues tamper-evident digital badges and lets third parties verify them by
//! id without contacting the issuer again.
//!
//! ## Architecture Overview
//! 1. **Signature Engine** ([`utils::crypto`]): HMAC-SHA256 over a badge's critical fields
//! 2. **Badge Registry** ([`storage`]): atomic, single-writer JSON document store
//! 3. **Issuance / Verification** ([`services`]): business logic
//! 4. **HTTP transport** ([`services::api_server`]): Axum endpoints
//!
//! Configuration lives in [`settings`], the error taxonomy in [`error`].

pub mod error;
pub mod models;      // Data structures
pub mod services;    // Business logic and API
pub mod settings;    // Environment configuration
pub mod storage;     // Registry persistence
pub mod utils;       // Signing and serialization helpers

pub use error::BadgeError;
pub use models::{Badge, Issuer, Recipient, Registry, Signature};
pub use services::api_server::ApiServer;
pub use services::issuer::{IssuanceService, IssueRequest, IssuerOverride};
pub use services::verifier::VerificationService;
pub use settings::AppConfig;
pub use storage::BadgeStore;
pub use utils::crypto::{SignatureEngine, SignatureStatus};

/// Builds the issuance and verification services from configuration.
///
/// Both services share one store so their commits go through the same
/// in-process writer gate.
pub fn build_services(config: &AppConfig) -> Result<(IssuanceService, VerificationService), BadgeError> {
    let store = BadgeStore::open(&config.registry_dir, config.default_issuer())?;
    let signer = SignatureEngine::new(config.signing_secret());
    if !signer.is_enabled() {
        log::warn!("BADGE_HMAC_SECRET not set; badges will be issued unsigned");
    }

    let issuer = IssuanceService::new(store.clone(), signer.clone(), config.site_base());
    let verifier = VerificationService::new(store, signer);
    Ok((issuer, verifier))
}
