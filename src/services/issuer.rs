// src/services/issuer.rs
//! Badge Issuance Service
//!
//! Turns a validated issuance request into a signed, committed badge.
//! The service assigns `id`, `issuedOn`, `issuer` and `verifyUrl` itself;
//! none of them are accepted from the caller.

use crate::error::BadgeError;
use crate::models::badge::{Badge, Issuer, Recipient};
use crate::storage::badge_store::BadgeStore;
use crate::utils::crypto::SignatureEngine;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Body of `POST /issue`.
///
/// Every field is optional at the type level so that a missing field is
/// reported as `missing_fields` by [`IssueRequest::validate`] rather than as a
/// deserialization failure.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub name: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
    pub image: Option<String>,
    pub skills: Option<Vec<String>>,
    pub description: Option<String>,
}

/// An issuance request whose required fields are known to be present.
#[derive(Debug, Clone)]
struct ValidRequest {
    name: String,
    recipient: Recipient,
    image: String,
    skills: Vec<String>,
    description: String,
}

fn required(field: Option<String>) -> Result<String, BadgeError> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or(BadgeError::MissingFields)
}

impl IssueRequest {
    /// Checks required fields without touching any state.
    ///
    /// # Errors
    /// `MissingFields` if `name`, `recipientName` or `image` is absent or
    /// blank, or if `skills` is absent.
    fn validate(self) -> Result<ValidRequest, BadgeError> {
        let name = required(self.name)?;
        let recipient_name = required(self.recipient_name)?;
        let image = required(self.image)?;
        let skills = self.skills.ok_or(BadgeError::MissingFields)?;

        Ok(ValidRequest {
            name,
            recipient: Recipient::new(recipient_name, self.recipient_email),
            image,
            skills,
            description: self.description.unwrap_or_default(),
        })
    }
}

/// Operator changes to the registry's issuer metadata.
///
/// Fields left as `None` keep whatever the registry holds at commit time, so
/// the override is merged under the writer lock rather than read beforehand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerOverride {
    pub name: Option<String>,
    pub website: Option<String>,
}

impl IssuerOverride {
    /// Writes the set fields into `issuer`; extra keys are untouched.
    fn apply(self, issuer: &mut Issuer) {
        if let Some(name) = self.name {
            issuer.name = name;
        }
        if let Some(website) = self.website {
            issuer.website = website;
        }
    }
}

/// Issues badges into a [`BadgeStore`].
///
/// Holds no mutable state of its own; clones share the store's writer gate.
#[derive(Debug, Clone)]
pub struct IssuanceService {
    store: BadgeStore,
    signer: SignatureEngine,
    site_base: String,
}

impl IssuanceService {
    /// Creates a new issuance service.
    ///
    /// # Arguments
    /// * `store` - Registry the badges are committed to
    /// * `signer` - Signature engine (possibly in unsigned mode)
    /// * `site_base` - Prefix for verify links, without trailing slash
    pub fn new(store: BadgeStore, signer: SignatureEngine, site_base: impl Into<String>) -> Self {
        IssuanceService {
            store,
            signer,
            site_base: site_base.into(),
        }
    }

    pub fn store(&self) -> &BadgeStore {
        &self.store
    }

    /// Verify link for a badge id.
    pub fn verify_url(&self, id: &str) -> String {
        format!("{}#id={}", self.site_base, id)
    }

    /// Issues a badge using the registry's current issuer metadata.
    ///
    /// Not idempotent: identical requests produce distinct badges.
    pub fn issue(&self, request: IssueRequest) -> Result<Badge, BadgeError> {
        self.issue_with_issuer(request, IssuerOverride::default())
    }

    /// Issues a badge, first merging `issuer_override` into the registry's
    /// issuer metadata. Only operator tooling passes a non-empty override.
    ///
    /// # Process Flow
    /// 1. Validates the request (no side effects on failure)
    /// 2. Inside one registry commit: merges the issuer override, mints an
    ///    id, stamps the time, copies the issuer, signs, appends
    /// 3. Writes the standalone snapshot
    ///
    /// # Errors
    /// - `MissingFields` for invalid input, with the registry untouched
    /// - `StorageUnavailable`/`Io` if either write fails
    pub fn issue_with_issuer(
        &self,
        request: IssueRequest,
        issuer_override: IssuerOverride,
    ) -> Result<Badge, BadgeError> {
        let request = request.validate()?;

        let (_, badge) = self.store.commit(|registry| {
            issuer_override.apply(&mut registry.issuer);

            let id = loop {
                let candidate = Uuid::new_v4().to_string();
                if registry.find(&candidate).is_none() {
                    break candidate;
                }
            };

            let badge = self.signer.sign(Badge {
                verify_url: self.verify_url(&id),
                id,
                name: request.name,
                description: request.description,
                recipient: request.recipient,
                issuer: registry.issuer.clone(),
                issued_on: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                skills: request.skills,
                image: request.image,
                signature: None,
            });

            registry.badges.push(badge.clone());
            Ok(badge)
        })?;

        if let Err(e) = self.store.put_snapshot(&badge) {
            log::error!("badge {} committed but snapshot write failed: {}", badge.id, e);
            return Err(e);
        }

        log::info!(
            "issued badge {} ({})",
            badge.id,
            if badge.signature.is_some() { "signed" } else { "unsigned" }
        );
        Ok(badge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::{critical_string, SignatureStatus};
    use serde_json::json;
    use std::collections::HashSet;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "a-sufficiently-long-secret";

    fn service(dir: &TempDir, secret: Option<&str>) -> IssuanceService {
        let store = BadgeStore::open(dir.path(), Issuer::new("BugBox", "")).unwrap();
        IssuanceService::new(store, SignatureEngine::new(secret), "")
    }

    fn request() -> IssueRequest {
        IssueRequest {
            name: Some("Figma Fundamentals".into()),
            recipient_name: Some("Ada Lovelace".into()),
            recipient_email: Some("ada@example.org".into()),
            image: Some("assets/badges/sample.png".into()),
            skills: Some(vec!["Figma".into(), "Colour theory".into()]),
            description: None,
        }
    }

    #[test]
    fn test_issue_populates_server_fields() {
        let dir = TempDir::new().unwrap();
        let badge = assert_ok!(service(&dir, Some(SECRET)).issue(request()));

        assert!(Uuid::parse_str(&badge.id).is_ok());
        assert_eq!(badge.verify_url, format!("#id={}", badge.id));
        assert_eq!(badge.issuer.name, "BugBox");
        assert_eq!(badge.description, "");
        assert_eq!(badge.skills, vec!["Figma", "Colour theory"]);
        assert!(badge.issued_on.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&badge.issued_on).is_ok());
    }

    #[test]
    fn test_signed_badge_verifies() {
        let dir = TempDir::new().unwrap();
        let badge = service(&dir, Some(SECRET)).issue(request()).unwrap();
        let engine = SignatureEngine::new(Some(SECRET));

        let sig = badge.signature.clone().unwrap();
        assert_eq!(sig.alg, "HS256");
        assert_eq!(Some(sig.value), engine.digest(&badge));
        assert_eq!(engine.verify(&badge), SignatureStatus::Valid);
        assert!(critical_string(&badge).starts_with(&badge.id));
    }

    #[test]
    fn test_unsigned_mode_issues_without_signature() {
        let dir = TempDir::new().unwrap();
        let badge = service(&dir, None).issue(request()).unwrap();
        assert!(badge.signature.is_none());
    }

    #[test]
    fn test_missing_fields_leave_registry_untouched() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Some(SECRET));

        let cases = vec![
            IssueRequest { skills: None, ..request() },
            IssueRequest { recipient_name: Some(String::new()), ..request() },
            IssueRequest { image: Some("  ".into()), ..request() },
            IssueRequest { name: None, ..request() },
            IssueRequest::default(),
        ];
        for case in cases {
            let err = assert_err!(svc.issue(case));
            assert!(matches!(err, BadgeError::MissingFields));
        }

        assert!(!svc.store().registry_path().exists());
        assert!(svc.store().load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_skills_are_accepted() {
        let dir = TempDir::new().unwrap();
        let badge = service(&dir, None)
            .issue(IssueRequest { skills: Some(vec![]), ..request() })
            .unwrap();
        assert!(badge.skills.is_empty());
    }

    #[test]
    fn test_repeated_requests_yield_unique_ids() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Some(SECRET));

        let ids: HashSet<String> = (0..25).map(|_| svc.issue(request()).unwrap().id).collect();
        assert_eq!(ids.len(), 25);
        assert_eq!(svc.store().load().unwrap().len(), 25);
    }

    #[test]
    fn test_snapshot_matches_aggregate_entry() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Some(SECRET));
        let badge = svc.issue(request()).unwrap();

        assert!(svc.store().snapshot_path(&badge.id).exists());
        let registry = svc.store().load().unwrap();
        assert_eq!(registry.find(&badge.id), Some(&badge));
        assert_eq!(svc.store().get_by_id(&badge.id).unwrap(), Some(badge));
    }

    #[test]
    fn test_issuer_is_copied_by_value() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, None);
        let first = svc.issue(request()).unwrap();

        let renamed = IssuerOverride {
            name: Some("BugBox Academy".into()),
            website: Some("https://academy.example".into()),
        };
        let second = svc.issue_with_issuer(request(), renamed).unwrap();

        let expected = Issuer::new("BugBox Academy", "https://academy.example");
        assert_eq!(second.issuer, expected);
        assert_eq!(svc.store().load().unwrap().issuer, expected);
        let stored_first = svc.store().get_by_id(&first.id).unwrap().unwrap();
        assert_eq!(stored_first.issuer.name, "BugBox");
    }

    #[test]
    fn test_issuer_override_merges_with_committed_issuer() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, None);

        // Another writer changes the issuer after this service was built.
        let other = BadgeStore::open(dir.path(), Issuer::new("BugBox", "")).unwrap();
        other
            .commit(|reg| {
                reg.issuer.website = "https://bugbox.example".into();
                reg.issuer.extra.insert("logo".into(), json!("assets/logo.png"));
                Ok(())
            })
            .unwrap();

        let only_name = IssuerOverride { name: Some("BugBox Academy".into()), website: None };
        let badge = svc.issue_with_issuer(request(), only_name).unwrap();

        assert_eq!(badge.issuer.name, "BugBox Academy");
        assert_eq!(badge.issuer.website, "https://bugbox.example");
        assert_eq!(badge.issuer.extra.get("logo"), Some(&json!("assets/logo.png")));
        assert_eq!(svc.store().load().unwrap().issuer, badge.issuer);
    }

    #[test]
    fn test_issue_into_registry_with_bare_issuer_blocks() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Some(SECRET));
        let existing = Uuid::new_v4().to_string();
        let legacy = json!({
            "badges": [{
                "id": existing,
                "name": "Colour Theory",
                "description": "",
                "recipient": {"name": "Grace Hopper"},
                "issuer": {},
                "issuedOn": "2024-11-02T10:00:00.000Z",
                "skills": ["Colour"],
                "image": "assets/badges/colour.png",
                "verifyUrl": format!("#id={}", existing)
            }]
        });
        std::fs::write(svc.store().registry_path(), legacy.to_string()).unwrap();
        assert_eq!(assert_ok!(svc.store().load()).len(), 1);

        let badge = assert_ok!(svc.issue(request()));

        let registry = svc.store().load().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.issuer.name, "BugBox");
        assert!(registry.find(&badge.id).is_some());
        let old = assert_ok!(svc.store().get_by_id(&existing)).unwrap();
        assert_eq!(old.name, "Colour Theory");
        assert_eq!(old.issuer.name, "");
    }

    #[test]
    fn test_site_base_prefixes_verify_url() {
        let dir = TempDir::new().unwrap();
        let store = BadgeStore::open(dir.path(), Issuer::new("BugBox", "")).unwrap();
        let svc = IssuanceService::new(store, SignatureEngine::unsigned(), "https://badges.example/site");
        let badge = svc.issue(request()).unwrap();
        assert_eq!(
            badge.verify_url,
            format!("https://badges.example/site#id={}", badge.id)
        );
    }
}
