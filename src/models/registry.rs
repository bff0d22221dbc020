// src/models/registry.rs
//! Aggregate registry document: issuer defaults plus every issued badge.

use crate::models::badge::{Badge, Issuer};
use serde::{Deserialize, Serialize};

/// The `registry.json` document.
///
/// Badges are kept in issuance order. Ids are unique by construction since
/// every badge gets a fresh UUID v4.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Registry {
    /// Issuer metadata copied into each newly issued badge
    pub issuer: Issuer,

    #[serde(default)]
    pub badges: Vec<Badge>,
}

impl Registry {
    /// Creates an empty registry for the given issuer.
    pub fn new(issuer: Issuer) -> Self {
        Registry {
            issuer,
            badges: Vec::new(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&Badge> {
        self.badges.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}
