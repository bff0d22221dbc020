// src/error.rs
//! Error taxonomy for issuance, verification and storage.
//!
//! Every failure that reaches an HTTP caller is rendered as
//! `{"ok": false, "error": "<kind>"}`. Internal detail (paths, io errors) is
//! logged and never echoed back.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors produced by the badge services and the registry store.
#[derive(Error, Debug)]
pub enum BadgeError {
    /// Issuance request missing a required field or carrying a wrong-shaped one.
    /// Raised before any side effect.
    #[error("missing or malformed required fields")]
    MissingFields,

    /// No badge exists for the requested identifier.
    #[error("badge not found")]
    NotFound,

    /// Another writer holds the registry lock. Retried internally by the
    /// store; only escapes as `StorageUnavailable` once retries run out.
    #[error("registry is locked by another writer")]
    StorageConflict,

    /// The registry could not be read or written.
    #[error("registry storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BadgeError {
    /// Stable machine-readable kind used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            BadgeError::MissingFields => "missing_fields",
            BadgeError::NotFound => "not_found",
            BadgeError::StorageConflict
            | BadgeError::StorageUnavailable(_)
            | BadgeError::Io(_)
            | BadgeError::Serialization(_) => "storage_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BadgeError::MissingFields => StatusCode::BAD_REQUEST,
            BadgeError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BadgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        let body = json!({ "ok": false, "error": self.kind() });
        (status, Json(body)).into_response()
    }
}
