// src/services/api_server.rs
//! API Server for the Badge Registry
//!
//! REST interface over the issuance and verification services, built on Axum.
//!
//! Endpoints:
//! - `POST /issue`: issue a new badge
//! - `GET /verify/:id`: fetch a badge exactly as stored
//! - `GET /verify/:id/signature`: fetch the server's signature check for a badge
//!
//! Every failure is answered with `{"ok": false, "error": "<kind>"}`.

use crate::error::BadgeError;
use crate::models::badge::Badge;
use crate::services::issuer::{IssuanceService, IssueRequest};
use crate::services::verifier::VerificationService;
use crate::utils::crypto::SignatureStatus;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task;

// API response structures

/// Successful response for issuance and lookup
#[derive(Serialize)]
struct BadgeResponse {
    ok: bool,
    badge: Badge,
}

/// Successful response for a signature check
#[derive(Serialize)]
struct SignatureResponse {
    ok: bool,
    id: String,
    status: SignatureStatus,
}

/// API server state containing all service dependencies
pub struct ApiServer {
    /// Service for issuing badges
    issuer: Arc<IssuanceService>,

    /// Service for resolving badges
    verifier: Arc<VerificationService>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `issuer` - Service for badge issuance
    /// * `verifier` - Service for badge lookups and signature checks
    pub fn new(issuer: IssuanceService, verifier: VerificationService) -> Self {
        ApiServer {
            issuer: Arc::new(issuer),
            verifier: Arc::new(verifier),
        }
    }

    /// Builds the router with all routes and shared state attached.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/issue", post(Self::issue_handler))
            .route("/verify/:id", get(Self::verify_handler))
            .route("/verify/:id/signature", get(Self::signature_handler))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and serves requests until the process exits
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    ///
    /// # Errors
    /// Returns the io error if the address cannot be bound.
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Badge API on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }

    /// Issues a new badge
    ///
    /// # Endpoint
    /// POST /issue
    ///
    /// # Request Body
    /// `{name, recipientName, recipientEmail?, image, skills: [string], description?}`
    ///
    /// # Responses
    /// - 200 OK: `{ok: true, badge}`
    /// - 400 Bad Request: `missing_fields`, also for unparseable bodies
    /// - 500 Internal Server Error: `storage_unavailable`
    async fn issue_handler(
        State(state): State<Arc<ApiServer>>,
        payload: Result<Json<IssueRequest>, JsonRejection>,
    ) -> Result<Json<BadgeResponse>, BadgeError> {
        let Json(request) = payload.map_err(|rejection| {
            log::debug!("rejected issuance body: {}", rejection);
            BadgeError::MissingFields
        })?;

        let issuer = Arc::clone(&state.issuer);
        let badge = task::spawn_blocking(move || issuer.issue(request))
            .await
            .map_err(|e| BadgeError::StorageUnavailable(format!("issuance task failed: {}", e)))??;

        Ok(Json(BadgeResponse { ok: true, badge }))
    }

    /// Resolves a badge by id
    ///
    /// # Endpoint
    /// GET /verify/:id
    ///
    /// # Responses
    /// - 200 OK: `{ok: true, badge}` with the record exactly as issued
    /// - 404 Not Found: `not_found`
    async fn verify_handler(
        State(state): State<Arc<ApiServer>>,
        Path(id): Path<String>,
    ) -> Result<Json<BadgeResponse>, BadgeError> {
        let verifier = Arc::clone(&state.verifier);
        let badge = task::spawn_blocking(move || verifier.verify(&id))
            .await
            .map_err(|e| BadgeError::StorageUnavailable(format!("lookup task failed: {}", e)))??;

        Ok(Json(BadgeResponse { ok: true, badge }))
    }

    /// Recomputes a stored badge's signature on the server
    ///
    /// # Endpoint
    /// GET /verify/:id/signature
    ///
    /// # Responses
    /// - 200 OK: `{ok: true, id, status}` with status `valid`,
    ///   `signature_invalid` or `unsigned`
    /// - 404 Not Found: `not_found`
    async fn signature_handler(
        State(state): State<Arc<ApiServer>>,
        Path(id): Path<String>,
    ) -> Result<Json<SignatureResponse>, BadgeError> {
        let verifier = Arc::clone(&state.verifier);
        let (badge, status) = task::spawn_blocking(move || verifier.verify_with_signature(&id))
            .await
            .map_err(|e| BadgeError::StorageUnavailable(format!("lookup task failed: {}", e)))??;

        Ok(Json(SignatureResponse {
            ok: true,
            id: badge.id,
            status,
        }))
    }
}

// Implement Clone for ApiServer to use with Axum's State
impl Clone for ApiServer {
    fn clone(&self) -> Self {
        ApiServer {
            issuer: Arc::clone(&self.issuer),
            verifier: Arc::clone(&self.verifier),
        }
    }
}
