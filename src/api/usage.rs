//! Per-request usage accounting.
//!
//! `track_usage` wraps every `/api/v1` request. Extractors and handlers fill
//! the shared [`UsageContext`] (who called, what it cost) and the middleware
//! writes one `api_usage` row once the response is ready, plus an
//! `error_logs` row when the response is a 5xx.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use uuid::Uuid;

use super::client::{client_ip, user_agent};
use super::error::ErrorDetail;
use super::routes::AppState;
use crate::models::internal::{AuthType, ErrorLogEntry, Severity, UsageEntry};

#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub auth_type: AuthType,
    pub api_key_id: Option<Uuid>,
}

#[derive(Debug, Default)]
struct Slots {
    identity: OnceLock<Identity>,
    project_id: OnceLock<Uuid>,
    tokens: AtomicI64,
    bytes: AtomicI64,
}

#[derive(Debug, Clone, Default)]
pub struct UsageContext(Arc<Slots>);

impl UsageContext {
    /// First caller wins; later calls are ignored.
    pub fn set_identity(&self, identity: Identity) {
        let _ = self.0.identity.set(identity);
    }

    pub fn identity(&self) -> Option<Identity> {
        self.0.identity.get().copied()
    }

    pub fn set_project(&self, project_id: Uuid) {
        let _ = self.0.project_id.set(project_id);
    }

    pub fn project(&self) -> Option<Uuid> {
        self.0.project_id.get().copied()
    }

    pub fn add_tokens(&self, tokens: i64) {
        self.0.tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, bytes: i64) {
        self.0.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn tokens(&self) -> i64 {
        self.0.tokens.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> i64 {
        self.0.bytes.load(Ordering::Relaxed)
    }
}

/// Yields the context installed by [`track_usage`], or a detached one when
/// the route is not tracked.
impl<S> FromRequestParts<S> for UsageContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<UsageContext>()
            .cloned()
            .unwrap_or_default())
    }
}

pub async fn track_usage(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let usage = UsageContext::default();
    request.extensions_mut().insert(usage.clone());

    let method = request.method().to_string();
    // Nesting strips `/api/v1` from `uri()`; record the path the client sent.
    let endpoint = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let ip_address = client_ip(request.headers(), request.extensions()).map(|ip| ip.to_string());
    let agent = user_agent(request.headers());

    let response = next.run(request).await;

    let status = response.status();
    let identity = usage.identity();
    let entry = UsageEntry {
        user_id: identity.map(|i| i.user_id),
        endpoint: endpoint.clone(),
        method: method.clone(),
        status_code: i32::from(status.as_u16()),
        response_time_ms: i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX),
        tokens_used: i32::try_from(usage.tokens()).unwrap_or(i32::MAX),
        bigquery_bytes: usage.bytes(),
        auth_type: identity.map(|i| i.auth_type),
        api_key_id: identity.and_then(|i| i.api_key_id),
        ip_address,
        user_agent: agent,
    };
    if let Err(e) = state.repo.insert_usage(entry).await {
        tracing::warn!("Failed to record API usage for {} {}: {}", method, endpoint, e);
    }

    if status.is_server_error() {
        let message = response
            .extensions()
            .get::<ErrorDetail>()
            .map(|d| d.0.clone())
            .unwrap_or_else(|| status.to_string());
        let error = ErrorLogEntry {
            user_id: identity.map(|i| i.user_id),
            project_id: usage.project(),
            error_type: "InternalServerError".to_string(),
            error_message: message,
            endpoint: Some(format!("{} {}", method, endpoint)),
            request_payload: None,
            severity: Severity::Error,
        };
        if let Err(e) = state.repo.insert_error_log(error).await {
            tracing::warn!("Failed to record error log: {}", e);
        }
    }

    response
}
