use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::RepositoryError;

/// Error body, `{"detail": "..."}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Underlying message of a 5xx response, attached as a response extension so
/// the usage middleware can record it without leaking it to the client.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

pub const INTERNAL_ERROR_DETAIL: &str = "Internal server error";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
    bearer_challenge: bool,
    cause: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            bearer_challenge: false,
            cause: None,
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    /// 401 without a challenge header.
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    /// 401 carrying `WWW-Authenticate: Bearer`.
    pub fn credentials() -> Self {
        Self {
            bearer_challenge: true,
            ..Self::unauthorized("Could not validate credentials")
        }
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        let cause = cause.to_string();
        tracing::error!("Internal error: {}", cause);
        Self {
            cause: Some(cause),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL)
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(ErrorResponse {
                detail: self.detail.clone(),
            }),
        )
            .into_response();

        if self.bearer_challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        if self.status.is_server_error() {
            response
                .extensions_mut()
                .insert(ErrorDetail(self.cause.unwrap_or(self.detail)));
        }
        response
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            RepositoryError::Conflict(detail) | RepositoryError::InvalidInput(detail) => {
                ApiError::bad_request(detail)
            }
            RepositoryError::DbError(e) => ApiError::internal(e),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::unprocessable(errors.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
