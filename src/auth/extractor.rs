use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use uuid::Uuid;

use super::security::{api_key_prefix, hash_api_key, TokenType};
use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::api::usage::{Identity, UsageContext};
use crate::models::internal::AuthType;
use crate::models::User;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated caller.
///
/// An `X-API-Key` header is tried first; a key that does not match falls
/// through to the `Authorization: Bearer` access token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub auth_type: AuthType,
    pub api_key_id: Option<Uuid>,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let mut current = None;
        if let Some(key) = api_key {
            current = authenticate_api_key(state, &key).await?;
        }
        if current.is_none() {
            let bearer = parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string());
            if let Some(token) = bearer {
                current = Some(authenticate_bearer(state, &token).await?);
            }
        }

        let current = current.ok_or_else(ApiError::credentials)?;

        if let Some(usage) = parts.extensions.get::<UsageContext>() {
            usage.set_identity(Identity {
                user_id: current.user.id,
                auth_type: current.auth_type,
                api_key_id: current.api_key_id,
            });
        }
        Ok(current)
    }
}

async fn authenticate_api_key(
    state: &AppState,
    key: &str,
) -> Result<Option<CurrentUser>, ApiError> {
    let digest = hash_api_key(key);
    let candidates = state
        .repo
        .find_api_keys_by_prefix(&api_key_prefix(key))
        .await?;
    let Some(record) = candidates.into_iter().find(|k| k.key_hash == digest) else {
        return Ok(None);
    };

    if !record.is_active {
        return Err(ApiError::unauthorized("API key is inactive"));
    }
    let now = Utc::now();
    if record.expires_at.is_some_and(|expires| expires <= now) {
        return Err(ApiError::unauthorized("API key has expired"));
    }

    let Some(user) = state.repo.find_user_by_id(record.user_id).await? else {
        return Ok(None);
    };
    if !user.is_active {
        return Err(ApiError::forbidden("Inactive user"));
    }

    if let Err(e) = state.repo.touch_api_key(record.id, now).await {
        tracing::warn!("Failed to update last_used_at for API key {}: {}", record.id, e);
    }

    Ok(Some(CurrentUser {
        user,
        auth_type: AuthType::ApiKey,
        api_key_id: Some(record.id),
    }))
}

async fn authenticate_bearer(state: &AppState, token: &str) -> Result<CurrentUser, ApiError> {
    let claims = state
        .tokens
        .decode_token(token, TokenType::Access)
        .map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            ApiError::credentials()
        })?;

    let user = state
        .repo
        .find_user_by_id(claims.sub)
        .await?
        .ok_or_else(ApiError::credentials)?;

    if !user.is_active {
        return Err(ApiError::forbidden("Inactive user"));
    }

    Ok(CurrentUser {
        user,
        auth_type: AuthType::Jwt,
        api_key_id: None,
    })
}

/// A `CurrentUser` with `is_superuser` set.
#[derive(Debug, Clone)]
pub struct Superuser(pub CurrentUser);

impl FromRequestParts<AppState> for Superuser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_superuser {
            return Err(ApiError::forbidden("Not enough permissions"));
        }
        Ok(Superuser(current))
    }
}
