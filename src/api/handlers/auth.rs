use axum::{extract::State, http::StatusCode, Json};

use crate::api::dto::{
    LoginRequest, RefreshRequest, RegisterRequest, TokenResponse, UpdateUserRequest, UserResponse,
};
use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::extract::ValidJson;
use crate::api::routes::AppState;
use crate::auth::{hash_password, verify_password, CurrentUser, TokenPair, TokenType};
use crate::models::internal::UserChanges;
use crate::storage::repository::RepositoryError;

fn token_response(pair: TokenPair) -> TokenResponse {
    TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer".to_string(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    if state.repo.find_user_by_email(&req.email).await?.is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }

    let hashed = hash_password(&req.password).map_err(ApiError::internal)?;
    let user = state
        .repo
        .create_user(&req.email, &hashed, req.full_name, false)
        .await?;

    tracing::info!("New user registered: {}", user.email);
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenResponse),
        (status = 401, description = "Incorrect email or password", body = ErrorResponse),
        (status = 403, description = "Inactive user", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .repo
        .find_user_by_email(&req.email)
        .await?
        .filter(|user| verify_password(&req.password, &user.hashed_password))
        .ok_or_else(|| ApiError::unauthorized("Incorrect email or password"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("Inactive user"));
    }

    let pair = state.tokens.create_pair(user.id).map_err(ApiError::internal)?;
    tracing::info!("User logged in: {}", user.email);
    Ok(Json(token_response(pair)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = state
        .tokens
        .decode_token(&req.refresh_token, TokenType::Refresh)
        .map_err(|_| ApiError::credentials())?;

    let user = state
        .repo
        .find_user_by_id(claims.sub)
        .await?
        .ok_or_else(ApiError::credentials)?;
    if !user.is_active {
        return Err(ApiError::forbidden("Inactive user"));
    }

    let pair = state.tokens.create_pair(user.id).map_err(ApiError::internal)?;
    Ok(Json(token_response(pair)))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "authentication",
    responses((status = 200, description = "Current user", body = UserResponse))
)]
pub async fn me(user: CurrentUser) -> Json<UserResponse> {
    Json(user.user.into())
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/me",
    tag = "authentication",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    if let Some(email) = &req.email {
        if let Some(existing) = state.repo.find_user_by_email(email).await? {
            if existing.id != user.id() {
                return Err(ApiError::bad_request("Email already registered"));
            }
        }
    }

    let hashed_password = match &req.password {
        Some(password) => Some(hash_password(password).map_err(ApiError::internal)?),
        None => None,
    };

    let changes = UserChanges {
        email: req.email,
        full_name: req.full_name,
        hashed_password,
        preferences: req.preferences,
    };
    let updated = state
        .repo
        .update_user(user.id(), changes)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound(_) => ApiError::credentials(),
            other => other.into(),
        })?;

    Ok(Json(updated.into()))
}
