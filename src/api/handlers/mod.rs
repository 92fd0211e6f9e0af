pub mod admin;
pub mod api_keys;
pub mod auth;
pub mod conversations;
pub mod memory;
pub mod projects;
pub mod queries;

use uuid::Uuid;

use super::error::ApiError;
use super::routes::AppState;
use crate::auth::CurrentUser;
use crate::models::Project;
use crate::storage::repository::RepositoryError;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 500;

/// The caller's project, or 404 "Project not found".
pub(crate) async fn owned_project(
    state: &AppState,
    user: &CurrentUser,
    project_id: Uuid,
) -> Result<Project, ApiError> {
    state
        .repo
        .find_owned_project(project_id, user.id())
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

/// Rewrites a repository `NotFound` into a 404 with a client-facing detail.
pub(crate) fn not_found_as(detail: &'static str) -> impl Fn(RepositoryError) -> ApiError {
    move |err| match err {
        RepositoryError::NotFound(_) => ApiError::not_found(detail),
        other => other.into(),
    }
}

/// Clamps a requested page size to `1..=MAX_PAGE_SIZE`.
pub(crate) fn page_size(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Offsets past `i64::MAX` cannot be bound as a SQL parameter.
pub(crate) fn page_offset(offset: Option<u64>) -> u64 {
    offset.unwrap_or(0).min(i64::MAX as u64)
}
