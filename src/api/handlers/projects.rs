use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::owned_project;
use crate::api::dto::{
    BigQueryCredentialsRequest, ConnectResponse, CreateProjectRequest, ProjectResponse,
    RefreshSchemaResponse, UpdateProjectRequest, ValidateSqlRequest,
};
use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::extract::ValidJson;
use crate::api::routes::AppState;
use crate::api::usage::UsageContext;
use crate::auth::CurrentUser;
use crate::models::internal::{DryRunResult, NewProject, ProjectChanges};
use crate::services::{BigQueryClient, BigQueryError};

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses((status = 201, description = "Project created", body = ProjectResponse))
)]
pub async fn create_project(
    State(state): State<AppState>,
    user: CurrentUser,
    usage: UsageContext,
    ValidJson(req): ValidJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    let project = state
        .repo
        .create_project(
            user.id(),
            NewProject {
                name: req.name,
                description: req.description,
                bigquery_project_id: req.bigquery_project_id,
                bigquery_dataset: req.bigquery_dataset,
            },
        )
        .await?;
    usage.set_project(project.id);

    tracing::info!("Project created: {} by user {}", project.name, user.id());
    Ok((StatusCode::CREATED, Json(project.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    responses((status = 200, description = "Projects owned by the caller", body = [ProjectResponse]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = state.repo.list_projects(user.id()).await?;
    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = ProjectResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = owned_project(&state, &user, id).await?;
    Ok(Json(project.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated project", body = ProjectResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    owned_project(&state, &user, id).await?;
    let project = state
        .repo
        .update_project(
            id,
            ProjectChanges {
                name: req.name,
                description: req.description,
                bigquery_project_id: req.bigquery_project_id,
                bigquery_dataset: req.bigquery_dataset,
            },
        )
        .await?;
    Ok(Json(project.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project and its memory, instructions and conversations deleted"),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let project = owned_project(&state, &user, id).await?;
    state.repo.delete_project(project.id).await?;
    tracing::info!("Project deleted: {}", project.id);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/bigquery/connect",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = BigQueryCredentialsRequest,
    responses(
        (status = 200, description = "Credentials verified and schema cached", body = ConnectResponse),
        (status = 400, description = "Connection failed", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
pub async fn connect_bigquery(
    State(state): State<AppState>,
    user: CurrentUser,
    usage: UsageContext,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<BigQueryCredentialsRequest>,
) -> ApiResult<Json<ConnectResponse>> {
    let project = owned_project(&state, &user, id).await?;
    usage.set_project(project.id);

    let client = BigQueryClient::with_credentials(
        &project,
        &state.config.bigquery_api_url,
        &req.credentials_json,
    )
    .map_err(connection_failed)?;
    if !client.test_connection().await {
        return Err(connection_failed("Connection test failed"));
    }
    let schema = client.get_schema().await.map_err(connection_failed)?;

    state
        .repo
        .save_connection(project.id, &req.credentials_json, &schema)
        .await?;

    tracing::info!(
        "BigQuery connected for project {} ({} tables)",
        project.id,
        schema.len()
    );
    Ok(Json(ConnectResponse {
        status: "connected".to_string(),
        tables_found: schema.len(),
        message: "BigQuery connection successful".to_string(),
    }))
}

fn connection_failed(reason: impl std::fmt::Display) -> ApiError {
    tracing::warn!("BigQuery connection failed: {}", reason);
    ApiError::bad_request(format!("Connection failed: {}", reason))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/bigquery/schema",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Cached dataset schema keyed by table"),
        (status = 404, description = "Schema not available", body = ErrorResponse)
    )
)]
pub async fn get_schema(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let project = owned_project(&state, &user, id).await?;
    let empty = project
        .schema_cache
        .as_object()
        .map_or(true, |tables| tables.is_empty());
    if empty {
        return Err(ApiError::not_found(
            "Schema not available. Please connect to BigQuery first.",
        ));
    }
    Ok(Json(project.schema_cache))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/bigquery/refresh",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Schema re-extracted", body = RefreshSchemaResponse),
        (status = 400, description = "Schema refresh failed", body = ErrorResponse)
    )
)]
pub async fn refresh_schema(
    State(state): State<AppState>,
    user: CurrentUser,
    usage: UsageContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RefreshSchemaResponse>> {
    let project = owned_project(&state, &user, id).await?;
    usage.set_project(project.id);

    let refresh_failed =
        |e: BigQueryError| ApiError::bad_request(format!("Schema refresh failed: {}", e));
    let client = BigQueryClient::for_project(&project, &state.config.bigquery_api_url)
        .map_err(refresh_failed)?;
    let schema = client.get_schema().await.map_err(refresh_failed)?;
    let updated = state.repo.save_schema(project.id, &schema).await?;

    Ok(Json(RefreshSchemaResponse {
        status: "refreshed".to_string(),
        tables_found: schema.len(),
        updated_at: updated.schema_last_updated,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/bigquery/validate",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ValidateSqlRequest,
    responses(
        (status = 200, description = "Dry run result", body = DryRunResult),
        (status = 400, description = "BigQuery not configured", body = ErrorResponse)
    )
)]
pub async fn validate_sql(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<ValidateSqlRequest>,
) -> ApiResult<Json<DryRunResult>> {
    let project = owned_project(&state, &user, id).await?;
    let client = BigQueryClient::for_project(&project, &state.config.bigquery_api_url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(client.validate_sql(&req.sql).await))
}
