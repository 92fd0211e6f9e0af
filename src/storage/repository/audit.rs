use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{prelude::*, PaginatorTrait, QueryOrder, QuerySelect, Select, Set};
use uuid::Uuid;

use super::{AuditStore, RepositoryError, SeaOrmRepository};
use crate::models::internal::{ErrorLogEntry, ErrorLogFilter, ExecutionStatus, PlatformStats, UsageEntry};
use crate::models::{ApiUsage, ErrorLog};
use crate::storage::entities::{api_usage, error_logs, projects, query_logs, users};

fn filtered_errors(filter: &ErrorLogFilter) -> Select<error_logs::Entity> {
    let mut query = error_logs::Entity::find();
    if let Some(resolved) = filter.resolved {
        query = query.filter(error_logs::Column::Resolved.eq(resolved));
    }
    if let Some(severity) = &filter.severity {
        query = query.filter(error_logs::Column::Severity.eq(severity.as_str()));
    }
    query
}

/// `CAST(SUM(col) AS BIGINT)` so both backends decode to `i64`.
fn sum_as_bigint(col: query_logs::Column) -> SimpleExpr {
    Func::cast_as(Func::sum(Expr::col(col)), Alias::new("BIGINT")).into()
}

impl SeaOrmRepository {
    async fn sum_query_logs(&self, col: query_logs::Column) -> Result<i64, RepositoryError> {
        let total: Option<Option<i64>> = query_logs::Entity::find()
            .select_only()
            .column_as(sum_as_bigint(col), "total")
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(total.flatten().unwrap_or(0))
    }
}

#[async_trait]
impl AuditStore for SeaOrmRepository {
    async fn insert_usage(&self, entry: UsageEntry) -> Result<(), RepositoryError> {
        let model = api_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            endpoint: Set(entry.endpoint),
            method: Set(entry.method),
            status_code: Set(entry.status_code),
            response_time_ms: Set(entry.response_time_ms),
            tokens_used: Set(entry.tokens_used),
            bigquery_bytes: Set(entry.bigquery_bytes),
            auth_type: Set(entry.auth_type.map(|t| t.as_str().to_string())),
            api_key_id: Set(entry.api_key_id),
            ip_address: Set(entry.ip_address),
            user_agent: Set(entry.user_agent),
            created_at: Set(Utc::now()),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    async fn list_usage(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<ApiUsage>, u64), RepositoryError> {
        let total = api_usage::Entity::find().count(&self.db).await?;
        let records = api_usage::Entity::find()
            .order_by_desc(api_usage::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok((records, total))
    }

    async fn insert_error_log(&self, entry: ErrorLogEntry) -> Result<ErrorLog, RepositoryError> {
        let model = error_logs::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            project_id: Set(entry.project_id),
            error_type: Set(entry.error_type),
            error_message: Set(entry.error_message),
            endpoint: Set(entry.endpoint),
            request_payload: Set(entry.request_payload),
            severity: Set(entry.severity.as_str().to_string()),
            resolved: Set(false),
            resolved_at: Set(None),
            resolved_by: Set(None),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn list_error_logs(
        &self,
        filter: ErrorLogFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<ErrorLog>, u64), RepositoryError> {
        let total = filtered_errors(&filter).count(&self.db).await?;
        let logs = filtered_errors(&filter)
            .order_by_desc(error_logs::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok((logs, total))
    }

    async fn resolve_error_log(
        &self,
        id: Uuid,
        resolved_by: Uuid,
    ) -> Result<ErrorLog, RepositoryError> {
        let log = error_logs::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("error log {}", id)))?;

        let mut active: error_logs::ActiveModel = log.into();
        active.resolved = Set(true);
        active.resolved_at = Set(Some(Utc::now()));
        active.resolved_by = Set(Some(resolved_by));
        Ok(active.update(&self.db).await?)
    }

    async fn platform_stats(&self) -> Result<PlatformStats, RepositoryError> {
        let total_users = users::Entity::find().count(&self.db).await?;
        let total_projects = projects::Entity::find().count(&self.db).await?;
        let total_queries = query_logs::Entity::find().count(&self.db).await?;
        let failed_queries = query_logs::Entity::find()
            .filter(query_logs::Column::ExecutionStatus.eq(ExecutionStatus::Failed.as_str()))
            .count(&self.db)
            .await?;
        let unresolved_errors = error_logs::Entity::find()
            .filter(error_logs::Column::Resolved.eq(false))
            .count(&self.db)
            .await?;

        Ok(PlatformStats {
            total_users,
            total_projects,
            total_queries,
            failed_queries,
            unresolved_errors,
            total_tokens: self.sum_query_logs(query_logs::Column::SqlTokensUsed).await?,
            total_bytes_processed: self
                .sum_query_logs(query_logs::Column::BytesProcessed)
                .await?,
        })
    }
}
