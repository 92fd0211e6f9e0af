use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    prelude::*, ConnectionTrait, PaginatorTrait, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};

use super::conversations::append_exchange_in;
use super::{QueryLogStore, RepositoryError, SeaOrmRepository};
use crate::models::internal::{QueryLogEntry, QueryLogFilter};
use crate::models::QueryLog;
use crate::storage::entities::query_logs;

fn filtered(filter: &QueryLogFilter) -> Select<query_logs::Entity> {
    let mut query = query_logs::Entity::find();
    if let Some(user_id) = filter.user_id {
        query = query.filter(query_logs::Column::UserId.eq(user_id));
    }
    if let Some(project_id) = filter.project_id {
        query = query.filter(query_logs::Column::ProjectId.eq(project_id));
    }
    if let Some(status) = &filter.execution_status {
        query = query.filter(query_logs::Column::ExecutionStatus.eq(status.as_str()));
    }
    query
}

async fn insert_in<C: ConnectionTrait>(
    db: &C,
    entry: QueryLogEntry,
) -> Result<QueryLog, RepositoryError> {
    let model = query_logs::ActiveModel {
        id: Set(entry.id),
        user_id: Set(entry.user_id),
        project_id: Set(entry.project_id),
        conversation_id: Set(entry.conversation_id),
        user_question: Set(entry.user_question),
        generated_sql: Set(entry.generated_sql),
        sql_generation_time_ms: Set(entry.sql_generation_time_ms),
        sql_tokens_used: Set(entry.sql_tokens_used),
        execution_status: Set(entry.execution_status),
        execution_time_ms: Set(entry.execution_time_ms),
        rows_returned: Set(entry.rows_returned),
        bytes_processed: Set(entry.bytes_processed),
        error_message: Set(entry.error_message),
        error_type: Set(entry.error_type),
        model_used: Set(entry.model_used),
        ip_address: Set(entry.ip_address),
        user_agent: Set(entry.user_agent),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(db).await?)
}

#[async_trait]
impl QueryLogStore for SeaOrmRepository {
    async fn insert_query_log(&self, entry: QueryLogEntry) -> Result<QueryLog, RepositoryError> {
        insert_in(&self.db, entry).await
    }

    async fn record_answered_query(
        &self,
        entry: QueryLogEntry,
        reply: &str,
    ) -> Result<QueryLog, RepositoryError> {
        let txn = self.db.begin().await?;
        if let Some(conversation_id) = entry.conversation_id {
            let tokens = entry.sql_tokens_used.unwrap_or(0);
            append_exchange_in(&txn, conversation_id, &entry.user_question, reply, tokens).await?;
        }
        let log = insert_in(&txn, entry).await?;
        txn.commit().await?;
        Ok(log)
    }

    async fn list_query_logs(
        &self,
        filter: QueryLogFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<QueryLog>, u64), RepositoryError> {
        let total = filtered(&filter).count(&self.db).await?;
        let logs = filtered(&filter)
            .order_by_desc(query_logs::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok((logs, total))
    }
}
