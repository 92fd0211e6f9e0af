//! Question → SQL → BigQuery → answer.

pub mod context_assembly;
pub mod insights;
pub mod sql_generator;
pub mod sql_guard;

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::internal::{
    ChartSuggestion, ErrorLogEntry, ExecutionResult, ExecutionStatus, QueryLogEntry, Severity,
    SqlGeneration,
};
use crate::models::Project;
use crate::services::{AnthropicClient, BigQueryClient, BigQueryError};
use crate::storage::repository::{Repository, RepositoryError};

pub use context_assembly::{ContextAssembler, PromptContext};
pub use sql_generator::SqlGenerator;

pub const FORBIDDEN_GENERATED_SQL: &str =
    "SQL query contains forbidden operations (DROP, DELETE, etc.)";
pub const FORBIDDEN_DIRECT_SQL: &str = "SQL contains forbidden operations";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("SQL generation failed: {0}")]
    Generation(String),
    #[error("{0}")]
    ForbiddenSql(&'static str),
    #[error(transparent)]
    BigQuery(#[from] BigQueryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PipelineError {
    /// Stored as `error_type` on query and error logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Generation(_) => "SqlGenerationError",
            PipelineError::ForbiddenSql(_) => "ForbiddenSqlError",
            PipelineError::BigQuery(_) => "BigQueryError",
            PipelineError::Repository(_) => "RepositoryError",
        }
    }
}

/// Everything the ask endpoint returns. On failure `error` is set and the
/// result fields are empty.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueryOutcome {
    pub query_id: Uuid,
    pub sql: Option<String>,
    pub result: Option<ExecutionResult>,
    pub insights: Option<String>,
    pub suggested_chart: Option<ChartSuggestion>,
    pub tokens_used: u32,
    pub sql_generation_time_ms: u64,
    pub total_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DirectOutcome {
    pub sql: String,
    pub result: Option<ExecutionResult>,
    pub total_time_ms: u64,
    pub error: Option<String>,
}

/// One natural-language question and who asked it.
#[derive(Debug, Clone)]
pub struct Question<'a> {
    pub project: &'a Project,
    pub user_id: Uuid,
    pub text: &'a str,
    pub conversation_id: Option<Uuid>,
    pub model: &'a str,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

struct Answer {
    generation: SqlGeneration,
    result: ExecutionResult,
}

pub struct QueryPipeline {
    repo: Arc<dyn Repository>,
    generator: SqlGenerator,
    bigquery_api_url: String,
    query_timeout_secs: u64,
}

impl QueryPipeline {
    pub fn new(
        repo: Arc<dyn Repository>,
        llm: Arc<AnthropicClient>,
        llm_max_tokens: u32,
        bigquery_api_url: String,
        query_timeout_secs: u64,
    ) -> Self {
        let generator = SqlGenerator::new(llm, ContextAssembler::new(repo.clone()), llm_max_tokens);
        Self {
            repo,
            generator,
            bigquery_api_url,
            query_timeout_secs,
        }
    }

    /// Runs a question end to end and records it in `query_logs`, whether it
    /// succeeds or not. Failures also produce an `error_logs` row.
    pub async fn process_question(&self, question: Question<'_>) -> QueryOutcome {
        let started = Instant::now();
        let mut log = QueryLogEntry {
            id: Uuid::new_v4(),
            user_id: Some(question.user_id),
            project_id: Some(question.project.id),
            conversation_id: question.conversation_id,
            user_question: question.text.to_string(),
            model_used: Some(question.model.to_string()),
            ip_address: question.ip_address.clone(),
            user_agent: question.user_agent.clone(),
            ..QueryLogEntry::default()
        };

        match self.answer(&question, &mut log).await {
            Ok(answer) => {
                let total_time_ms = elapsed_ms(started);
                tracing::info!("Query processed successfully in {}ms", total_time_ms);
                QueryOutcome {
                    query_id: log.id,
                    insights: Some(insights::generate_insights(&answer.result)),
                    suggested_chart: insights::suggest_chart(&answer.result),
                    sql: Some(answer.generation.sql),
                    result: Some(answer.result),
                    tokens_used: answer.generation.tokens_used,
                    sql_generation_time_ms: answer.generation.generation_time_ms,
                    total_time_ms,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("Query processing failed: {}", e);
                let message = e.to_string();
                log.execution_status = Some(ExecutionStatus::Failed.as_str().to_string());
                log.error_message = Some(message.clone());
                log.error_type = Some(e.kind().to_string());

                let tokens_used = log.sql_tokens_used.unwrap_or(0).max(0) as u32;
                let sql_generation_time_ms = log.sql_generation_time_ms.unwrap_or(0).max(0) as u64;
                let query_id = log.id;
                let sql = log.generated_sql.clone();

                if let Err(db_err) = self.repo.insert_query_log(log).await {
                    tracing::error!("Failed to store query log {}: {}", query_id, db_err);
                }
                self.record_error(&question, &e).await;

                QueryOutcome {
                    query_id,
                    sql,
                    result: None,
                    insights: None,
                    suggested_chart: None,
                    tokens_used,
                    sql_generation_time_ms,
                    total_time_ms: elapsed_ms(started),
                    error: Some(message),
                }
            }
        }
    }

    async fn answer(
        &self,
        question: &Question<'_>,
        log: &mut QueryLogEntry,
    ) -> Result<Answer, PipelineError> {
        let generation = self
            .generator
            .generate_sql(
                question.project,
                question.conversation_id,
                question.text,
                question.model,
            )
            .await?;
        log.generated_sql = Some(generation.sql.clone());
        log.sql_generation_time_ms = Some(clamp_i32(generation.generation_time_ms));
        log.sql_tokens_used = Some(clamp_i32(u64::from(generation.tokens_used)));

        if let Some(keyword) = sql_guard::find_forbidden_keyword(&generation.sql) {
            tracing::warn!("Rejected generated SQL containing {}", keyword);
            return Err(PipelineError::ForbiddenSql(FORBIDDEN_GENERATED_SQL));
        }

        tracing::info!("Executing SQL on BigQuery");
        let client = BigQueryClient::for_project(question.project, &self.bigquery_api_url)?;
        let result = client
            .execute_query(&generation.sql, self.query_timeout_secs)
            .await?;

        log.execution_status = Some(ExecutionStatus::Success.as_str().to_string());
        log.execution_time_ms = Some(clamp_i32(result.execution_time_ms));
        log.rows_returned = Some(clamp_i32(result.rows_returned as u64));
        log.bytes_processed = Some(result.bytes_processed);

        let reply = format!("Generated SQL:\n```sql\n{}\n```", generation.sql);
        self.repo.record_answered_query(log.clone(), &reply).await?;

        Ok(Answer { generation, result })
    }

    async fn record_error(&self, question: &Question<'_>, error: &PipelineError) {
        let entry = ErrorLogEntry {
            user_id: Some(question.user_id),
            project_id: Some(question.project.id),
            error_type: error.kind().to_string(),
            error_message: error.to_string(),
            endpoint: Some("/api/v1/queries/ask".to_string()),
            request_payload: Some(json!({
                "question": question.text,
                "conversation_id": question.conversation_id,
                "model": question.model,
            })),
            severity: Severity::Error,
        };
        if let Err(e) = self.repo.insert_error_log(entry).await {
            tracing::error!("Failed to store error log: {}", e);
        }
    }

    /// Runs caller-supplied SQL without generation or logging.
    pub async fn execute_sql_directly(&self, project: &Project, sql: &str) -> DirectOutcome {
        let started = Instant::now();

        match self.run_direct(project, sql).await {
            Ok(result) => DirectOutcome {
                sql: sql.to_string(),
                result: Some(result),
                total_time_ms: elapsed_ms(started),
                error: None,
            },
            Err(e) => {
                tracing::error!("Direct SQL execution failed: {}", e);
                DirectOutcome {
                    sql: sql.to_string(),
                    result: None,
                    total_time_ms: elapsed_ms(started),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_direct(
        &self,
        project: &Project,
        sql: &str,
    ) -> Result<ExecutionResult, PipelineError> {
        if sql_guard::is_dangerous_sql(sql) {
            return Err(PipelineError::ForbiddenSql(FORBIDDEN_DIRECT_SQL));
        }
        let client = BigQueryClient::for_project(project, &self.bigquery_api_url)?;
        Ok(client.execute_query(sql, self.query_timeout_secs).await?)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn clamp_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
