use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::context_assembly::{ContextAssembler, PromptContext};
use super::PipelineError;
use crate::models::internal::SqlGeneration;
use crate::models::Project;
use crate::services::AnthropicClient;

const TEMPERATURE: f32 = 0.0;

/// Translates questions into BigQuery SQL with Claude.
pub struct SqlGenerator {
    llm: Arc<AnthropicClient>,
    context: ContextAssembler,
    max_tokens: u32,
}

impl SqlGenerator {
    pub fn new(llm: Arc<AnthropicClient>, context: ContextAssembler, max_tokens: u32) -> Self {
        Self {
            llm,
            context,
            max_tokens,
        }
    }

    pub async fn generate_sql(
        &self,
        project: &Project,
        conversation_id: Option<Uuid>,
        question: &str,
        model: &str,
    ) -> Result<SqlGeneration, PipelineError> {
        let started = Instant::now();
        tracing::info!("Generating SQL for question: {}", question);

        let context = self
            .context
            .assemble(project, conversation_id)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;
        let prompt = render_prompt(&context, question);

        let completion = self
            .llm
            .complete(model, &prompt, self.max_tokens, TEMPERATURE)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let sql = strip_markdown_fences(&completion.text);
        let tokens_used = match completion.total_tokens() {
            0 => estimate_tokens(&prompt, &sql),
            reported => reported,
        };
        let generation_time_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            "Generated SQL in {}ms using {} tokens: {}",
            generation_time_ms,
            tokens_used,
            sql
        );
        Ok(SqlGeneration {
            sql,
            tokens_used,
            generation_time_ms,
        })
    }
}

pub fn render_prompt(context: &PromptContext, question: &str) -> String {
    format!(
        "You are a SQL expert specializing in Google BigQuery.
Your task is to generate precise BigQuery SQL based on the user's question.

GLOBAL RULES (ALWAYS FOLLOW):
{global_memory}

{project_memory}

{schema}

{conversation_history}

IMPORTANT FORMATTING RULES:
- Return ONLY the SQL query, nothing else
- Do NOT wrap the query in ```sql``` or any markdown
- Use proper BigQuery syntax (not MySQL or PostgreSQL)
- Always use fully qualified table names (project.dataset.table)
- Include appropriate LIMIT clause (default: LIMIT 100)
- Optimize for performance and cost

USER QUESTION: {question}

SQL:",
        global_memory = context.global_memory,
        project_memory = context.project_memory,
        schema = context.schema,
        conversation_history = context.conversation_history,
        question = question,
    )
}

/// Removes ```` ```sql ```` / ```` ``` ```` fences the model adds despite instructions.
pub fn strip_markdown_fences(text: &str) -> String {
    let sql = text.trim();
    if sql.starts_with("```sql") {
        sql.replace("```sql", "").replace("```", "").trim().to_string()
    } else if sql.starts_with("```") {
        sql.replace("```", "").trim().to_string()
    } else {
        sql.to_string()
    }
}

/// Roughly four characters per token.
fn estimate_tokens(prompt: &str, sql: &str) -> u32 {
    ((prompt.chars().count() + sql.chars().count()) / 4) as u32
}
