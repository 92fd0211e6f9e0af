use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::Project;
use crate::storage::repository::{Repository, RepositoryError};

/// Messages of the current conversation that go into the prompt
pub const HISTORY_MESSAGES: u64 = 5;
/// Each history message is cut to this many characters
pub const HISTORY_MESSAGE_CHARS: usize = 200;

pub const DEFAULT_GLOBAL_RULES: &str = "- Always use LIMIT clause for safety
- Never use DROP, DELETE, or UPDATE statements
- Use BigQuery standard SQL syntax
- Optimize queries for cost (avoid SELECT *, use partitions when available)";

pub const NO_PROJECT_RULES: &str = "No project-specific rules defined.";
pub const NO_SCHEMA: &str = "No schema available. Please configure BigQuery connection first.";

/// The rendered memory tiers plus the warehouse schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub global_memory: String,
    pub project_memory: String,
    pub conversation_history: String,
    pub schema: String,
}

pub struct ContextAssembler {
    repo: Arc<dyn Repository>,
}

impl ContextAssembler {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Loads all tiers for one question.
    pub async fn assemble(
        &self,
        project: &Project,
        conversation_id: Option<Uuid>,
    ) -> Result<PromptContext, RepositoryError> {
        Ok(PromptContext {
            global_memory: self.load_global_memory().await?,
            project_memory: self.load_project_memory(project.id).await?,
            conversation_history: self.load_conversation_history(conversation_id).await?,
            schema: schema_context(project),
        })
    }

    /// Tier 1: active global instructions by priority.
    pub async fn load_global_memory(&self) -> Result<String, RepositoryError> {
        let instructions = self.repo.list_global_instructions(true).await?;
        if instructions.is_empty() {
            return Ok(DEFAULT_GLOBAL_RULES.to_string());
        }

        Ok(instructions
            .iter()
            .map(|inst| format!("- {}", inst.instruction_text))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Tier 2: business rules followed by active project instructions.
    pub async fn load_project_memory(&self, project_id: Uuid) -> Result<String, RepositoryError> {
        let rules = self.repo.list_memory_items(project_id).await?;
        let instructions = self.repo.list_project_instructions(project_id, true).await?;

        let mut text = String::new();
        if !rules.is_empty() {
            text.push_str("BUSINESS RULES & DOMAIN KNOWLEDGE:\n");
            for rule in &rules {
                text.push_str(&format!("- {}: {}\n", rule.key, rule.content));
            }
            text.push('\n');
        }
        if !instructions.is_empty() {
            text.push_str("PROJECT-SPECIFIC INSTRUCTIONS:\n");
            for inst in &instructions {
                text.push_str(&format!("- {}\n", inst.instruction_text));
            }
        }

        if text.is_empty() {
            Ok(NO_PROJECT_RULES.to_string())
        } else {
            Ok(text)
        }
    }

    /// Tier 3: the tail of the conversation, oldest first.
    pub async fn load_conversation_history(
        &self,
        conversation_id: Option<Uuid>,
    ) -> Result<String, RepositoryError> {
        let Some(conversation_id) = conversation_id else {
            return Ok(String::new());
        };

        let messages = self
            .repo
            .recent_messages(conversation_id, HISTORY_MESSAGES)
            .await?;
        if messages.is_empty() {
            return Ok(String::new());
        }

        let mut text = String::from("RECENT CONVERSATION HISTORY:\n");
        for msg in &messages {
            let content: String = msg.content.chars().take(HISTORY_MESSAGE_CHARS).collect();
            text.push_str(&format!("{}: {}\n", msg.role.to_uppercase(), content));
        }
        Ok(text)
    }
}

/// Renders the cached dataset schema with fully qualified table names.
pub fn schema_context(project: &Project) -> String {
    let tables = match project.schema_cache.as_object() {
        Some(tables) if !tables.is_empty() => tables,
        _ => return NO_SCHEMA.to_string(),
    };

    let qualifier = format!(
        "{}.{}",
        project.bigquery_project_id.as_deref().unwrap_or_default(),
        project.bigquery_dataset.as_deref().unwrap_or_default()
    );

    let mut text = String::from("AVAILABLE TABLES AND SCHEMA:\n\n");
    for (table_name, table_info) in tables {
        text.push_str(&format!("Table: {}.{}\n", qualifier, table_name));

        if let Some(columns) = table_info.get("columns").and_then(Value::as_array) {
            text.push_str("Columns:\n");
            for col in columns {
                let name = col.get("name").and_then(Value::as_str).unwrap_or("unknown");
                let col_type = col.get("type").and_then(Value::as_str).unwrap_or("unknown");
                text.push_str(&format!("  - {} ({})\n", name, col_type));
            }
        }
        text.push('\n');
    }
    text
}
