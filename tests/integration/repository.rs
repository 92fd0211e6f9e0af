//! Storage behaviour exercised directly against an in-memory database.

use super::*;
use talktodata::models::internal::{
    ColumnSchema, ErrorLogEntry, ExecutionStatus, NewInstruction, NewMemoryItem, NewProject,
    QueryLogEntry, QueryLogFilter, SchemaCache, Severity, TableSchema,
};
use talktodata::pipeline::ContextAssembler;
use talktodata::storage::{
    AuditStore, ConversationStore, MemoryStore, ProjectStore, QueryLogStore, RepositoryError,
    UserStore,
};

async fn test_repo() -> SeaOrmRepository {
    let db = init_db("sqlite::memory:").await.unwrap();
    SeaOrmRepository::new(db)
}

async fn owner(repo: &SeaOrmRepository, email: &str) -> Uuid {
    repo.create_user(email, "not-a-real-hash", None, false)
        .await
        .unwrap()
        .id
}

async fn project(repo: &SeaOrmRepository, owner_id: Uuid) -> Uuid {
    repo.create_project(
        owner_id,
        NewProject {
            name: "Warehouse".to_string(),
            bigquery_project_id: Some(BQ_PROJECT.to_string()),
            bigquery_dataset: Some(BQ_DATASET.to_string()),
            ..NewProject::default()
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn test_duplicate_email_is_a_conflict() {
    let repo = test_repo().await;
    owner(&repo, "Someone@Example.com").await;

    let err = repo
        .create_user("someone@example.com", "hash", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    let user = repo.find_user_by_email("SOMEONE@example.com").await.unwrap();
    assert_eq!(user.unwrap().email, "someone@example.com");
}

#[tokio::test]
async fn test_delete_project_cascades() {
    let repo = test_repo().await;
    let owner_id = owner(&repo, "cascade@example.com").await;
    let project_id = project(&repo, owner_id).await;

    repo.create_memory_item(
        project_id,
        NewMemoryItem {
            memory_type: "business_rule".to_string(),
            key: "vat".to_string(),
            content: "Revenue excludes VAT".to_string(),
            created_by: Some(owner_id),
        },
    )
    .await
    .unwrap();
    repo.create_project_instruction(
        project_id,
        NewInstruction {
            instruction_text: "Use the orders table".to_string(),
            ..NewInstruction::default()
        },
    )
    .await
    .unwrap();
    let conversation = repo
        .create_conversation(project_id, owner_id, None)
        .await
        .unwrap();
    repo.append_exchange(conversation.id, "question", "answer", 10)
        .await
        .unwrap();

    repo.delete_project(project_id).await.unwrap();

    assert!(repo.find_project(project_id).await.unwrap().is_none());
    assert!(repo.find_conversation(conversation.id).await.unwrap().is_none());
    assert!(repo.list_messages(conversation.id).await.unwrap().is_empty());
    assert!(repo.list_memory_items(project_id).await.unwrap().is_empty());
    assert!(repo
        .list_project_instructions(project_id, false)
        .await
        .unwrap()
        .is_empty());

    let err = repo.delete_project(project_id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn test_schema_is_cached_with_connection() {
    let repo = test_repo().await;
    let owner_id = owner(&repo, "schema@example.com").await;
    let project_id = project(&repo, owner_id).await;

    let mut schema = SchemaCache::new();
    schema.insert(
        "orders".to_string(),
        TableSchema {
            columns: vec![ColumnSchema {
                name: "order_id".to_string(),
                data_type: "INTEGER".to_string(),
                mode: Some("REQUIRED".to_string()),
                description: String::new(),
            }],
            row_count: Some(10),
            size_bytes: Some(400),
        },
    );

    let saved = repo
        .save_connection(project_id, "{\"type\":\"service_account\"}", &schema)
        .await
        .unwrap();
    assert!(saved.credentials_json.is_some());
    assert!(saved.schema_last_updated.is_some());
    assert_eq!(saved.schema_cache["orders"]["columns"][0]["type"], "INTEGER");

    let found = repo
        .find_owned_project(project_id, owner_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.schema_cache["orders"]["row_count"], 10);

    let stranger = owner(&repo, "stranger@example.com").await;
    assert!(repo
        .find_owned_project(project_id, stranger)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_append_exchange_titles_and_orders_messages() {
    let repo = test_repo().await;
    let owner_id = owner(&repo, "chat@example.com").await;
    let project_id = project(&repo, owner_id).await;
    let conversation = repo
        .create_conversation(project_id, owner_id, None)
        .await
        .unwrap();

    let long_question = "q".repeat(150);
    repo.append_exchange(conversation.id, &long_question, "first answer", 42)
        .await
        .unwrap();
    repo.append_exchange(conversation.id, "second question", "second answer", 7)
        .await
        .unwrap();

    let updated = repo.find_conversation(conversation.id).await.unwrap().unwrap();
    // Titled from the first question only, truncated to 100 characters
    assert_eq!(updated.title.as_deref(), Some("q".repeat(100).as_str()));
    assert!(updated.updated_at > conversation.updated_at);

    let all = repo.list_messages(conversation.id).await.unwrap();
    let roles: Vec<&str> = all.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["user", "assistant", "user", "assistant"]);
    assert_eq!(all[1].tokens_used, 42);

    let recent = repo.recent_messages(conversation.id, 3).await.unwrap();
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["first answer", "second question", "second answer"]);

    let err = repo
        .append_exchange(Uuid::new_v4(), "q", "a", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn test_active_only_instructions() {
    let repo = test_repo().await;
    let kept = repo
        .create_global_instruction(NewInstruction {
            instruction_text: "Qualify every table".to_string(),
            priority: 2,
            ..NewInstruction::default()
        })
        .await
        .unwrap();
    let dropped = repo
        .create_global_instruction(NewInstruction {
            instruction_text: "Old rule".to_string(),
            priority: 1,
            ..NewInstruction::default()
        })
        .await
        .unwrap();
    repo.update_global_instruction(
        dropped.id,
        talktodata::models::internal::InstructionChanges {
            active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let all = repo.list_global_instructions(false).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, dropped.id);

    let active = repo.list_global_instructions(true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, kept.id);
}

#[tokio::test]
async fn test_platform_stats_aggregate_logs() {
    let repo = test_repo().await;
    let user_id = owner(&repo, "stats@example.com").await;
    let project_id = project(&repo, user_id).await;

    let empty = repo.platform_stats().await.unwrap();
    assert_eq!(empty.total_queries, 0);
    assert_eq!(empty.total_tokens, 0);
    assert_eq!(empty.total_bytes_processed, 0);

    for (status, tokens, bytes) in [
        (ExecutionStatus::Success, 100, Some(5_000_000_000_i64)),
        (ExecutionStatus::Success, 50, Some(1000)),
        (ExecutionStatus::Failed, 25, None),
    ] {
        repo.insert_query_log(QueryLogEntry {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            project_id: Some(project_id),
            user_question: "how much?".to_string(),
            execution_status: Some(status.as_str().to_string()),
            sql_tokens_used: Some(tokens),
            bytes_processed: bytes,
            ..QueryLogEntry::default()
        })
        .await
        .unwrap();
    }
    repo.insert_error_log(ErrorLogEntry {
        user_id: Some(user_id),
        project_id: Some(project_id),
        error_type: "BigQueryError".to_string(),
        error_message: "quota exceeded".to_string(),
        endpoint: None,
        request_payload: None,
        severity: Severity::Critical,
    })
    .await
    .unwrap();

    let stats = repo.platform_stats().await.unwrap();
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.total_projects, 1);
    assert_eq!(stats.total_queries, 3);
    assert_eq!(stats.failed_queries, 1);
    assert_eq!(stats.unresolved_errors, 1);
    assert_eq!(stats.total_tokens, 175);
    assert_eq!(stats.total_bytes_processed, 5_000_001_000);

    let (failed, total) = repo
        .list_query_logs(
            QueryLogFilter {
                execution_status: Some("failed".to_string()),
                ..QueryLogFilter::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(failed[0].sql_tokens_used, Some(25));
}

fn answered(user_id: Uuid, project_id: Uuid, conversation_id: Option<Uuid>) -> QueryLogEntry {
    QueryLogEntry {
        id: Uuid::new_v4(),
        user_id: Some(user_id),
        project_id: Some(project_id),
        conversation_id,
        user_question: "revenue by region?".to_string(),
        generated_sql: Some(GENERATED_SQL.to_string()),
        sql_tokens_used: Some(150),
        execution_status: Some(ExecutionStatus::Success.as_str().to_string()),
        ..QueryLogEntry::default()
    }
}

#[tokio::test]
async fn test_answered_query_writes_log_and_exchange() {
    let repo = test_repo().await;
    let user_id = owner(&repo, "answer@example.com").await;
    let project_id = project(&repo, user_id).await;
    let conversation = repo
        .create_conversation(project_id, user_id, None)
        .await
        .unwrap();

    let log = repo
        .record_answered_query(answered(user_id, project_id, Some(conversation.id)), "SELECT 1")
        .await
        .unwrap();
    assert_eq!(log.conversation_id, Some(conversation.id));

    let messages = repo.list_messages(conversation.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "revenue by region?");
    assert_eq!(messages[1].content, "SELECT 1");
    assert_eq!(messages[1].tokens_used, 150);

    // Without a conversation only the log is written
    repo.record_answered_query(answered(user_id, project_id, None), "SELECT 1")
        .await
        .unwrap();
    let (_, total) = repo
        .list_query_logs(QueryLogFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_answered_query_rolls_back_on_failure() {
    let repo = test_repo().await;
    let user_id = owner(&repo, "rollback@example.com").await;
    let project_id = project(&repo, user_id).await;
    let conversation = repo
        .create_conversation(project_id, user_id, None)
        .await
        .unwrap();

    // The log insert fails on a duplicate id after the exchange is written
    let entry = answered(user_id, project_id, Some(conversation.id));
    repo.insert_query_log(entry.clone()).await.unwrap();
    assert!(repo.record_answered_query(entry, "SELECT 1").await.is_err());

    assert!(repo.list_messages(conversation.id).await.unwrap().is_empty());
    let untouched = repo.find_conversation(conversation.id).await.unwrap().unwrap();
    assert!(untouched.title.is_none());

    // An unknown conversation leaves no log behind
    let err = repo
        .record_answered_query(answered(user_id, project_id, Some(Uuid::new_v4())), "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
    let (_, total) = repo
        .list_query_logs(QueryLogFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_conversation_history_context() {
    let repo: Arc<dyn Repository> = Arc::new(test_repo().await);
    let user_id = repo
        .create_user("history@example.com", "hash", None, false)
        .await
        .unwrap()
        .id;
    let project_id = repo
        .create_project(
            user_id,
            NewProject {
                name: "History".to_string(),
                ..NewProject::default()
            },
        )
        .await
        .unwrap()
        .id;
    let conversation = repo
        .create_conversation(project_id, user_id, None)
        .await
        .unwrap();

    let long_question = format!("{}tail", "x".repeat(200));
    repo.append_exchange(conversation.id, "q1", "a1", 0).await.unwrap();
    repo.append_exchange(conversation.id, "q2", "a2", 0).await.unwrap();
    repo.append_exchange(conversation.id, &long_question, "a3", 0)
        .await
        .unwrap();

    let assembler = ContextAssembler::new(repo.clone());
    let history = assembler
        .load_conversation_history(Some(conversation.id))
        .await
        .unwrap();

    // Last five messages, oldest first, each cut to 200 characters
    let truncated = format!("USER: {}", "x".repeat(200));
    let lines: Vec<&str> = history.lines().collect();
    assert_eq!(
        lines,
        [
            "RECENT CONVERSATION HISTORY:",
            "ASSISTANT: a1",
            "USER: q2",
            "ASSISTANT: a2",
            truncated.as_str(),
            "ASSISTANT: a3",
        ]
    );

    assert_eq!(assembler.load_conversation_history(None).await.unwrap(), "");
    let empty = repo
        .create_conversation(project_id, user_id, None)
        .await
        .unwrap();
    assert_eq!(
        assembler
            .load_conversation_history(Some(empty.id))
            .await
            .unwrap(),
        ""
    );
}
