use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "query_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    #[sea_orm(column_type = "Text")]
    pub user_question: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub generated_sql: Option<String>,
    pub sql_generation_time_ms: Option<i32>,
    pub sql_tokens_used: Option<i32>,
    /// `success`, `failed` or `timeout`
    pub execution_status: Option<String>,
    pub execution_time_ms: Option<i32>,
    pub rows_returned: Option<i32>,
    pub bytes_processed: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub model_used: Option<String>,
    pub ip_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
