pub mod anthropic_client;
pub mod bigquery_client;

pub use anthropic_client::{AnthropicClient, Completion, LlmError};
pub use bigquery_client::{BigQueryClient, BigQueryError, ServiceAccountKey};
