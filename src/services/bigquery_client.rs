//! BigQuery REST client authenticated with a service-account key.
//!
//! Tokens come from the OAuth2 JWT-bearer grant: an RS256 assertion signed
//! with the key's private key is exchanged at the key's `token_uri`.

use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::internal::{
    ColumnSchema, DryRunResult, ExecutionResult, FieldSchema, SchemaCache, TableSchema,
};
use crate::models::Project;

pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const CONNECTION_TEST_SQL: &str = "SELECT 1 as test";
const CONNECTION_TEST_TIMEOUT_SECS: u64 = 10;
/// Refresh the cached token this long before it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Upper bound for a single long-poll on an unfinished job.
const POLL_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum BigQueryError {
    #[error("BigQuery credentials not configured for this project")]
    NotConfigured,
    #[error("BigQuery dataset not configured")]
    DatasetNotConfigured,
    #[error("Invalid service account credentials: {0}")]
    InvalidCredentials(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("BigQuery API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Query timed out after {0}s")]
    Timeout(u64),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Query execution failed: {0}")]
    Execution(Box<BigQueryError>),
    #[error("Failed to extract schema: {0}")]
    Schema(Box<BigQueryError>),
}

/// The fields of a Google service-account JSON key that the client uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn parse(credentials_json: &str) -> Result<Self, BigQueryError> {
        serde_json::from_str(credentials_json)
            .map_err(|e| BigQueryError::InvalidCredentials(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct BigQueryClient {
    http: reqwest::Client,
    api_url: String,
    project_id: String,
    dataset: Option<String>,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl BigQueryClient {
    pub fn new(
        api_url: &str,
        credentials_json: &str,
        project_id: Option<&str>,
        dataset: Option<&str>,
    ) -> Result<Self, BigQueryError> {
        let key = ServiceAccountKey::parse(credentials_json)?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| BigQueryError::InvalidCredentials(e.to_string()))?;

        let project_id = project_id
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| key.project_id.clone())
            .ok_or_else(|| {
                BigQueryError::InvalidCredentials("no BigQuery project id available".to_string())
            })?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id,
            dataset: dataset.filter(|d| !d.is_empty()).map(str::to_string),
            key,
            signing_key,
            token: Mutex::new(None),
        })
    }

    /// Client for a stored project; fails when it has no credentials.
    pub fn for_project(project: &Project, api_url: &str) -> Result<Self, BigQueryError> {
        let credentials = project
            .credentials_json
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or(BigQueryError::NotConfigured)?;
        Self::with_credentials(project, api_url, credentials)
    }

    /// Client for a project using credentials that are not stored yet.
    pub fn with_credentials(
        project: &Project,
        api_url: &str,
        credentials_json: &str,
    ) -> Result<Self, BigQueryError> {
        Self::new(
            api_url,
            credentials_json,
            project.bigquery_project_id.as_deref(),
            project.bigquery_dataset.as_deref(),
        )
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    // ==================== AUTH ====================

    async fn access_token(&self) -> Result<String, BigQueryError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: BIGQUERY_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let assertion = encode(&header, &claims, &self.signing_key)
            .map_err(|e| BigQueryError::Auth(e.to_string()))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BigQueryError::Auth(format!("{} - {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        tracing::debug!("Obtained BigQuery access token for {}", self.key.client_email);
        Ok(token.access_token)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, BigQueryError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<Value, BigQueryError> {
        let token = self.access_token().await?;
        let response = self.http.post(url).bearer_auth(token).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, BigQueryError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BigQueryError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        Ok(response.json().await?)
    }

    // ==================== QUERIES ====================

    /// Runs standard SQL and collects every result row.
    pub async fn execute_query(
        &self,
        sql: &str,
        timeout_secs: u64,
    ) -> Result<ExecutionResult, BigQueryError> {
        let started = Instant::now();
        tracing::info!("Executing BigQuery SQL: {}...", truncate(sql, 200));

        let outcome = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.run_query(sql, timeout_secs),
        )
        .await
        .unwrap_or(Err(BigQueryError::Timeout(timeout_secs)));

        match outcome {
            Ok((rows, schema, bytes_processed)) => {
                let execution_time_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    "Query executed successfully. Rows: {}, Time: {}ms, Bytes: {}",
                    rows.len(),
                    execution_time_ms,
                    bytes_processed
                );
                Ok(ExecutionResult {
                    rows_returned: rows.len(),
                    rows,
                    schema,
                    execution_time_ms,
                    bytes_processed,
                })
            }
            Err(e) => {
                tracing::error!("BigQuery execution failed: {}", e);
                Err(BigQueryError::Execution(Box::new(e)))
            }
        }
    }

    async fn run_query(
        &self,
        sql: &str,
        timeout_secs: u64,
    ) -> Result<(Vec<Map<String, Value>>, Vec<FieldSchema>, i64), BigQueryError> {
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            use_query_cache: true,
            dry_run: false,
            timeout_ms: Some((timeout_secs * 1000).min(POLL_TIMEOUT_MS)),
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        };
        let url = format!("{}/projects/{}/queries", self.api_url, self.project_id);
        let mut page = self.post_json(&url, &request).await?;

        let job_id = page
            .pointer("/jobReference/jobId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let location = page
            .pointer("/jobReference/location")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut fields: Vec<Field> = Vec::new();
        let mut rows = Vec::new();
        let mut bytes_processed = parse_i64(page.get("totalBytesProcessed")).unwrap_or(0);

        loop {
            let complete = page
                .get("jobComplete")
                .and_then(Value::as_bool)
                .unwrap_or(true);

            if complete {
                if fields.is_empty() {
                    fields = parse_fields(page.pointer("/schema/fields"))?;
                }
                if let Some(b) = parse_i64(page.get("totalBytesProcessed")) {
                    bytes_processed = b;
                }
                if let Some(page_rows) = page.get("rows").and_then(Value::as_array) {
                    for row in page_rows {
                        rows.push(decode_row(&fields, row));
                    }
                }
            }

            let page_token = page
                .get("pageToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if complete && page_token.is_none() {
                break;
            }

            let job_id = job_id.as_deref().ok_or_else(|| {
                BigQueryError::InvalidResponse("unfinished query without a job reference".into())
            })?;
            let mut query = vec![
                ("timeoutMs", POLL_TIMEOUT_MS.to_string()),
                ("formatOptions.useInt64Timestamp", "true".to_string()),
            ];
            if let Some(location) = &location {
                query.push(("location", location.clone()));
            }
            if complete {
                if let Some(token) = page_token {
                    query.push(("pageToken", token));
                }
            }
            let url = format!(
                "{}/projects/{}/queries/{}",
                self.api_url, self.project_id, job_id
            );
            page = self.get_json(&url, &query).await?;
        }

        let schema = fields
            .iter()
            .map(|f| FieldSchema {
                name: f.name.clone(),
                data_type: f.field_type.clone(),
            })
            .collect();
        Ok((rows, schema, bytes_processed))
    }

    /// Dry run: validates SQL and estimates bytes without running it.
    pub async fn validate_sql(&self, sql: &str) -> DryRunResult {
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            use_query_cache: false,
            dry_run: true,
            timeout_ms: None,
            format_options: FormatOptions::default(),
        };
        let url = format!("{}/projects/{}/queries", self.api_url, self.project_id);

        match self.post_json(&url, &request).await {
            Ok(body) => DryRunResult {
                valid: true,
                error: None,
                estimated_bytes: parse_i64(body.get("totalBytesProcessed")).unwrap_or(0),
            },
            Err(e) => DryRunResult {
                valid: false,
                error: Some(e.to_string()),
                estimated_bytes: 0,
            },
        }
    }

    pub async fn test_connection(&self) -> bool {
        match self
            .execute_query(CONNECTION_TEST_SQL, CONNECTION_TEST_TIMEOUT_SECS)
            .await
        {
            Ok(_) => {
                tracing::info!("BigQuery connection test successful");
                true
            }
            Err(e) => {
                tracing::error!("BigQuery connection test failed: {}", e);
                false
            }
        }
    }

    // ==================== SCHEMA ====================

    /// Columns, row count and size of every table in the configured dataset.
    pub async fn get_schema(&self) -> Result<SchemaCache, BigQueryError> {
        match self.extract_schema().await {
            Ok(schema) => {
                tracing::info!("Schema extracted for {} tables", schema.len());
                Ok(schema)
            }
            Err(e) => {
                tracing::error!("Schema extraction failed: {}", e);
                Err(BigQueryError::Schema(Box::new(e)))
            }
        }
    }

    async fn extract_schema(&self) -> Result<SchemaCache, BigQueryError> {
        let dataset = self
            .dataset
            .as_deref()
            .ok_or(BigQueryError::DatasetNotConfigured)?;
        let dataset_url = format!(
            "{}/projects/{}/datasets/{}",
            self.api_url, self.project_id, dataset
        );
        // Fails early with a clear error when the dataset does not exist.
        self.get_json(&dataset_url, &[]).await?;

        let mut table_ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, String)> = page_token
                .take()
                .map(|t| vec![("pageToken", t)])
                .unwrap_or_default();
            let page = self.get_json(&format!("{}/tables", dataset_url), &query).await?;

            if let Some(tables) = page.get("tables").and_then(Value::as_array) {
                for table in tables {
                    if let Some(id) = table.pointer("/tableReference/tableId").and_then(Value::as_str) {
                        table_ids.push(id.to_string());
                    }
                }
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        let mut schema = SchemaCache::new();
        for table_id in table_ids {
            let table = self
                .get_json(&format!("{}/tables/{}", dataset_url, table_id), &[])
                .await?;
            let columns = parse_fields(table.pointer("/schema/fields"))?
                .into_iter()
                .map(|f| ColumnSchema {
                    name: f.name,
                    data_type: f.field_type,
                    mode: Some(f.mode.unwrap_or_else(|| "NULLABLE".to_string())),
                    description: f.description.unwrap_or_default(),
                })
                .collect();
            schema.insert(
                table_id,
                TableSchema {
                    columns,
                    row_count: parse_i64(table.get("numRows")),
                    size_bytes: parse_i64(table.get("numBytes")),
                },
            );
        }
        Ok(schema)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    use_query_cache: bool,
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    format_options: FormatOptions,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormatOptions {
    use_int64_timestamp: bool,
}

/// Table or result field as the REST API describes it.
#[derive(Debug, Clone, Deserialize)]
struct Field {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fields: Vec<Field>,
}

impl Field {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }
}

fn parse_fields(value: Option<&Value>) -> Result<Vec<Field>, BigQueryError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| BigQueryError::InvalidResponse(format!("bad schema: {}", e))),
    }
}

/// int64 values arrive as JSON strings.
fn parse_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn decode_row(fields: &[Field], row: &Value) -> Map<String, Value> {
    let cells = row.get("f").and_then(Value::as_array);
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let raw = cells
                .and_then(|c| c.get(i))
                .and_then(|cell| cell.get("v"))
                .unwrap_or(&Value::Null);
            (field.name.clone(), decode_value(field, raw))
        })
        .collect()
}

fn decode_value(field: &Field, raw: &Value) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    if field.is_repeated() {
        let element = Field {
            mode: Some("NULLABLE".to_string()),
            ..field.clone()
        };
        return match raw.as_array() {
            Some(items) => Value::Array(
                items
                    .iter()
                    .map(|item| decode_value(&element, item.get("v").unwrap_or(&Value::Null)))
                    .collect(),
            ),
            None => Value::Null,
        };
    }
    match field.field_type.as_str() {
        "RECORD" | "STRUCT" => Value::Object(decode_row(&field.fields, raw)),
        _ => match raw.as_str() {
            Some(text) => decode_scalar(&field.field_type, text),
            None => raw.clone(),
        },
    }
}

fn decode_scalar(field_type: &str, text: &str) -> Value {
    match field_type {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        "BOOLEAN" | "BOOL" => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        "TIMESTAMP" => decode_timestamp(text)
            .map(Value::String)
            .unwrap_or_else(|| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

/// Microseconds since the epoch, or float seconds without int64 formatting.
fn decode_timestamp(text: &str) -> Option<String> {
    let micros = match text.parse::<i64>() {
        Ok(micros) => micros,
        Err(_) => (text.parse::<f64>().ok()? * 1_000_000.0).round() as i64,
    };
    Utc.timestamp_micros(micros)
        .single()
        .map(|ts| ts.to_rfc3339())
}

/// Pulls `error.message` out of a Google API error body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
