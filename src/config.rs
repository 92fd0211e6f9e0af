use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Main configuration for the TalkToData server
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// Display name reported by `/health`
    pub app_name: String,

    pub app_version: String,

    /// Enables verbose startup output
    pub debug: bool,

    /// Deployment environment label (development, staging, production)
    pub environment: String,

    /// Bind address
    pub host: String,

    /// HTTP server port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Database URL (SeaORM: sqlite:// or postgres://)
    pub database_url: String,

    /// Maximum database connections
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    /// HMAC key for access and refresh tokens
    #[validate(length(min = 32))]
    pub secret_key: String,

    #[validate(range(min = 1))]
    pub access_token_expire_minutes: i64,

    #[validate(range(min = 1))]
    pub refresh_token_expire_days: i64,

    /// Claude API key; required by `serve`
    pub anthropic_api_key: String,

    /// Claude API base URL
    pub anthropic_api_url: String,

    /// Model used when a question does not name one
    pub default_model: String,

    pub llm_max_tokens: u32,

    /// BigQuery REST base URL
    pub bigquery_api_url: String,

    /// Upper bound for a single warehouse query
    #[validate(range(min = 1, max = 3600))]
    pub query_timeout_secs: u64,

    /// Allowed CORS origins; `*` allows any origin without credentials
    pub cors_origins: Vec<String>,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,

    /// Bootstrap superuser
    #[validate(email)]
    pub admin_email: String,

    #[validate(length(min = 8))]
    pub admin_password: String,

    /// Per-client request quota in a 60 second window
    #[validate(range(min = 1))]
    pub rate_limit_per_minute: u32,

    /// Per-client request quota in a 24 hour window
    #[validate(range(min = 1))]
    pub rate_limit_per_day: u32,

    /// Set when `secret_key` was generated at startup
    #[serde(skip)]
    pub ephemeral_secret: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("app_name", "TalkToData")?
            .set_default("app_version", env!("CARGO_PKG_VERSION"))?
            .set_default("debug", true)?
            .set_default("environment", "development")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("database_url", "sqlite://talktodata.db?mode=rwc")?
            .set_default("max_connections", 10)?
            .set_default("secret_key", "")?
            .set_default("access_token_expire_minutes", 30)?
            .set_default("refresh_token_expire_days", 7)?
            .set_default("anthropic_api_key", "")?
            .set_default("anthropic_api_url", "https://api.anthropic.com")?
            .set_default("default_model", "claude-3-5-sonnet-20241022")?
            .set_default("llm_max_tokens", 4096)?
            .set_default(
                "bigquery_api_url",
                "https://bigquery.googleapis.com/bigquery/v2",
            )?
            .set_default("query_timeout_secs", 60)?
            .set_default(
                "cors_origins",
                vec!["http://localhost:3000", "http://localhost:5173"],
            )?
            .set_default("log_level", "info")?
            .set_default("admin_email", "admin@example.com")?
            .set_default("admin_password", "admin123")?
            .set_default("rate_limit_per_minute", 60)?
            .set_default("rate_limit_per_day", 1000)?
            // ./talktodata.toml (if present)
            .add_source(config::File::with_name("talktodata").required(false));

        if let Ok(path) = std::env::var("TALKTODATA_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        // Environment overrides: DATABASE_URL, SECRET_KEY, CORS_ORIGINS=a,b, ...
        let settings = builder
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;
        if cfg.secret_key.is_empty() {
            cfg.secret_key = generate_secret_key();
            cfg.ephemeral_secret = true;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when the wildcard origin is configured.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o.trim() == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "TalkToData".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            debug: true,
            environment: "development".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: "sqlite://talktodata.db?mode=rwc".to_string(),
            max_connections: 10,
            secret_key: generate_secret_key(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
            anthropic_api_key: String::new(),
            anthropic_api_url: "https://api.anthropic.com".to_string(),
            default_model: "claude-3-5-sonnet-20241022".to_string(),
            llm_max_tokens: 4096,
            bigquery_api_url: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            query_timeout_secs: 60,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            log_level: "info".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "admin123".to_string(),
            rate_limit_per_minute: 60,
            rate_limit_per_day: 1000,
            ephemeral_secret: true,
        }
    }
}

/// 64 hex characters from two v4 UUIDs.
fn generate_secret_key() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
