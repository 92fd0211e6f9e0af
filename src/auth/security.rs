use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;

/// Plaintext keys look like `ttd_<48 hex chars>`.
const API_KEY_MARKER: &str = "ttd_";
const API_KEY_RANDOM_BYTES: usize = 24;
pub const API_KEY_PREFIX_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("Unexpected token type: expected {expected}, got {actual}")]
    WrongTokenType { expected: String, actual: String },
}

// ==================== PASSWORDS ====================

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// False for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ==================== TOKENS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and checks HS256 tokens signed with the configured secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.secret_key,
            Duration::minutes(config.access_token_expire_minutes),
            Duration::days(config.refresh_token_expire_days),
        )
    }

    pub fn create_access_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue(user_id, TokenType::Access, self.access_ttl)
    }

    pub fn create_refresh_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue(user_id, TokenType::Refresh, self.refresh_ttl)
    }

    pub fn create_pair(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.create_access_token(user_id)?,
            refresh_token: self.create_refresh_token(user_id)?,
        })
    }

    /// Verifies signature and expiry, then checks the `type` claim.
    pub fn decode_token(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;

        if data.claims.token_type != expected {
            return Err(AuthError::WrongTokenType {
                expected: expected.as_str().to_string(),
                actual: data.claims.token_type.as_str().to_string(),
            });
        }
        Ok(data.claims)
    }

    fn issue(&self, user_id: Uuid, token_type: TokenType, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

// ==================== API KEYS ====================

pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_MARKER, hex::encode(bytes))
}

/// SHA-256 hex digest; only the digest is stored.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

pub fn api_key_prefix(key: &str) -> String {
    key.chars().take(API_KEY_PREFIX_LEN).collect()
}
