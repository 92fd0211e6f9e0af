//! Credentials: password hashing, bearer tokens, API keys and the request
//! extractors that turn them into a `CurrentUser`.

mod extractor;
mod security;

pub use extractor::{CurrentUser, Superuser, API_KEY_HEADER};
pub use security::{
    api_key_prefix, generate_api_key, hash_api_key, hash_password, verify_password, AuthError,
    Claims, TokenPair, TokenService, TokenType, API_KEY_PREFIX_LEN,
};
