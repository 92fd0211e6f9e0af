use chrono::Duration;
use talktodata::auth::{
    api_key_prefix, generate_api_key, hash_api_key, hash_password, verify_password, AuthError,
    TokenService, TokenType,
};
use talktodata::config::Config;
use uuid::Uuid;

#[test]
fn test_password_round_trip() {
    let hashed = hash_password("s3cret-passphrase").unwrap();

    assert!(hashed.starts_with("$argon2"));
    assert!(verify_password("s3cret-passphrase", &hashed));
    assert!(!verify_password("wrong", &hashed));
    assert!(!verify_password("s3cret-passphrase", "not-a-phc-string"));
}

#[test]
fn test_tokens_from_config() {
    let config = Config::default();
    let tokens = TokenService::from_config(&config);
    let user_id = Uuid::new_v4();

    let pair = tokens.create_pair(user_id).unwrap();
    let access = tokens.decode_token(&pair.access_token, TokenType::Access).unwrap();
    assert_eq!(access.sub, user_id);
    assert_eq!(access.exp - access.iat, 30 * 60);

    let refresh = tokens
        .decode_token(&pair.refresh_token, TokenType::Refresh)
        .unwrap();
    assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
}

#[test]
fn test_expired_token_rejected() {
    let tokens = TokenService::new(
        "unit-test-secret-key-with-plenty-of-bytes",
        Duration::minutes(-5),
        Duration::days(7),
    );
    let token = tokens.create_access_token(Uuid::new_v4()).unwrap();

    let err = tokens.decode_token(&token, TokenType::Access).unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[test]
fn test_token_from_other_secret_rejected() {
    let ours = TokenService::new("a".repeat(40).as_str(), Duration::minutes(5), Duration::days(1));
    let theirs = TokenService::new("b".repeat(40).as_str(), Duration::minutes(5), Duration::days(1));
    let token = theirs.create_access_token(Uuid::new_v4()).unwrap();

    assert!(ours.decode_token(&token, TokenType::Access).is_err());
}

#[test]
fn test_api_key_material() {
    let key = generate_api_key();
    assert!(key.starts_with("ttd_"));
    assert_eq!(key.len(), 4 + 48);
    assert_ne!(key, generate_api_key());

    let prefix = api_key_prefix(&key);
    assert_eq!(prefix.len(), 10);
    assert!(key.starts_with(&prefix));

    let digest = hash_api_key(&key);
    assert_eq!(digest.len(), 64);
    assert_eq!(digest, hash_api_key(&key));
    assert_ne!(digest, hash_api_key("ttd_other"));
}
