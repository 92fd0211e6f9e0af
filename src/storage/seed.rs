use crate::auth::hash_password;
use crate::storage::repository::{Repository, RepositoryError};

/// Creates the bootstrap superuser unless an account with that email exists.
/// Returns true when a user was created.
pub async fn ensure_admin(
    repo: &dyn Repository,
    email: &str,
    password: &str,
) -> Result<bool, RepositoryError> {
    if repo.find_user_by_email(email).await?.is_some() {
        tracing::debug!("Admin user already present: {}", email);
        return Ok(false);
    }

    let hashed = hash_password(password)
        .map_err(|e| RepositoryError::InvalidInput(e.to_string()))?;
    repo.create_user(email, &hashed, Some("Administrator".to_string()), true)
        .await?;
    tracing::info!("Created admin user: {}", email);
    Ok(true)
}
