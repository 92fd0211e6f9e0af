use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{prelude::*, PaginatorTrait, Set};
use uuid::Uuid;

use super::{map_unique, RepositoryError, SeaOrmRepository, UserStore};
use crate::models::internal::UserChanges;
use crate::models::User;
use crate::storage::entities::users;

#[async_trait]
impl UserStore for SeaOrmRepository {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<String>,
        is_superuser: bool,
    ) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let model = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.trim().to_lowercase()),
            hashed_password: Set(hashed_password.to_string()),
            full_name: Set(full_name),
            is_active: Set(true),
            is_superuser: Set(is_superuser),
            preferences: Set(serde_json::json!({})),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let user = model
            .insert(&self.db)
            .await
            .map_err(|e| map_unique(e, "Email already registered"))?;
        tracing::info!("Created user: {}", user.id);
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(users::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await?)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, RepositoryError> {
        let user = users::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;

        let mut active: users::ActiveModel = user.into();
        if let Some(email) = changes.email {
            active.email = Set(email.trim().to_lowercase());
        }
        if let Some(full_name) = changes.full_name {
            active.full_name = Set(Some(full_name));
        }
        if let Some(hashed) = changes.hashed_password {
            active.hashed_password = Set(hashed);
        }
        if let Some(preferences) = changes.preferences {
            active.preferences = Set(preferences);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(&self.db)
            .await
            .map_err(|e| map_unique(e, "Email already registered"))
    }

    async fn count_users(&self) -> Result<u64, RepositoryError> {
        Ok(users::Entity::find().count(&self.db).await?)
    }
}
