use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{prelude::*, sea_query::Expr, QueryOrder, Set};
use uuid::Uuid;

use super::{map_unique, ApiKeyStore, RepositoryError, SeaOrmRepository};
use crate::models::internal::NewApiKey;
use crate::models::ApiKey;
use crate::storage::entities::api_keys;

#[async_trait]
impl ApiKeyStore for SeaOrmRepository {
    async fn create_api_key(&self, key: NewApiKey) -> Result<ApiKey, RepositoryError> {
        let model = api_keys::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(key.user_id),
            name: Set(key.name),
            key_hash: Set(key.key_hash),
            key_prefix: Set(key.key_prefix),
            scopes: Set(serde_json::json!(key.scopes)),
            rate_limit_per_minute: Set(key.rate_limit_per_minute),
            rate_limit_per_day: Set(key.rate_limit_per_day),
            is_active: Set(true),
            last_used_at: Set(None),
            expires_at: Set(key.expires_at),
            created_at: Set(Utc::now()),
        };
        model
            .insert(&self.db)
            .await
            .map_err(|e| map_unique(e, "API key already exists"))
    }

    async fn find_api_keys_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, RepositoryError> {
        Ok(api_keys::Entity::find()
            .filter(api_keys::Column::KeyPrefix.eq(prefix))
            .all(&self.db)
            .await?)
    }

    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>, RepositoryError> {
        Ok(api_keys::Entity::find()
            .filter(api_keys::Column::UserId.eq(user_id))
            .order_by_desc(api_keys::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn deactivate_api_key(&self, user_id: Uuid, id: Uuid) -> Result<(), RepositoryError> {
        let key = api_keys::Entity::find_by_id(id)
            .filter(api_keys::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("api key {}", id)))?;

        let mut active: api_keys::ActiveModel = key.into();
        active.is_active = Set(false);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        api_keys::Entity::update_many()
            .col_expr(api_keys::Column::LastUsedAt, Expr::value(Some(at)))
            .filter(api_keys::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
