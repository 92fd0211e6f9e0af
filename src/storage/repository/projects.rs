use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{prelude::*, PaginatorTrait, QueryOrder, Set, TransactionTrait};
use uuid::Uuid;

use super::{ProjectStore, RepositoryError, SeaOrmRepository};
use crate::models::internal::{NewProject, ProjectChanges, SchemaCache};
use crate::models::Project;
use crate::storage::entities::{
    conversations, messages, project_instructions, project_memory, projects,
};

impl SeaOrmRepository {
    async fn load_project(&self, id: Uuid) -> Result<Project, RepositoryError> {
        projects::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("project {}", id)))
    }
}

fn schema_to_json(schema: &SchemaCache) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(schema).map_err(|e| RepositoryError::InvalidInput(e.to_string()))
}

#[async_trait]
impl ProjectStore for SeaOrmRepository {
    async fn create_project(
        &self,
        owner_id: Uuid,
        project: NewProject,
    ) -> Result<Project, RepositoryError> {
        let now = Utc::now();
        let model = projects::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            name: Set(project.name),
            description: Set(project.description),
            bigquery_project_id: Set(project.bigquery_project_id),
            bigquery_dataset: Set(project.bigquery_dataset),
            credentials_json: Set(None),
            schema_cache: Set(serde_json::json!({})),
            schema_last_updated: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(model.insert(&self.db).await?)
    }

    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>, RepositoryError> {
        Ok(projects::Entity::find()
            .filter(projects::Column::OwnerId.eq(owner_id))
            .order_by_desc(projects::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, RepositoryError> {
        Ok(projects::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Project>, RepositoryError> {
        Ok(projects::Entity::find_by_id(id)
            .filter(projects::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?)
    }

    async fn update_project(
        &self,
        id: Uuid,
        changes: ProjectChanges,
    ) -> Result<Project, RepositoryError> {
        let mut active: projects::ActiveModel = self.load_project(id).await?.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(bq_project) = changes.bigquery_project_id {
            active.bigquery_project_id = Set(Some(bq_project));
        }
        if let Some(dataset) = changes.bigquery_dataset {
            active.bigquery_dataset = Set(Some(dataset));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    async fn delete_project(&self, id: Uuid) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        let conversation_ids: Vec<Uuid> = conversations::Entity::find()
            .filter(conversations::Column::ProjectId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        if !conversation_ids.is_empty() {
            messages::Entity::delete_many()
                .filter(messages::Column::ConversationId.is_in(conversation_ids))
                .exec(&txn)
                .await?;
        }
        conversations::Entity::delete_many()
            .filter(conversations::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        project_memory::Entity::delete_many()
            .filter(project_memory::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        project_instructions::Entity::delete_many()
            .filter(project_instructions::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;

        let result = projects::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(RepositoryError::NotFound(format!("project {}", id)));
        }

        txn.commit().await?;
        tracing::info!("Deleted project: {}", id);
        Ok(())
    }

    async fn save_connection(
        &self,
        id: Uuid,
        credentials_json: &str,
        schema: &SchemaCache,
    ) -> Result<Project, RepositoryError> {
        let mut active: projects::ActiveModel = self.load_project(id).await?.into();
        let now = Utc::now();
        active.credentials_json = Set(Some(credentials_json.to_string()));
        active.schema_cache = Set(schema_to_json(schema)?);
        active.schema_last_updated = Set(Some(now));
        active.updated_at = Set(now);

        Ok(active.update(&self.db).await?)
    }

    async fn save_schema(
        &self,
        id: Uuid,
        schema: &SchemaCache,
    ) -> Result<Project, RepositoryError> {
        let mut active: projects::ActiveModel = self.load_project(id).await?.into();
        let now = Utc::now();
        active.schema_cache = Set(schema_to_json(schema)?);
        active.schema_last_updated = Set(Some(now));
        active.updated_at = Set(now);

        Ok(active.update(&self.db).await?)
    }

    async fn count_projects(&self) -> Result<u64, RepositoryError> {
        Ok(projects::Entity::find().count(&self.db).await?)
    }
}
