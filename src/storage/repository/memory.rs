use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{prelude::*, QueryOrder, Set};
use uuid::Uuid;

use super::{MemoryStore, RepositoryError, SeaOrmRepository};
use crate::models::internal::{InstructionChanges, MemoryItemChanges, NewInstruction, NewMemoryItem};
use crate::models::{GlobalInstruction, ProjectInstruction, ProjectMemoryItem};
use crate::storage::entities::{global_instructions, project_instructions, project_memory};

#[async_trait]
impl MemoryStore for SeaOrmRepository {
    // ==================== GLOBAL INSTRUCTIONS ====================

    async fn create_global_instruction(
        &self,
        instruction: NewInstruction,
    ) -> Result<GlobalInstruction, RepositoryError> {
        let now = Utc::now();
        let model = global_instructions::ActiveModel {
            id: Set(Uuid::new_v4()),
            instruction_text: Set(instruction.instruction_text),
            category: Set(instruction.category),
            priority: Set(instruction.priority),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn list_global_instructions(
        &self,
        active_only: bool,
    ) -> Result<Vec<GlobalInstruction>, RepositoryError> {
        let mut query = global_instructions::Entity::find();
        if active_only {
            query = query.filter(global_instructions::Column::Active.eq(true));
        }
        Ok(query
            .order_by_asc(global_instructions::Column::Priority)
            .order_by_asc(global_instructions::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn update_global_instruction(
        &self,
        id: Uuid,
        changes: InstructionChanges,
    ) -> Result<GlobalInstruction, RepositoryError> {
        let existing = global_instructions::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("instruction {}", id)))?;

        let mut active: global_instructions::ActiveModel = existing.into();
        if let Some(text) = changes.instruction_text {
            active.instruction_text = Set(text);
        }
        if let Some(category) = changes.category {
            active.category = Set(Some(category));
        }
        if let Some(priority) = changes.priority {
            active.priority = Set(priority);
        }
        if let Some(flag) = changes.active {
            active.active = Set(flag);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    async fn delete_global_instruction(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = global_instructions::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("instruction {}", id)));
        }
        Ok(())
    }

    // ==================== PROJECT MEMORY ====================

    async fn create_memory_item(
        &self,
        project_id: Uuid,
        item: NewMemoryItem,
    ) -> Result<ProjectMemoryItem, RepositoryError> {
        let now = Utc::now();
        let model = project_memory::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project_id),
            memory_type: Set(item.memory_type),
            key: Set(item.key),
            content: Set(item.content),
            created_by: Set(item.created_by),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn list_memory_items(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMemoryItem>, RepositoryError> {
        Ok(project_memory::Entity::find()
            .filter(project_memory::Column::ProjectId.eq(project_id))
            .order_by_asc(project_memory::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn update_memory_item(
        &self,
        project_id: Uuid,
        id: Uuid,
        changes: MemoryItemChanges,
    ) -> Result<ProjectMemoryItem, RepositoryError> {
        let existing = project_memory::Entity::find_by_id(id)
            .filter(project_memory::Column::ProjectId.eq(project_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("memory item {}", id)))?;

        let mut active: project_memory::ActiveModel = existing.into();
        if let Some(memory_type) = changes.memory_type {
            active.memory_type = Set(memory_type);
        }
        if let Some(key) = changes.key {
            active.key = Set(key);
        }
        if let Some(content) = changes.content {
            active.content = Set(content);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    async fn delete_memory_item(
        &self,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<(), RepositoryError> {
        let result = project_memory::Entity::delete_many()
            .filter(project_memory::Column::Id.eq(id))
            .filter(project_memory::Column::ProjectId.eq(project_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("memory item {}", id)));
        }
        Ok(())
    }

    // ==================== PROJECT INSTRUCTIONS ====================

    async fn create_project_instruction(
        &self,
        project_id: Uuid,
        instruction: NewInstruction,
    ) -> Result<ProjectInstruction, RepositoryError> {
        let now = Utc::now();
        let model = project_instructions::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project_id),
            instruction_text: Set(instruction.instruction_text),
            priority: Set(instruction.priority),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn list_project_instructions(
        &self,
        project_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<ProjectInstruction>, RepositoryError> {
        let mut query = project_instructions::Entity::find()
            .filter(project_instructions::Column::ProjectId.eq(project_id));
        if active_only {
            query = query.filter(project_instructions::Column::Active.eq(true));
        }
        Ok(query
            .order_by_asc(project_instructions::Column::Priority)
            .order_by_asc(project_instructions::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn update_project_instruction(
        &self,
        project_id: Uuid,
        id: Uuid,
        changes: InstructionChanges,
    ) -> Result<ProjectInstruction, RepositoryError> {
        let existing = project_instructions::Entity::find_by_id(id)
            .filter(project_instructions::Column::ProjectId.eq(project_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("instruction {}", id)))?;

        let mut active: project_instructions::ActiveModel = existing.into();
        if let Some(text) = changes.instruction_text {
            active.instruction_text = Set(text);
        }
        if let Some(priority) = changes.priority {
            active.priority = Set(priority);
        }
        if let Some(flag) = changes.active {
            active.active = Set(flag);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    async fn delete_project_instruction(
        &self,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<(), RepositoryError> {
        let result = project_instructions::Entity::delete_many()
            .filter(project_instructions::Column::Id.eq(id))
            .filter(project_instructions::Column::ProjectId.eq(project_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("instruction {}", id)));
        }
        Ok(())
    }
}
