use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{prelude::*, ConnectionTrait, QueryOrder, QuerySelect, Set, TransactionTrait};
use uuid::Uuid;

use super::{ConversationStore, RepositoryError, SeaOrmRepository};
use crate::models::internal::{ROLE_ASSISTANT, ROLE_USER};
use crate::models::{Conversation, Message};
use crate::storage::entities::{conversations, messages};

const TITLE_MAX_CHARS: usize = 100;

#[async_trait]
impl ConversationStore for SeaOrmRepository {
    async fn create_conversation(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        title: Option<String>,
    ) -> Result<Conversation, RepositoryError> {
        let now = Utc::now();
        let model = conversations::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project_id),
            user_id: Set(user_id),
            title: Set(title),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, RepositoryError> {
        Ok(conversations::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_conversations(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        Ok(conversations::Entity::find()
            .filter(conversations::Column::ProjectId.eq(project_id))
            .filter(conversations::Column::UserId.eq(user_id))
            .order_by_desc(conversations::Column::UpdatedAt)
            .all(&self.db)
            .await?)
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        messages::Entity::delete_many()
            .filter(messages::Column::ConversationId.eq(id))
            .exec(&txn)
            .await?;
        let result = conversations::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(RepositoryError::NotFound(format!("conversation {}", id)));
        }
        txn.commit().await?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, RepositoryError> {
        Ok(messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .order_by_asc(messages::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut recent = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .order_by_desc(messages::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        recent.reverse();
        Ok(recent)
    }

    async fn append_exchange(
        &self,
        conversation_id: Uuid,
        question: &str,
        answer: &str,
        answer_tokens: i32,
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        append_exchange_in(&txn, conversation_id, question, answer, answer_tokens).await?;
        txn.commit().await?;
        Ok(())
    }
}

/// Writes the user/assistant pair on `db`, which callers hold inside a
/// transaction.
pub(super) async fn append_exchange_in<C: ConnectionTrait>(
    db: &C,
    conversation_id: Uuid,
    question: &str,
    answer: &str,
    answer_tokens: i32,
) -> Result<(), RepositoryError> {
    let conversation = conversations::Entity::find_by_id(conversation_id)
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("conversation {}", conversation_id)))?;

    // Never earlier than the previous answer, so history stays ordered.
    let now = Utc::now().max(conversation.updated_at + Duration::milliseconds(1));
    messages::ActiveModel {
        id: Set(Uuid::new_v4()),
        conversation_id: Set(conversation_id),
        role: Set(ROLE_USER.to_string()),
        content: Set(question.to_string()),
        tokens_used: Set(0),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    // Keeps the pair ordered when timestamps collide.
    let answered_at = now + Duration::milliseconds(1);
    messages::ActiveModel {
        id: Set(Uuid::new_v4()),
        conversation_id: Set(conversation_id),
        role: Set(ROLE_ASSISTANT.to_string()),
        content: Set(answer.to_string()),
        tokens_used: Set(answer_tokens),
        created_at: Set(answered_at),
    }
    .insert(db)
    .await?;

    let untitled = conversation.title.is_none();
    let mut active: conversations::ActiveModel = conversation.into();
    if untitled {
        active.title = Set(Some(question.chars().take(TITLE_MAX_CHARS).collect()));
    }
    active.updated_at = Set(answered_at);
    active.update(db).await?;
    Ok(())
}
