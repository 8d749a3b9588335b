use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    sanitize_text, Conversation, ConversationSummary, Message, PageParams, Paginated,
    SendMessageRequest, User,
};

#[derive(Debug, Clone)]
pub struct ChatService {
    db: PgPool,
}

impl ChatService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get or create the conversation between a trainer and one of their trainees
    pub async fn start_conversation(&self, actor: &UserSession, other_user_id: Uuid) -> ApiResult<Conversation> {
        let other = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active")
            .bind(other_user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))?;

        let (trainer_id, trainee_id) = match (actor.role, other.role) {
            (UserRole::Trainer, UserRole::Trainee) if other.trainer_id == Some(actor.user_id) => {
                (actor.user_id, other.id)
            }
            (UserRole::Trainee, UserRole::Trainer) => {
                let assigned: Option<Uuid> =
                    sqlx::query_scalar("SELECT trainer_id FROM users WHERE id = $1")
                        .bind(actor.user_id)
                        .fetch_one(&self.db)
                        .await?;
                if assigned != Some(other.id) {
                    return Err(ApiError::Forbidden("You can only message your own trainer".to_string()));
                }
                (other.id, actor.user_id)
            }
            _ => {
                return Err(ApiError::Forbidden(
                    "Conversations are only available between a trainer and their trainees".to_string(),
                ))
            }
        };

        let conversation = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (id, trainer_id, trainee_id) VALUES ($1, $2, $3)
             ON CONFLICT (trainer_id, trainee_id) DO UPDATE SET trainer_id = EXCLUDED.trainer_id
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(trainee_id)
        .fetch_one(&self.db)
        .await?;

        Ok(conversation)
    }

    /// Inbox with the last message and unread count, most recent first
    pub async fn list_conversations(&self, actor: &UserSession) -> ApiResult<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            "SELECT c.id, c.trainer_id, c.trainee_id,
                    o.id AS other_user_id, o.name AS other_user_name, o.avatar AS other_user_avatar,
                    last.content AS last_message,
                    c.last_message_at,
                    (SELECT COUNT(*) FROM messages m
                      WHERE m.conversation_id = c.id AND m.sender_id <> $1 AND NOT m.is_read) AS unread_count
             FROM conversations c
             JOIN users o ON o.id = CASE WHEN c.trainer_id = $1 THEN c.trainee_id ELSE c.trainer_id END
             LEFT JOIN LATERAL (
                 SELECT content FROM messages m
                 WHERE m.conversation_id = c.id
                 ORDER BY m.created_at DESC
                 LIMIT 1
             ) last ON TRUE
             WHERE c.trainer_id = $1 OR c.trainee_id = $1
             ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC",
        )
        .bind(actor.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(conversations)
    }

    /// Pages count back from the newest message; each page is returned oldest-first
    pub async fn get_messages(
        &self,
        actor: &UserSession,
        conversation_id: Uuid,
        page: PageParams,
    ) -> ApiResult<Paginated<Message>> {
        let conversation = self.participant_conversation(actor, conversation_id).await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
            .bind(conversation.id)
            .fetch_one(&self.db)
            .await?;

        let mut messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE conversation_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(conversation.id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;
        messages.reverse();

        Ok(Paginated::new(messages, page, total))
    }

    pub async fn send_message(
        &self,
        actor: &UserSession,
        conversation_id: Uuid,
        request: SendMessageRequest,
    ) -> ApiResult<Message> {
        let conversation = self.participant_conversation(actor, conversation_id).await?;

        let content = sanitize_text(&request.content);
        if content.is_empty() {
            return Err(ApiError::field("content", "Message cannot be empty"));
        }

        let mut tx = self.db.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (id, conversation_id, sender_id, content, kind, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(conversation.id)
        .bind(actor.user_id)
        .bind(&content)
        .bind(request.kind)
        .bind(request.metadata.map(Json))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = $1 WHERE id = $2")
            .bind(message.created_at)
            .bind(conversation.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            conversation_id = %conversation.id,
            recipient = %conversation.other_party(actor.user_id),
            "Message sent"
        );
        Ok(message)
    }

    /// Marks the other party's messages as read; returns how many changed
    pub async fn mark_as_read(&self, actor: &UserSession, conversation_id: Uuid) -> ApiResult<u64> {
        let conversation = self.participant_conversation(actor, conversation_id).await?;

        let updated = sqlx::query(
            "UPDATE messages SET is_read = TRUE, read_at = NOW()
             WHERE conversation_id = $1 AND sender_id <> $2 AND NOT is_read",
        )
        .bind(conversation.id)
        .bind(actor.user_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        Ok(updated)
    }

    pub async fn unread_count(&self, actor: &UserSession) -> ApiResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m
             JOIN conversations c ON c.id = m.conversation_id
             WHERE (c.trainer_id = $1 OR c.trainee_id = $1) AND m.sender_id <> $1 AND NOT m.is_read",
        )
        .bind(actor.user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn participant_conversation(&self, actor: &UserSession, conversation_id: Uuid) -> ApiResult<Conversation> {
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.db)
            .await?
            .filter(|conversation| conversation.is_participant(actor.user_id))
            .ok_or_else(|| ApiError::not_found("Conversation"))
    }
}
