use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Voice,
    File,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub trainee_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.trainer_id == user_id || self.trainee_id == user_id
    }

    pub fn other_party(&self, user_id: Uuid) -> Uuid {
        if self.trainer_id == user_id {
            self.trainee_id
        } else {
            self.trainer_id
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub metadata: Option<Json<serde_json::Value>>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Conversation row for the inbox, from the caller's point of view
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub trainee_id: Uuid,
    pub other_user_id: Uuid,
    pub other_user_name: String,
    pub other_user_avatar: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartConversationRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 5000, message = "Message must be between 1 and 5000 characters"))]
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participants() {
        let trainer = Uuid::new_v4();
        let trainee = Uuid::new_v4();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            trainer_id: trainer,
            trainee_id: trainee,
            last_message_at: None,
            created_at: Utc::now(),
        };

        assert!(conversation.is_participant(trainer));
        assert!(conversation.is_participant(trainee));
        assert!(!conversation.is_participant(Uuid::new_v4()));
        assert_eq!(conversation.other_party(trainer), trainee);
        assert_eq!(conversation.other_party(trainee), trainer);
    }

    #[test]
    fn test_message_kind_defaults_to_text() {
        let request: SendMessageRequest = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(request.kind, MessageKind::Text);
    }
}
