use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::error::ApiResult;
use crate::models::{
    Conversation, ConversationSummary, Message, PageParams, Paginated, SendMessageRequest,
    StartConversationRequest,
};
use crate::services::ChatService;

/// Trainer and trainee messaging
pub fn chat_routes(chat_service: ChatService, auth_service: AuthService) -> Router {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(start_conversation),
        )
        .route(
            "/conversations/:id/messages",
            get(get_messages).post(send_message),
        )
        .route("/conversations/:id/read", post(mark_as_read))
        .route("/unread-count", get(unread_count))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(chat_service)
}

#[tracing::instrument(skip(chat_service, session), fields(user_id = %session.user_id))]
async fn list_conversations(
    State(chat_service): State<ChatService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<ApiResponse<Vec<ConversationSummary>>> {
    Ok(ApiResponse::ok(chat_service.list_conversations(&session).await?))
}

#[tracing::instrument(skip(chat_service, session, request), fields(user_id = %session.user_id))]
async fn start_conversation(
    State(chat_service): State<ChatService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<StartConversationRequest>,
) -> ApiResult<ApiResponse<Conversation>> {
    let conversation = chat_service
        .start_conversation(&session, request.user_id)
        .await?;
    Ok(ApiResponse::ok(conversation))
}

#[tracing::instrument(skip(chat_service, session), fields(user_id = %session.user_id))]
async fn get_messages(
    State(chat_service): State<ChatService>,
    Extension(session): Extension<UserSession>,
    Path(conversation_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<Message>>> {
    let messages = chat_service
        .get_messages(&session, conversation_id, page)
        .await?;
    Ok(ApiResponse::ok(messages))
}

#[tracing::instrument(skip(chat_service, session, request), fields(user_id = %session.user_id))]
async fn send_message(
    State(chat_service): State<ChatService>,
    Extension(session): Extension<UserSession>,
    Path(conversation_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> ApiResult<ApiResponse<Message>> {
    let message = chat_service
        .send_message(&session, conversation_id, request)
        .await?;
    Ok(ApiResponse::created("Message sent", message))
}

async fn mark_as_read(
    State(chat_service): State<ChatService>,
    Extension(session): Extension<UserSession>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Value>> {
    let updated = chat_service.mark_as_read(&session, conversation_id).await?;
    Ok(ApiResponse::ok(json!({ "marked_read": updated })))
}

async fn unread_count(
    State(chat_service): State<ChatService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<ApiResponse<Value>> {
    let count = chat_service.unread_count(&session).await?;
    Ok(ApiResponse::ok(json!({ "unread_count": count })))
}
