use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::Result,
    middleware::AuthUser,
    state::AppState,
};

use super::{
    message_dto::{
        ConversationQuery, MessageQuery, SendMessageRequest, StartConversationRequest,
        UnreadCountResponse,
    },
    message_models::{ConversationDetails, ConversationSummary, MessageResponse, ThreadResponse},
};

/// List the caller's conversations, most recently active first
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    params(ConversationQuery),
    responses(
        (status = 200, description = "Conversation summaries", body = Vec<ConversationSummary>),
        (status = 400, description = "Invalid paging parameters"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ConversationQuery>,
) -> Result<impl IntoResponse> {
    query.validate()?;

    let conversations = state
        .message_service
        .list_conversations(user_id, query.page())
        .await?;

    Ok((StatusCode::OK, Json(conversations)))
}

/// Open (or reuse) a conversation with another user, optionally about a product
#[utoipa::path(
    post,
    path = "/api/conversations",
    tag = "conversations",
    request_body = StartConversationRequest,
    responses(
        (status = 200, description = "Conversation", body = ConversationDetails),
        (status = 400, description = "Cannot converse with yourself"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User or product not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn start_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<StartConversationRequest>,
) -> Result<impl IntoResponse> {
    let conversation = state
        .message_service
        .start_conversation(user_id, payload.participant_id, payload.product_id)
        .await?;

    Ok((StatusCode::OK, Json(conversation)))
}

/// Fetch a conversation's messages; marks the other party's messages as read
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "conversations",
    params(
        ("id" = Uuid, Path, description = "Conversation id"),
        MessageQuery
    ),
    responses(
        (status = 200, description = "Thread", body = ThreadResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    query.validate()?;

    let thread = state
        .message_service
        .get_messages(user_id, conversation_id, query.cursor())
        .await?;

    Ok((StatusCode::OK, Json(thread)))
}

/// Send a message to a conversation
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    tag = "conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Empty or invalid content"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let message = state
        .message_service
        .send_message(
            user_id,
            conversation_id,
            &payload.content,
            payload.attachment_url.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Count unread messages addressed to the caller
#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    tag = "messages",
    responses(
        (status = 200, description = "Unread message count", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse> {
    let count = state.message_service.get_unread_count(user_id).await?;

    Ok((StatusCode::OK, Json(UnreadCountResponse { count })))
}

/// Mark a single message as read
#[utoipa::path(
    patch,
    path = "/api/messages/{id}/read",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Message id")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Message not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_message_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state
        .message_service
        .mark_message_read(user_id, message_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
