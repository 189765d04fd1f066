//! Message REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use parley_chats::{MessageChange, MessageHistory, PostMessage};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, GatewayResult};
use crate::middleware::CurrentUser;
use crate::rest::ApiJson;
use crate::state::GatewayState;

/// Plain acknowledgement returned by message writes.
const OK: &str = "OK";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

/// The full message as the client holds it, plus its id.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMessageRequest {
    pub message_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

impl From<CreateMessageRequest> for PostMessage {
    fn from(request: CreateMessageRequest) -> Self {
        Self {
            sender_id: request.sender_id,
            content: request.content,
            highlight: request.highlight,
            visible: request.visible,
        }
    }
}

impl From<ChangeMessageRequest> for MessageChange {
    fn from(request: ChangeMessageRequest) -> Self {
        Self {
            message_id: request.message_id,
            sender_id: request.sender_id,
            content: request.content,
            highlight: request.highlight,
            visible: request.visible,
        }
    }
}

pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new().route(
        "/api/messages/:chatroom_id",
        get(list_messages)
            .post(create_message)
            .put(update_message)
            .delete(delete_message),
    )
}

#[utoipa::path(
    get,
    path = "/api/messages/{chatroom_id}",
    tag = "Messages",
    params(("chatroom_id" = String, Path, description = "Chatroom id")),
    responses(
        (status = 200, description = "Chatroom id with its messages in creation order, or null when there are none"),
        (status = 404, description = "Chatroom not found", body = ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Path(chatroom_id): Path<String>,
) -> GatewayResult<Json<Option<MessageHistory>>> {
    let history = state
        .message_service()
        .list(&chatroom_id, &current.user)
        .await?;
    Ok(Json(history))
}

#[utoipa::path(
    post,
    path = "/api/messages/{chatroom_id}",
    tag = "Messages",
    params(("chatroom_id" = String, Path, description = "Chatroom id")),
    request_body = CreateMessageRequest,
    responses(
        (status = 200, description = "Message stored and published"),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 403, description = "Sender is not the caller", body = ErrorResponse),
        (status = 404, description = "Chatroom not found", body = ErrorResponse)
    )
)]
pub async fn create_message(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Path(chatroom_id): Path<String>,
    ApiJson(payload): ApiJson<CreateMessageRequest>,
) -> GatewayResult<Json<&'static str>> {
    state
        .message_service()
        .post(&chatroom_id, &current.user, payload.into())
        .await?;
    Ok(Json(OK))
}

#[utoipa::path(
    put,
    path = "/api/messages/{chatroom_id}",
    tag = "Messages",
    params(("chatroom_id" = String, Path, description = "Chatroom id")),
    request_body = ChangeMessageRequest,
    responses(
        (status = 200, description = "Highlight and visibility updated and published"),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 404, description = "Chatroom or message not found", body = ErrorResponse)
    )
)]
pub async fn update_message(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Path(chatroom_id): Path<String>,
    ApiJson(payload): ApiJson<ChangeMessageRequest>,
) -> GatewayResult<Json<&'static str>> {
    state
        .message_service()
        .update(&chatroom_id, &current.user, payload.into())
        .await?;
    Ok(Json(OK))
}

#[utoipa::path(
    delete,
    path = "/api/messages/{chatroom_id}",
    tag = "Messages",
    params(("chatroom_id" = String, Path, description = "Chatroom id")),
    request_body = ChangeMessageRequest,
    responses(
        (status = 200, description = "Message removed and the remaining list published"),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 404, description = "Chatroom or message not found", body = ErrorResponse)
    )
)]
pub async fn delete_message(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Path(chatroom_id): Path<String>,
    ApiJson(payload): ApiJson<ChangeMessageRequest>,
) -> GatewayResult<Json<&'static str>> {
    state
        .message_service()
        .delete(&chatroom_id, &current.user, payload.into())
        .await?;
    Ok(Json(OK))
}
