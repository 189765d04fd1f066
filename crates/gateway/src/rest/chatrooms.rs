//! Chatroom REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parley_chats::{
    ChatroomDetails, ChatroomOverview, ChatroomSummary, InviteOutcome, UpdateChatroom,
};
use parley_database::Chatroom;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ErrorResponse, GatewayError, GatewayResult};
use crate::middleware::CurrentUser;
use crate::rest::ApiJson;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatroomIdResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatroomListResponse {
    pub chatrooms: Vec<Chatroom>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub to_user: String,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SearchChatroomQuery {
    pub username: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateChatroomRequest {
    #[serde(default)]
    pub image: Option<String>,
}

impl From<UpdateChatroomRequest> for UpdateChatroom {
    fn from(request: UpdateChatroomRequest) -> Self {
        Self {
            image: request.image,
        }
    }
}

pub fn create_chatroom_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/chatrooms", get(list_chatrooms).post(create_chatroom))
        .route("/api/chatrooms/latest", get(latest_chatroom))
        .route("/api/chatrooms/overview", get(chatroom_overview))
        .route("/api/chatrooms/invite", post(invite_user))
        .route("/api/chatrooms/search", get(search_chatroom))
        .route(
            "/api/chatrooms/:chatroom_id",
            get(get_chatroom).put(update_chatroom).delete(delete_chatroom),
        )
}

#[utoipa::path(
    get,
    path = "/api/chatrooms",
    tag = "Chatrooms",
    responses(
        (status = 200, description = "Chatrooms the caller belongs to, oldest first"),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn list_chatrooms(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
) -> GatewayResult<Json<ChatroomListResponse>> {
    let chatrooms = state.chatroom_service().list(&current.user).await?;
    Ok(Json(ChatroomListResponse { chatrooms }))
}

#[utoipa::path(
    post,
    path = "/api/chatrooms",
    tag = "Chatrooms",
    responses(
        (status = 201, description = "Chatroom created with the caller as its only member", body = ChatroomIdResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn create_chatroom(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
) -> GatewayResult<(StatusCode, Json<ChatroomIdResponse>)> {
    let chatroom = state.chatroom_service().create(&current.user).await?;
    Ok((
        StatusCode::CREATED,
        Json(ChatroomIdResponse {
            id: chatroom.public_id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/chatrooms/latest",
    tag = "Chatrooms",
    responses(
        (status = 200, description = "Most recently created chatroom of the caller"),
        (status = 404, description = "Caller has no chatroom", body = ErrorResponse)
    )
)]
pub async fn latest_chatroom(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
) -> GatewayResult<Json<Chatroom>> {
    state
        .chatroom_service()
        .latest(&current.user)
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound("No chatroom yet".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/chatrooms/overview",
    tag = "Chatrooms",
    responses(
        (status = 200, description = "Shared chatrooms with their other members and last message"),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn chatroom_overview(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
) -> GatewayResult<Json<Vec<ChatroomOverview>>> {
    Ok(Json(state.chatroom_service().overview(&current.user).await?))
}

#[utoipa::path(
    post,
    path = "/api/chatrooms/invite",
    tag = "Chatrooms",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Chatroom opened with the invited user", body = ChatroomIdResponse),
        (status = 404, description = "No user with that username", body = ErrorResponse),
        (status = 409, description = "A chatroom with that user already exists", body = ChatroomIdResponse)
    )
)]
pub async fn invite_user(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    ApiJson(payload): ApiJson<InviteRequest>,
) -> GatewayResult<Response> {
    let outcome = state
        .chatroom_service()
        .invite(&current.user, &payload.to_user)
        .await?;

    let response = match outcome {
        InviteOutcome::Created(id) => {
            (StatusCode::CREATED, Json(ChatroomIdResponse { id })).into_response()
        }
        InviteOutcome::AlreadyShared(id) => {
            (StatusCode::CONFLICT, Json(ChatroomIdResponse { id })).into_response()
        }
        InviteOutcome::UserNotFound => {
            return Err(GatewayError::NotFound(format!(
                "User not found: {}",
                payload.to_user.trim()
            )))
        }
    };

    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/chatrooms/search",
    tag = "Chatrooms",
    params(SearchChatroomQuery),
    responses(
        (status = 200, description = "Chatroom shared with the user", body = ChatroomIdResponse),
        (status = 404, description = "Unknown user or no shared chatroom", body = ErrorResponse)
    )
)]
pub async fn search_chatroom(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Query(params): Query<SearchChatroomQuery>,
) -> GatewayResult<Json<ChatroomIdResponse>> {
    state
        .chatroom_service()
        .find_shared(&current.user, &params.username)
        .await?
        .map(|id| Json(ChatroomIdResponse { id }))
        .ok_or_else(|| {
            GatewayError::NotFound(format!("No chatroom shared with {}", params.username))
        })
}

#[utoipa::path(
    get,
    path = "/api/chatrooms/{chatroom_id}",
    tag = "Chatrooms",
    params(("chatroom_id" = String, Path, description = "Chatroom id")),
    responses(
        (status = 200, description = "Chatroom id and its members"),
        (status = 404, description = "Chatroom not found", body = ErrorResponse)
    )
)]
pub async fn get_chatroom(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Path(chatroom_id): Path<String>,
) -> GatewayResult<Json<ChatroomDetails>> {
    Ok(Json(
        state
            .chatroom_service()
            .details(&chatroom_id, &current.user)
            .await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/chatrooms/{chatroom_id}",
    tag = "Chatrooms",
    params(("chatroom_id" = String, Path, description = "Chatroom id")),
    request_body = UpdateChatroomRequest,
    responses(
        (status = 200, description = "Chatroom id and image after the update"),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 404, description = "Chatroom not found", body = ErrorResponse)
    )
)]
pub async fn update_chatroom(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Path(chatroom_id): Path<String>,
    ApiJson(payload): ApiJson<UpdateChatroomRequest>,
) -> GatewayResult<Json<ChatroomSummary>> {
    let summary = state
        .chatroom_service()
        .update(&chatroom_id, &current.user, payload.into())
        .await?;
    Ok(Json(summary))
}

#[utoipa::path(
    delete,
    path = "/api/chatrooms/{chatroom_id}",
    tag = "Chatrooms",
    params(("chatroom_id" = String, Path, description = "Chatroom id")),
    responses(
        (status = 204, description = "Chatroom deleted with its members and messages"),
        (status = 404, description = "Chatroom not found", body = ErrorResponse)
    )
)]
pub async fn delete_chatroom(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Path(chatroom_id): Path<String>,
) -> GatewayResult<StatusCode> {
    state
        .chatroom_service()
        .delete(&chatroom_id, &current.user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
