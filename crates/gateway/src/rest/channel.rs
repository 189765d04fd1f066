//! Private channel authorization for realtime clients

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use parley_realtime::ChannelAuthorization;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, GatewayResult};
use crate::middleware::CurrentUser;
use crate::rest::ApiForm;
use crate::state::GatewayState;

/// Form posted by the client library before subscribing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChannelAuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelAuthResponse {
    pub auth: String,
    pub channel_data: String,
}

impl From<ChannelAuthorization> for ChannelAuthResponse {
    fn from(grant: ChannelAuthorization) -> Self {
        Self {
            auth: grant.auth,
            channel_data: grant.channel_data,
        }
    }
}

pub fn create_channel_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/auth/pusher", post(authorize_channel))
}

#[utoipa::path(
    post,
    path = "/api/auth/pusher",
    tag = "Realtime",
    request_body(content = ChannelAuthRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Signed permission to subscribe", body = ChannelAuthResponse),
        (status = 400, description = "Not a chatroom channel", body = ErrorResponse),
        (status = 401, description = "Caller is not a member of the chatroom", body = ErrorResponse)
    )
)]
pub async fn authorize_channel(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    ApiForm(form): ApiForm<ChannelAuthRequest>,
) -> GatewayResult<Json<ChannelAuthResponse>> {
    let chatroom = state
        .chatroom_service()
        .authorize_channel(&current.user, &form.channel_name)
        .await?;

    let grant = state.channel_authorizer().authorize(
        &form.socket_id,
        &form.channel_name,
        &current.user.public_id,
        &current.user.email,
    )?;

    debug!(
        chatroom = %chatroom.public_id,
        user = %current.user.public_id,
        socket = %form.socket_id,
        "channel authorized"
    );
    Ok(Json(grant.into()))
}
