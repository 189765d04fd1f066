//! Relay of chatroom channel events to WebSocket clients

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use parley_realtime::EventStream;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct ChannelSubscribeQuery {
    pub channel: String,
    /// Token handed out by `/api/auth/pusher` for this channel.
    pub auth: String,
}

/// Upgrade to a WebSocket that streams every event published on one private channel.
pub async fn channel_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
    Query(query): Query<ChannelSubscribeQuery>,
) -> GatewayResult<Response> {
    let claims = state
        .channel_authorizer()
        .verify(&query.auth, &query.channel)?;
    if claims.sub != current.user.public_id {
        return Err(GatewayError::AuthenticationFailed(
            "channel token was issued to another user".to_string(),
        ));
    }

    // Membership may have ended since the token was signed.
    state
        .chatroom_service()
        .authorize_channel(&current.user, &query.channel)
        .await?;

    let events = state.broadcaster().subscribe(&query.channel).await?;
    info!(
        channel = %query.channel,
        user = %current.user.public_id,
        socket = %claims.socket_id,
        "channel subscription opened"
    );

    let channel = query.channel;
    Ok(ws.on_upgrade(move |socket| relay_channel(socket, channel, events)))
}

async fn relay_channel(socket: WebSocket, channel: String, mut events: EventStream) {
    let (mut sender, mut receiver) = socket.split();

    let subscribed = json!({
        "event": "subscription:succeeded",
        "data": { "channel": channel },
    });
    if sender
        .send(Message::Text(subscribed.to_string()))
        .await
        .is_err()
    {
        return;
    }

    let forward_channel = channel.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(envelope) = events.next().await {
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(error) => {
                    warn!(channel = %forward_channel, error = %error, "dropping unserializable event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Clients only listen; anything but a close frame is ignored.
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    debug!(channel = %channel, "channel subscription closed");
}
