//! REST API endpoints for the gateway

pub mod auth;
pub mod channel;
pub mod chatrooms;
pub mod health;
pub mod messages;

use std::sync::Arc;

use axum::{extract::FromRequest, middleware as axum_middleware, routing::get, Router};

use crate::error::GatewayError;
use crate::middleware::auth_middleware;
use crate::state::GatewayState;

/// JSON body whose rejections answer with the gateway error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(GatewayError))]
pub struct ApiJson<T>(pub T);

/// Form body whose rejections answer with the gateway error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(GatewayError))]
pub struct ApiForm<T>(pub T);

/// Create all REST API routes
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let protected = Router::new()
        .merge(auth::create_session_routes())
        .merge(channel::create_channel_routes())
        .merge(chatrooms::create_chatroom_routes())
        .merge(messages::create_message_routes())
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::create_auth_routes())
        .merge(protected)
}
