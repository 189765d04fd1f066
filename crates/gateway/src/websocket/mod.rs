//! WebSocket endpoints for the gateway

pub mod channel;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

pub use channel::channel_websocket_handler;

/// Create all WebSocket routes
pub fn create_websocket_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/ws", get(channel_websocket_handler))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware))
}
