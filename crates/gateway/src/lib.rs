//! # Parley Gateway Crate
//!
//! HTTP surface of Parley: REST endpoints for sessions, chatrooms and
//! messages, private channel authorization, and a WebSocket relay that
//! streams chatroom events to subscribed clients.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parley_gateway::{create_gateway_state, create_router};
//!
//! let state = create_gateway_state(pool, &config, broadcaster);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use middleware::{auth_middleware, CurrentUser};
pub use state::{create_gateway_state, GatewayState};

use std::sync::Arc;

use axum::{
    http::{header, Method},
    middleware as axum_middleware, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        rest::health::health_check,
        rest::auth::credentials_login,
        rest::auth::github_login,
        rest::auth::github_callback,
        rest::auth::logout,
        rest::auth::me,
        rest::channel::authorize_channel,
        rest::chatrooms::list_chatrooms,
        rest::chatrooms::create_chatroom,
        rest::chatrooms::latest_chatroom,
        rest::chatrooms::chatroom_overview,
        rest::chatrooms::invite_user,
        rest::chatrooms::search_chatroom,
        rest::chatrooms::get_chatroom,
        rest::chatrooms::update_chatroom,
        rest::chatrooms::delete_chatroom,
        rest::messages::list_messages,
        rest::messages::create_message,
        rest::messages::update_message,
        rest::messages::delete_message,
    ),
    components(
        schemas(
            error::ErrorResponse,
            rest::health::HealthResponse,
            rest::auth::CredentialsRequest,
            rest::auth::GithubLoginResponse,
            rest::auth::GithubLoginQuery,
            rest::auth::GithubCallbackRequest,
            rest::auth::SessionResponse,
            rest::auth::UserResponse,
            rest::channel::ChannelAuthRequest,
            rest::channel::ChannelAuthResponse,
            rest::chatrooms::ChatroomIdResponse,
            rest::chatrooms::InviteRequest,
            rest::chatrooms::SearchChatroomQuery,
            rest::chatrooms::UpdateChatroomRequest,
            rest::messages::CreateMessageRequest,
            rest::messages::ChangeMessageRequest,
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Sessions and sign-in"),
        (name = "Realtime", description = "Private channel authorization"),
        (name = "Chatrooms", description = "Chatroom management"),
        (name = "Messages", description = "Message management"),
    )
)]
pub struct ApiDoc;

/// Create the main application router with all routes
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let mut router = Router::new()
        .merge(rest::create_rest_routes(state.clone()))
        .merge(websocket::create_websocket_routes(state.clone()))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(TraceLayer::new_for_http());

    if cfg!(debug_assertions) {
        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}
