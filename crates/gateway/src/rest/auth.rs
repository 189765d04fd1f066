//! Authentication REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parley_auth::{AuthSession, Credentials};
use parley_database::entities::new_public_id;
use parley_database::User;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ErrorResponse, GatewayResult};
use crate::middleware::CurrentUser;
use crate::rest::ApiJson;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct GithubLoginResponse {
    pub authorize_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct GithubLoginQuery {
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GithubCallbackRequest {
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
    pub expires_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub provider: String,
    pub image: String,
}

impl SessionResponse {
    pub fn new(session: AuthSession, user: User) -> Self {
        Self {
            token: session.token,
            user: user.into(),
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.public_id,
            username: user.username,
            email: user.email,
            provider: user.provider.to_string(),
            image: user.image,
        }
    }
}

impl From<CredentialsRequest> for Credentials {
    fn from(request: CredentialsRequest) -> Self {
        Self {
            username: request.username,
            password: request.password,
            email: request.email,
            image: request.image,
        }
    }
}

/// Routes reachable without a session.
pub fn create_auth_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/auth/credentials", post(credentials_login))
        .route("/api/auth/github/login", get(github_login))
        .route("/api/auth/github/callback", post(github_callback))
}

/// Routes that act on the caller's session.
pub fn create_session_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[utoipa::path(
    post,
    path = "/api/auth/credentials",
    tag = "Auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in, or signed up when the username was free", body = SessionResponse),
        (status = 400, description = "Invalid credentials payload", body = ErrorResponse),
        (status = 401, description = "Wrong password or provider", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn credentials_login(
    State(state): State<Arc<GatewayState>>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> GatewayResult<Json<SessionResponse>> {
    let (user, session) = state
        .authenticator()
        .authorize_credentials(payload.into())
        .await?;

    Ok(Json(SessionResponse::new(session, user)))
}

#[utoipa::path(
    get,
    path = "/api/auth/github/login",
    tag = "Auth",
    params(GithubLoginQuery),
    responses(
        (status = 200, description = "GitHub OAuth authorization URL", body = GithubLoginResponse),
        (status = 503, description = "GitHub OAuth not configured", body = ErrorResponse)
    )
)]
pub async fn github_login(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<GithubLoginQuery>,
) -> GatewayResult<Json<GithubLoginResponse>> {
    let csrf_state = new_public_id();
    let authorize_url = state
        .authenticator()
        .github_authorization_url(&csrf_state, &params.redirect_uri)?;

    Ok(Json(GithubLoginResponse {
        authorize_url,
        state: csrf_state,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/github/callback",
    tag = "Auth",
    request_body = GithubCallbackRequest,
    responses(
        (status = 200, description = "GitHub OAuth callback succeeded", body = SessionResponse),
        (status = 400, description = "Invalid OAuth payload", body = ErrorResponse),
        (status = 401, description = "Authentication failed", body = ErrorResponse),
        (status = 503, description = "GitHub OAuth not configured", body = ErrorResponse)
    )
)]
pub async fn github_callback(
    State(state): State<Arc<GatewayState>>,
    ApiJson(payload): ApiJson<GithubCallbackRequest>,
) -> GatewayResult<Json<SessionResponse>> {
    let (user, session) = state
        .authenticator()
        .login_with_github_code(&payload.code, &payload.redirect_uri)
        .await?;

    Ok(Json(SessionResponse::new(session, user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Session removed"),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<Arc<GatewayState>>,
    current: CurrentUser,
) -> GatewayResult<StatusCode> {
    state.authenticator().logout(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user information", body = UserResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(current.user))
}
