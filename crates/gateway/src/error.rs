//! Error types for the gateway layer

use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_auth::AuthError;
use parley_chats::ChatError;
use parley_realtime::RealtimeError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::InternalError(_) | GatewayError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Validation(message) => GatewayError::InvalidRequest(message),
            AuthError::InvalidCredentials
            | AuthError::ProviderMismatch(_)
            | AuthError::GithubOauth(_)
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => GatewayError::AuthenticationFailed(error.to_string()),
            AuthError::EmailTaken => GatewayError::Conflict(error.to_string()),
            AuthError::GithubOauthDisabled => GatewayError::ServiceUnavailable(error.to_string()),
            AuthError::Database(_) | AuthError::Repository(_) => {
                GatewayError::DatabaseError(error.to_string())
            }
            AuthError::PasswordHash(_) => GatewayError::InternalError(error.to_string()),
        }
    }
}

impl From<ChatError> for GatewayError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::Database(e) => GatewayError::DatabaseError(e.to_string()),
            ChatError::ChatroomNotFound { .. }
            | ChatError::MessageNotFound { .. }
            | ChatError::UserNotFound { .. } => GatewayError::NotFound(error.to_string()),
            ChatError::AccessDenied { reason } => GatewayError::AuthenticationFailed(reason),
            ChatError::SenderMismatch { .. } => GatewayError::AuthorizationFailed(error.to_string()),
            ChatError::Validation { message } => GatewayError::InvalidRequest(message),
        }
    }
}

impl From<RealtimeError> for GatewayError {
    fn from(error: RealtimeError) -> Self {
        match error {
            RealtimeError::InvalidChannel(_) => GatewayError::InvalidRequest(error.to_string()),
            RealtimeError::ChannelMismatch | RealtimeError::Token(_) => {
                GatewayError::AuthenticationFailed(error.to_string())
            }
            RealtimeError::Broker(_) | RealtimeError::Serialization(_) => {
                GatewayError::InternalError(error.to_string())
            }
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::InvalidRequest(rejection.body_text())
    }
}

impl From<FormRejection> for GatewayError {
    fn from(rejection: FormRejection) -> Self {
        GatewayError::InvalidRequest(rejection.body_text())
    }
}
