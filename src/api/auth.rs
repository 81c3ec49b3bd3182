//! Account endpoints
//!
//! - POST /api/register  `{login, password}` → 201 `{user_id, login}`
//! - POST /api/login     `{login, password}` → 200 `{token, user_id, username}`
//! - POST /api/logout    `{token}` → 204, or 401 for an unknown token

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiState;
use crate::auth::AuthError;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub login: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::LoginTaken(_) => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<ApiState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let user = state.users.create_user(&req.login, &req.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            login: user.login,
        }),
    ))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let user = state.users.validate_credentials(&req.login, &req.password).await?;
    let token = state.sessions.issue(&user.id);
    info!(user_id = %user.id, "login");
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.login,
    }))
}

/// Revoke a session token. Live game connections opened with it stay up;
/// the token just stops authenticating new ones.
pub async fn logout(
    State(state): State<ApiState>,
    Json(req): Json<LogoutRequest>,
) -> Result<StatusCode, AuthError> {
    let issued_at = state.sessions.revoke(&req.token).ok_or(AuthError::InvalidToken)?;
    let session_secs = (Utc::now() - issued_at).num_seconds();
    info!(session_secs, "logout");
    Ok(StatusCode::NO_CONTENT)
}
