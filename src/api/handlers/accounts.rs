use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::response::{ApiError, AppJson, JSend};
use crate::auth;
use crate::storage::models::UserRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub wallet: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub wallet: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<Json<JSend<TokenResponse>>, ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::bad_request("username must not be empty"));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request("password must not be empty"));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let user = UserRecord {
        id: uuid::Uuid::new_v4().to_string(),
        username: req.username.trim().to_string(),
        email: None,
        password_hash,
        wallet: req.wallet.clone(),
        created_at: Utc::now(),
    };

    let created = state
        .db
        .create_user(&user)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !created {
        return Err(ApiError::conflict(format!(
            "username '{}' is already registered",
            user.username
        )));
    }

    let token = auth::issue_token(
        &user.id,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )?;

    tracing::debug!(user_id = %user.id, username = %user.username, "Registered user");

    Ok(JSend::success(TokenResponse {
        token,
        wallet: user.wallet,
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<JSend<TokenResponse>>, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !auth::verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let token = auth::issue_token(
        &user.id,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )?;

    tracing::debug!(user_id = %user.id, "User logged in");

    Ok(JSend::success(TokenResponse {
        token,
        wallet: user.wallet,
    }))
}
