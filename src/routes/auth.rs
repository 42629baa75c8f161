use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use clinica_core::models::{NewUser, User};
use clinica_core::services::{accounts, sessions};

use crate::error::ApiError;
use crate::routes::{bearer_token, request_context};
use crate::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub name: String,
    pub role: String,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
/// Authenticates by email and password.
///
/// Issues a bearer token valid for the configured session lifetime.
/// Any previous session the account held is invalidated.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = state.db();
    let outcome = sessions::login(
        &conn,
        &req.email,
        &req.password,
        state.config().session_ttl_secs(),
        state.logs(),
    )
    .map_err(|e| state.fail(e))?;
    Ok(Json(LoginResponse {
        token: outcome.token,
        name: outcome.user.name,
        role: outcome.user.role.to_string(),
    }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(token) = bearer_token(&headers) {
        let conn = state.db();
        sessions::logout(&conn, &token, state.logs()).map_err(|e| state.fail(e))?;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Creates an account. The role in the payload decides which group
/// the account joins, once, at creation.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> Result<Json<User>, ApiError> {
    let conn = state.db();
    let user = accounts::register_user(&conn, &req, state.logs()).map_err(|e| state.fail(e))?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    accounts::change_password(&conn, &ctx, &req.current_password, &req.new_password)
        .map_err(|e| state.fail(e))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
