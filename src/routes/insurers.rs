use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;

use clinica_core::models::{Insurer, NewInsurer};
use clinica_core::services::insurers;

use crate::error::ApiError;
use crate::routes::request_context;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Insurer>>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let all = insurers::list_insurers(&conn, &ctx).map_err(|e| state.fail(e))?;
    Ok(Json(all))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(new): Json<NewInsurer>,
) -> Result<(StatusCode, Json<Insurer>), ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let insurer = insurers::create_insurer(&conn, &ctx, &new).map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(insurer)))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    insurers::delete_insurer(&conn, &ctx, id).map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}
