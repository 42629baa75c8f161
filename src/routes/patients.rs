use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Deserialize;

use clinica_core::models::{Patient, PatientDraft};
use clinica_core::services::patients;

use crate::error::ApiError;
use crate::routes::request_context;
use crate::state::AppState;

/// Lists every patient, ordered by name. Requires a role that can at
/// least view the registry.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let all = patients::list_patients(&conn, &ctx).map_err(|e| state.fail(e))?;
    Ok(Json(all))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let found = patients::search_patients(&conn, &ctx, &params.q).map_err(|e| state.fail(e))?;
    Ok(Json(found))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Patient>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let patient = patients::get_patient(&conn, &ctx, id).map_err(|e| state.fail(e))?;
    Ok(Json(patient))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<PatientDraft>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let patient = patients::create_patient(&conn, &ctx, &draft).map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(draft): Json<PatientDraft>,
) -> Result<Json<Patient>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let patient =
        patients::update_patient(&conn, &ctx, id, &draft).map_err(|e| state.fail(e))?;
    Ok(Json(patient))
}

/// Removes a patient together with their clinical record and all of
/// its children. Admin only; the deletion observers record the event.
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    patients::delete_patient(&conn, &ctx, id, state.observers()).map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}
