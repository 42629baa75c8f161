use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Deserialize;

use clinica_core::models::{
    Appointment, ClinicalRecord, NewAppointment, RecordChildren, RecordDraft, RecordWithChildren,
};
use clinica_core::services::records;

use crate::error::ApiError;
use crate::routes::request_context;
use crate::state::AppState;

/// Payload for creating or rewriting a clinical record: the record
/// fields plus the full nested child collections.
#[derive(Deserialize)]
pub struct RecordPayload {
    pub record: RecordDraft,
    #[serde(default)]
    pub children: RecordChildren,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ClinicalRecord>>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let all = records::list_records(&conn, &ctx).map_err(|e| state.fail(e))?;
    Ok(Json(all))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<RecordWithChildren>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let record = records::get_record(&conn, &ctx, id).map_err(|e| state.fail(e))?;
    Ok(Json(record))
}

/// Creates a clinical record with its children in one transaction.
/// Medico only; one record per patient.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RecordPayload>,
) -> Result<(StatusCode, Json<RecordWithChildren>), ApiError> {
    let ctx = request_context(&state, &headers)?;
    let mut conn = state.db();
    let stored = records::create_record(&mut conn, &ctx, &payload.record, &payload.children)
        .map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<RecordPayload>,
) -> Result<Json<RecordWithChildren>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let mut conn = state.db();
    let stored = records::edit_record(&mut conn, &ctx, id, &payload.record, &payload.children)
        .map_err(|e| state.fail(e))?;
    Ok(Json(stored))
}

/// Deletes a clinical record. Refused with 409 while dependent child
/// rows exist; the refusal message enumerates them.
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    records::delete_record(&conn, &ctx, id, state.observers()).map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_id): Path<i64>,
    Json(new): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let appointment = records::add_appointment(&conn, &ctx, record_id, &new)
        .map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

macro_rules! child_delete_handler {
    ($name:ident, $service:path) => {
        pub async fn $name(
            State(state): State<AppState>,
            headers: HeaderMap,
            Path(id): Path<i64>,
        ) -> Result<StatusCode, ApiError> {
            let ctx = request_context(&state, &headers)?;
            let conn = state.db();
            $service(&conn, &ctx, id, state.observers()).map_err(|e| state.fail(e))?;
            Ok(StatusCode::NO_CONTENT)
        }
    };
}

child_delete_handler!(remove_appointment, records::delete_appointment);
child_delete_handler!(remove_diagnosis, records::delete_diagnosis);
child_delete_handler!(remove_medication, records::delete_medication);
child_delete_handler!(remove_observation, records::delete_observation);
child_delete_handler!(remove_attachment, records::delete_attachment);
