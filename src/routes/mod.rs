use axum::http::{header, HeaderMap};
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

use clinica_core::services::sessions;
use clinica_core::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

pub mod auth;
pub mod insurers;
pub mod patients;
pub mod records;
pub mod reports;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/change-password", post(auth::change_password))
        .route("/patients", get(patients::list).post(patients::create))
        .route("/patients/search", get(patients::search))
        .route(
            "/patients/:id",
            get(patients::get).put(patients::update).delete(patients::remove),
        )
        .route("/insurers", get(insurers::list).post(insurers::create))
        .route("/insurers/:id", delete(insurers::remove))
        .route("/records", get(records::list).post(records::create))
        .route(
            "/records/:id",
            get(records::get).put(records::update).delete(records::remove),
        )
        .route("/records/:id/appointments", post(records::add_appointment))
        .route("/appointments/:id", delete(records::remove_appointment))
        .route("/diagnoses/:id", delete(records::remove_diagnosis))
        .route("/medications/:id", delete(records::remove_medication))
        .route("/observations/:id", delete(records::remove_observation))
        .route("/attachments/:id", delete(records::remove_attachment))
        .route("/dashboard", get(reports::dashboard))
        .route("/reports/attended-patients", get(reports::attended_patients_csv))
        .route("/logs/:name", get(reports::view_log))
        .with_state(state)
}

/// Resolves the caller's context from the `Authorization: Bearer`
/// header. Missing or stale tokens yield an anonymous context; the
/// services decide what anonymous callers may do.
pub(crate) fn request_context(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<RequestContext, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let conn = state.db();
    sessions::resolve_context(&conn, token).map_err(|e| state.fail(e))
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthResponse)
    )
)]
/// Health check endpoint for monitoring and load balancers.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
