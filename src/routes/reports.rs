use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};

use clinica_core::logs::LogKind;
use clinica_core::roles::{authorize, Capability};
use clinica_core::services::reports;
use clinica_core::CoreError;

use crate::error::ApiError;
use crate::routes::request_context;
use crate::state::AppState;

pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<reports::DashboardCounts>, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let counts = reports::dashboard_counts(&conn, &ctx).map_err(|e| state.fail(e))?;
    Ok(Json(counts))
}

/// Serves the attended-patients report as a CSV download.
pub async fn attended_patients_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let ctx = request_context(&state, &headers)?;
    let conn = state.db();
    let export = reports::export_attended_patients(&conn, &ctx).map_err(|e| state.fail(e))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.file_name),
            ),
        ],
        export.content,
    )
        .into_response())
}

/// Returns one of the application log files as plain text.
/// Names: `users`, `security`, `audit`, `errors`. Admin only.
pub async fn view_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = request_context(&state, &headers)?;
    authorize(&ctx, Capability::ViewLogs).map_err(|e| state.fail(e))?;

    let kind = LogKind::from_name(&name).ok_or_else(|| {
        state.fail(CoreError::Validation(format!("unknown log file: {name}")))
    })?;
    match state.logs().read(kind) {
        Ok(content) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned())],
            content,
        )
            .into_response()),
        Err(e) => {
            tracing::error!("log read failed: {e}");
            Ok((
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            )
                .into_response())
        }
    }
}
