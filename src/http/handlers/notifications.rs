use crate::error::{err, DispatchError};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn message_status(State(state): State<AppState>, Path(sid): Path<String>) -> Response {
    match state.notifications.message_status(&sid).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(DispatchError::Vendor(e)) => {
            let status = match e.http_status() {
                Some(404) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(err("VENDOR_ERROR", &e.to_string()))).into_response()
        }
        Err(e) => {
            tracing::error!(sid = %sid, "message status lookup failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(err("INTERNAL_ERROR", &e.to_string())),
            )
                .into_response()
        }
    }
}
