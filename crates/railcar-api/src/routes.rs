use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use railcar_core::model::BatchResult;
use railcar_repository::{TripDetail, TripSummary};

use crate::state::AppState;

/// Upload an equipment events CSV; the body is the raw file bytes. The
/// response always carries the batch counters; a failed batch (parse or
/// persistence error) comes back as 422 with `success=false`.
pub async fn upload_events(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<BatchResult>) {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BatchResult::failure("No file uploaded.")),
        );
    }

    let result = app_state.process_upload(&body).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(result))
}

pub async fn list_trips(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TripSummary>>, StatusCode> {
    app_state.list_trips().await.map(Json).map_err(|err| {
        tracing::error!(%err, "failed to list trips");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub async fn trip_detail(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<TripDetail>, StatusCode> {
    match app_state.fetch_trip(id).await {
        Ok(Some(detail)) => Ok(Json(detail)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            tracing::error!(%err, trip_id = id, "failed to fetch trip");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
