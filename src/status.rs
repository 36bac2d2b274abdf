//! Side-channel status routes: `/` and `/health`.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use crate::registry::Registry;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootStatus {
    status: &'static str,
    active_rooms: usize,
    timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct NotFound {
    error: &'static str,
}

pub fn root_status(registry: &Registry) -> Json<RootStatus> {
    Json(RootStatus {
        status: "Termchat Backend Server Running",
        active_rooms: registry.room_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "healthy" })
}

pub fn not_found() -> (StatusCode, Json<NotFound>) {
    (StatusCode::NOT_FOUND, Json(NotFound { error: "not found" }))
}
