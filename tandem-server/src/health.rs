use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status_code: u16,
    pub message: &'static str,
    pub data: &'static str,
}

/// `GET /test`; not part of signaling, kept for liveness probes.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status_code: 200,
        message: "it worked!",
        data: "data",
    })
}
