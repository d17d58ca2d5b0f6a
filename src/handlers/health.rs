use axum::{Json, response::IntoResponse};

use crate::error::iso_timestamp;

// health handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": iso_timestamp(&chrono::Utc::now())
    }))
}
