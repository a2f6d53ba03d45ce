use actix_web::{http::StatusCode, HttpResponse};

use crate::response;

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    response::success_empty(StatusCode::OK, "OK")
}
