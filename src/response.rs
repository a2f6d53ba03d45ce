/// Uniform JSON envelope
///
/// Every response, success or failure, has the same outer shape:
/// `{ "code": 200, "status": "success", "message": "...", "data": {...} }`
/// or `{ "code": 401, "status": "error", "message": "...", "error": {...} }`.

use actix_web::{http::StatusCode, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Error details carried inside the envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `TOKEN_REVOKED`
    pub code: &'static str,
    pub message: String,
    /// Unique id, also written to the server log for correlation
    pub error_id: String,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(error_id: String, code: &'static str, message: String) -> Self {
        Self {
            code,
            message,
            error_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code: status.as_u16(),
            status: "success",
            message: message.into(),
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(status: StatusCode, body: ErrorBody) -> Self {
        Self {
            code: status.as_u16(),
            status: "error",
            message: body.message.clone(),
            data: None,
            error: Some(body),
        }
    }
}

/// Build a success `HttpResponse` wrapped in the envelope
pub fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::success(status, message, Some(data)))
}

/// Success with no payload
pub fn success_empty(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::<()>::success(status, message, None))
}
