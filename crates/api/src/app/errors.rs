use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use atelier_core::DomainError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InvalidTransition { .. } => {
            json_error(StatusCode::CONFLICT, "invalid_transition", message)
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::NegativeStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "negative_stock", message)
        }
        DomainError::InvariantViolation(_) => {
            tracing::error!(error = %message, "invariant violated while serving request");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a typed id from a path or query segment.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: FromStr,
{
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

/// Unwrap a domain result into a JSON body, or the mapped error response.
pub fn json_result<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, DomainError>,
) -> axum::response::Response {
    match result {
        Ok(value) => (status, axum::Json(value)).into_response(),
        Err(e) => domain_error_to_response(e),
    }
}
