use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, sse::Event as SseEvent},
};
use serde_json::json;

use crate::app::errors;
use crate::app::services::{self, AppServices};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn status(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let core = services.core();
    let snapshot = core
        .last_sequence()
        .and_then(|seq| core.unread_notifications().map(|unread| (seq, unread)));
    match snapshot {
        Ok((last_sequence, unread)) => Json(json!({
            "last_sequence": last_sequence,
            "persisted_records": services.persisted_records(),
            "unread_notifications": unread,
            "currency": services.currency().code,
        }))
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Server-sent events: one message per committed change.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    services::realtime_stream(services)
}
