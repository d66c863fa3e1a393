use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{delete, get, post},
};

use atelier_core::NotificationId;
use atelier_notifications::{NotificationFilter, StockThresholds};

use crate::app::dto::{ChangedResponse, CountResponse, NotificationQuery, StockLevelsRequest};
use crate::app::errors::{json_result, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/stock-levels", get(stock_levels).put(set_stock_levels))
        .route("/stock-levels/evaluate", post(evaluate_stock))
        .route("/:id", delete(delete_notification))
        .route("/:id/read", post(mark_read))
}

/// Newest first.
async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<NotificationQuery>,
) -> axum::response::Response {
    let filter = NotificationFilter {
        kind: q.kind,
        unread_only: q.unread,
    };
    json_result(StatusCode::OK, services.core().list_notifications(&filter))
}

async fn unread_count(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let count = services
        .core()
        .unread_notifications()
        .map(|count| CountResponse { count });
    json_result(StatusCode::OK, count)
}

async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NotificationId = match parse_id(&id, "notification") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let changed = services
        .core()
        .mark_read(id)
        .map(|changed| ChangedResponse { changed });
    json_result(StatusCode::OK, changed)
}

async fn mark_all_read(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let count = services
        .core()
        .mark_all_read()
        .map(|count| CountResponse { count });
    json_result(StatusCode::OK, count)
}

// Unknown ids are not an error; `changed` reports whether anything was removed.
async fn delete_notification(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NotificationId = match parse_id(&id, "notification") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let changed = services
        .core()
        .delete_notification(id)
        .map(|changed| ChangedResponse { changed });
    json_result(StatusCode::OK, changed)
}

async fn stock_levels(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    json_result(StatusCode::OK, services.core().thresholds())
}

/// Replace the stock level table, then re-check every item against it.
/// Responds with the number of alerts raised by the re-check.
async fn set_stock_levels(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<StockLevelsRequest>,
) -> axum::response::Response {
    let raised = StockThresholds::new(body.levels)
        .and_then(|thresholds| services.core().set_thresholds(thresholds))
        .map(|count| CountResponse { count });
    json_result(StatusCode::OK, raised)
}

async fn evaluate_stock(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let raised = services
        .core()
        .evaluate_stock_alerts()
        .map(|count| CountResponse { count });
    json_result(StatusCode::OK, raised)
}
