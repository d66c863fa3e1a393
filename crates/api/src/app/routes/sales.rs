use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use atelier_core::{CustomerId, SaleId};
use atelier_sales::{SaleQuery, SaleRequest};

use crate::app::dto::{AdvanceSaleRequest, SaleListQuery};
use crate::app::errors::{json_result, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_sale).get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id/status", post(advance_sale))
        .route("/:id/cancel", post(cancel_sale))
}

/// Validates every line, then commits stock, purchase count and the sale
/// together. A rejected sale leaves every store as it was.
async fn submit_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<SaleRequest>,
) -> axum::response::Response {
    json_result(StatusCode::CREATED, services.core().submit_sale(body))
}

async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<SaleListQuery>,
) -> axum::response::Response {
    let customer = match q.customer.as_deref().map(|raw| parse_id::<CustomerId>(raw, "customer")) {
        Some(Ok(id)) => Some(id),
        Some(Err(resp)) => return resp,
        None => None,
    };
    let query = SaleQuery {
        status: q.status,
        customer,
    };
    json_result(StatusCode::OK, services.core().list_sales(&query))
}

async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SaleId = match parse_id(&id, "sale") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().get_sale(id))
}

async fn advance_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<AdvanceSaleRequest>,
) -> axum::response::Response {
    let id: SaleId = match parse_id(&id, "sale") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().advance_sale(id, body.status))
}

async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SaleId = match parse_id(&id, "sale") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().cancel_sale(id))
}
