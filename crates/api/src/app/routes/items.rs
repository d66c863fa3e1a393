use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post, put},
};

use atelier_catalog::{Item, ItemChanges, ItemFilter, NewItem};
use atelier_core::{CategoryId, DomainResult, ItemId};
use atelier_infra::ItemView;

use crate::app::dto::{CategoryQuery, InventoryValueResponse, ItemQuery, SetActiveRequest, SetStockRequest};
use crate::app::errors::{json_error, json_result, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_item).get(find_items))
        .route("/value", get(inventory_value))
        .route("/zero-priced", get(zero_priced))
        .route("/:id", get(get_item).put(update_item))
        .route("/:id/stock", put(set_stock))
        .route("/:id/active", post(set_active))
        .route("/:id/molds", get(molds_for_item))
}

/// Items go out with the name of the stock level they fall in.
fn view(services: &AppServices, item: DomainResult<Item>) -> DomainResult<ItemView> {
    item.and_then(|item| services.core().item_view(item))
}

fn views(services: &AppServices, items: DomainResult<Vec<Item>>) -> DomainResult<Vec<ItemView>> {
    items.and_then(|items| services.core().item_views(items))
}

async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewItem>,
) -> axum::response::Response {
    json_result(StatusCode::CREATED, view(&services, services.core().create_item(body)))
}

async fn find_items(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<ItemQuery>,
) -> axum::response::Response {
    let active = match q.active.as_deref() {
        None | Some("true") => Some(true),
        Some("false") => Some(false),
        Some("all") => None,
        Some(other) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("unknown active filter {other:?}"),
            );
        }
    };
    let category = match q.category.as_deref().map(|raw| parse_id::<CategoryId>(raw, "category")) {
        Some(Ok(id)) => Some(id),
        Some(Err(resp)) => return resp,
        None => None,
    };

    let filter = ItemFilter {
        active,
        category,
        text: q.q.filter(|t| !t.trim().is_empty()),
    };
    json_result(StatusCode::OK, views(&services, services.core().find_active_items(&filter)))
}

async fn inventory_value(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<CategoryQuery>,
) -> axum::response::Response {
    let category = match q.category.as_deref().map(|raw| parse_id::<CategoryId>(raw, "category")) {
        Some(Ok(id)) => Some(id),
        Some(Err(resp)) => return resp,
        None => None,
    };

    let value = services
        .core()
        .inventory_value(category)
        .map(|value| InventoryValueResponse {
            value,
            formatted: services.currency().format(value),
        });
    json_result(StatusCode::OK, value)
}

/// Items still waiting for a price.
async fn zero_priced(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    json_result(StatusCode::OK, views(&services, services.core().zero_priced_items()))
}

async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id, "item") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, view(&services, services.core().get_item(id)))
}

async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<ItemChanges>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id, "item") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, view(&services, services.core().update_item(id, body)))
}

async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<SetStockRequest>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id, "item") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, view(&services, services.core().set_stock(id, body.stock)))
}

async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<SetActiveRequest>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id, "item") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, view(&services, services.core().set_item_active(id, body.active)))
}

async fn molds_for_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id, "item") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().molds_for_item(id))
}
