use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
};

use atelier_core::{ItemId, MoldId};
use atelier_molds::{MoldChanges, NewMold};

use crate::app::dto::ChangeMoldStatusRequest;
use crate::app::errors::{json_result, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_mold).get(list_molds))
        .route("/by-code/:code", get(find_by_code))
        .route("/:id", get(get_mold).put(update_mold).delete(remove_mold))
        .route("/:id/usage", post(record_usage))
        .route("/:id/usage/reset", post(reset_usage))
        .route("/:id/status", post(change_status))
        .route("/:id/items/:item_id", put(link_item).delete(unlink_item))
}

fn parse_pair(mold: &str, item: &str) -> Result<(MoldId, ItemId), axum::response::Response> {
    Ok((parse_id(mold, "mold")?, parse_id(item, "item")?))
}

async fn register_mold(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewMold>,
) -> axum::response::Response {
    json_result(StatusCode::CREATED, services.core().register_mold(body))
}

async fn list_molds(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    json_result(StatusCode::OK, services.core().list_molds())
}

async fn get_mold(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MoldId = match parse_id(&id, "mold") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().get_mold(id))
}

async fn find_by_code(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> axum::response::Response {
    json_result(StatusCode::OK, services.core().find_mold_by_code(&code))
}

/// Replaces the descriptive fields; code, status and links are untouched.
async fn update_mold(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<MoldChanges>,
) -> axum::response::Response {
    let id: MoldId = match parse_id(&id, "mold") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().update_mold(id, body))
}

async fn remove_mold(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MoldId = match parse_id(&id, "mold") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().remove_mold(id))
}

async fn record_usage(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MoldId = match parse_id(&id, "mold") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().record_mold_usage(id))
}

async fn reset_usage(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MoldId = match parse_id(&id, "mold") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().reset_mold_usage(id))
}

async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<ChangeMoldStatusRequest>,
) -> axum::response::Response {
    let id: MoldId = match parse_id(&id, "mold") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(
        StatusCode::OK,
        services.core().change_mold_status(id, body.status, body.note),
    )
}

async fn link_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((mold, item)): Path<(String, String)>,
) -> axum::response::Response {
    let (mold_id, item_id) = match parse_pair(&mold, &item) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().link_mold_item(mold_id, item_id))
}

async fn unlink_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((mold, item)): Path<(String, String)>,
) -> axum::response::Response {
    let (mold_id, item_id) = match parse_pair(&mold, &item) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().unlink_mold_item(mold_id, item_id))
}
