use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use atelier_core::CategoryId;

use crate::app::dto::{CreateCategoryRequest, MoveCategoryRequest};
use crate::app::errors::{domain_error_to_response, json_result, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(add_category))
        .route("/:id/descendants", get(descendants))
        .route("/:id/parent", put(move_category))
}

async fn add_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateCategoryRequest>,
) -> axum::response::Response {
    json_result(
        StatusCode::CREATED,
        services.core().add_category(body.name, body.parent),
    )
}

/// The category itself followed by every category below it.
async fn descendants(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CategoryId = match parse_id(&id, "category") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().category_with_descendants(id))
}

async fn move_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<MoveCategoryRequest>,
) -> axum::response::Response {
    let id: CategoryId = match parse_id(&id, "category") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.core().move_category(id, body.parent) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => domain_error_to_response(e),
    }
}
