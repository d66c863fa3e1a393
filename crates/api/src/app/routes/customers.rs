use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use atelier_core::CustomerId;
use atelier_customers::NewCustomer;

use crate::app::errors::{json_result, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_customer).get(list_customers))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(remove_customer),
        )
}

async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewCustomer>,
) -> axum::response::Response {
    json_result(StatusCode::CREATED, services.core().register_customer(body))
}

async fn list_customers(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    json_result(StatusCode::OK, services.core().list_customers())
}

async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match parse_id(&id, "customer") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().get_customer(id))
}

/// Replaces name and contact details; purchase count is untouched.
async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<NewCustomer>,
) -> axum::response::Response {
    let id: CustomerId = match parse_id(&id, "customer") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().update_customer(id, body))
}

/// Only customers without purchases can be removed; others answer 409.
async fn remove_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match parse_id(&id, "customer") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    json_result(StatusCode::OK, services.core().remove_customer(id))
}
