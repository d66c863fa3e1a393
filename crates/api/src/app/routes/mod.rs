use axum::{Router, routing::get};

pub mod categories;
pub mod customers;
pub mod items;
pub mod molds;
pub mod notifications;
pub mod sales;
pub mod system;

/// Router for every core-facing endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/status", get(system::status))
        .route("/stream", get(system::stream))
        .nest("/items", items::router())
        .nest("/categories", categories::router())
        .nest("/customers", customers::router())
        .nest("/sales", sales::router())
        .nest("/molds", molds::router())
        .nest("/notifications", notifications::router())
}
