//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: the core service, persistence worker and realtime bridge
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies and query strings
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use atelier_infra::AtelierConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (entrypoint used by the tests).
pub async fn build_app(config: &AtelierConfig) -> anyhow::Result<Router> {
    Ok(build_app_with_services(config).await?.0)
}

/// The router plus the services behind it, so the caller can drain the
/// persistence worker once the server stops.
pub async fn build_app_with_services(
    config: &AtelierConfig,
) -> anyhow::Result<(Router, Arc<services::AppServices>)> {
    let services = Arc::new(services::build_services(config)?);

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services.clone())));
    Ok((router, services))
}
