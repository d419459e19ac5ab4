//! Reference server wiring a route tree to axum

pub mod config;
pub mod demo;

use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use std::sync::Arc;
use strata_loader::{HeaderTokenResolver, Pipeline, RouteHandler, StrataService};
use strata_router::Router;

pub use config::Config;

/// Builds the service for `router` as configured
pub fn service<H: RouteHandler>(router: Router<H>, config: &Config) -> StrataService<H> {
    let pipeline = match config.loading.auth_header.as_deref().map(str::trim) {
        Some(header) if !header.is_empty() => Pipeline::new().with_auth(HeaderTokenResolver::new(header)),
        _ => Pipeline::new(),
    };

    StrataService::new(router)
        .with_pipeline(pipeline)
        .with_default_format(config.loading.default_format)
}

/// Every path goes through the service; the router decides what exists
pub fn app<H: RouteHandler>(service: StrataService<H>) -> axum::Router {
    axum::Router::new()
        .fallback(handle::<H>)
        .with_state(Arc::new(service))
}

async fn handle<H: RouteHandler>(
    State(service): State<Arc<StrataService<H>>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    service.handle(&uri, &headers).await
}
