//! Gateway API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Middleware stack (outermost → innermost): CORS → Extension → Rate limiter.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the gateway API router with all endpoints under `/api/`.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the rate
/// limiter). Handlers use `State<ApiContext>` (provided via `with_state`).
pub fn gateway_api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/interactive", post(endpoints::interactive::respond))
        .route("/diagnose", post(endpoints::diagnose::diagnose))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
}
