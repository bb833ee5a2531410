use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{api, auth, state::AppState, ws};

/// Build the application router.
///
/// `/ws` checks the bearer token first (401), then the origin (403), and only
/// then attempts the upgrade.
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::origin_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::bearer_auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/api/clients", get(api::list_clients))
        .route("/api/health", get(api::health));

    Router::new()
        .merge(ws_routes)
        .merge(api_routes)
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
