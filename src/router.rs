use axum::{
    Router,
    routing::{get, post},
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{faucet_handler, health_handler, index_handler, metrics_handler};
use crate::state::AppState;

//creating the router with routes
pub fn app(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/", get(index_handler))
        .route("/faucet", post(faucet_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
