use std::sync::Arc;

use axum::{Router, routing::post};

use shared_config::AppConfig;

use crate::handlers;

/// Login handshake. The token itself is checked in the handler so the
/// response can say which dashboard to open.
pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/session", post(handlers::create_session))
        .with_state(state)
}
