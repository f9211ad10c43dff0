use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Booking-page reads
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/primary", get(handlers::get_primary_doctor))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/availability", get(handlers::get_date_availability))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots));

    // Dashboard
    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", put(handlers::update_doctor))
        .route("/{doctor_id}/schedule", get(handlers::get_schedule))
        .route("/{doctor_id}/schedule/working-hours", put(handlers::update_working_hours))
        .route("/{doctor_id}/schedule/breaks", put(handlers::update_breaks))
        .route("/{doctor_id}/schedule/leaves", put(handlers::update_leaves))
        .route("/{doctor_id}/schedule/weekly", put(handlers::update_weekly_schedule))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
