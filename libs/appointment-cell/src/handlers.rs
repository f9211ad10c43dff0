use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, STAFF};

use crate::models::{
    AppointmentListQuery, BookAppointmentRequest, DashboardAppointmentRequest, LookupRequest,
    UpdateStatusRequest,
};
use crate::services::{
    AppointmentBookingService, AppointmentDashboardService, AppointmentLookupService,
};

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub doctor_id: Option<Uuid>,
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let confirmation = AppointmentBookingService::new(&state)
        .book_appointment(request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(confirmation))))
}

#[axum::debug_handler]
pub async fn lookup_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<Value>, AppError> {
    let view = AppointmentLookupService::new(&state).lookup(request).await?;
    Ok(Json(json!(view)))
}

// ==============================================================================
// DASHBOARD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let appointments = AppointmentDashboardService::new(&state)
        .list_appointments(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_overview(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let overview = AppointmentDashboardService::new(&state)
        .overview(query.doctor_id, auth.token())
        .await?;

    Ok(Json(json!(overview)))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DashboardAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, STAFF)?;

    let appointment = AppointmentBookingService::new(&state)
        .create_dashboard_appointment(request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let appointment = AppointmentDashboardService::new(&state)
        .get_appointment(appointment_id, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let appointment = AppointmentDashboardService::new(&state)
        .update_status(appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}
