use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, CLINICIANS, STAFF};

use crate::models::{
    AvailabilityQuery, CreateDoctorRequest, UpdateBreaksRequest, UpdateDoctorRequest,
    UpdateLeavesRequest, UpdateWeeklyScheduleRequest, WorkingHours,
};
use crate::services::{AvailabilityService, DoctorService, ScheduleService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&state).list_doctors(None).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_primary_doctor(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).get_primary_doctor(None).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).get_doctor(doctor_id, None).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_date_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let verdict = AvailabilityService::new(&state)
        .is_date_available(doctor_id, query.date, None)
        .await
        .map_err(|e| {
            warn!("Availability check failed for doctor {}: {}", doctor_id, e);
            AppError::Database("Failed to check availability".to_string())
        })?;

    let mut body = json!(verdict);
    body["doctor_id"] = json!(doctor_id);
    body["date"] = json!(query.date);
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability = AvailabilityService::new(&state)
        .get_available_slots(doctor_id, query.date, None)
        .await
        .map_err(|e| {
            warn!("Slot lookup failed for doctor {}: {}", doctor_id, e);
            AppError::Database("Failed to load available slots".to_string())
        })?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let doctor = DoctorService::new(&state).create_doctor(request, auth.token()).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, CLINICIANS)?;
    let service = DoctorService::new(&state);

    // A doctor may only edit their own profile.
    if role == Role::Doctor {
        let doctor = service.get_doctor(doctor_id, Some(auth.token())).await?;
        let own = user.email.as_deref().map_or(false, |email| email.eq_ignore_ascii_case(&doctor.email));
        if !own {
            return Err(AppError::Forbidden("Doctors can only update their own profile".to_string()));
        }
    }

    let doctor = service.update_doctor(doctor_id, request, auth.token()).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, STAFF)?;

    let schedule = ScheduleService::new(&state)
        .get_or_create_schedule(doctor_id, auth.token())
        .await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_working_hours(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(hours): Json<WorkingHours>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINICIANS)?;

    let schedule = ScheduleService::new(&state)
        .update_working_hours(doctor_id, hours, auth.token())
        .await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_breaks(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateBreaksRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINICIANS)?;

    let schedule = ScheduleService::new(&state)
        .update_breaks(doctor_id, request.breaks, auth.token())
        .await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_leaves(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateLeavesRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINICIANS)?;

    let schedule = ScheduleService::new(&state)
        .update_leaves(doctor_id, request.leaves, auth.token())
        .await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateWeeklyScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINICIANS)?;

    let schedule = ScheduleService::new(&state)
        .update_weekly_schedule(doctor_id, request.weekly_schedule, auth.token())
        .await?;
    Ok(Json(json!(schedule)))
}
