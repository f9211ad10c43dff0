use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};

use doctor_cell::models::{DoctorError, SlotTime};
use patient_cell::models::PatientError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// Appointment type that the reception overview counts separately.
pub const EMERGENCY_SERVICE: &str = "Emergency Service";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub confirmation_id: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(deserialize_with = "canonical_time")]
    pub time: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<PaymentDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorSummary>,
}

impl Appointment {
    pub fn is_emergency(&self) -> bool {
        self.kind.as_deref() == Some(EMERGENCY_SERVICE)
    }

    pub fn patient_name(&self) -> Option<&str> {
        self.patient.as_ref().map(|p| p.name.as_str())
    }

    pub fn doctor_name(&self) -> Option<&str> {
        self.doctor.as_ref().map(|d| d.name.as_str())
    }
}

/// Rows written by older clients may carry `"09:00:00"` or `"09:00 AM"`.
/// Readable values are rewritten to `"HH:MM"`; anything else is kept as is.
fn canonical_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse::<SlotTime>().map(|t| t.to_string()).unwrap_or(raw))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDetails {
    pub method: String,
    pub utr_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(AppointmentError::ValidationError(format!("Unknown status '{}'", other))),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Public booking form, all four steps in one submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub utr_number: String,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

/// Appointment created by staff for a patient already on file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardAppointmentRequest {
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: String,
    #[serde(rename = "type", alias = "service")]
    pub kind: String,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    pub confirmation_id: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateFilter {
    Today,
    Upcoming,
    Past,
    #[default]
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    #[serde(default)]
    pub filter: DateFilter,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub search: Option<String>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub confirmation_id: String,
    pub doctor_name: String,
    pub appointment: Appointment,
}

/// What the public status page shows.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentStatusView {
    pub confirmation_id: String,
    pub status: AppointmentStatus,
    pub date: NaiveDate,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub doctor_name: Option<String>,
    pub patient_name: Option<String>,
    pub notes: Option<String>,
}

impl From<Appointment> for AppointmentStatusView {
    fn from(appointment: Appointment) -> Self {
        Self {
            doctor_name: appointment.doctor_name().map(str::to_string),
            patient_name: appointment.patient_name().map(str::to_string),
            confirmation_id: appointment.confirmation_id,
            status: appointment.status,
            date: appointment.date,
            time: appointment.time,
            kind: appointment.kind,
            notes: appointment.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AppointmentOverview {
    pub today: usize,
    pub upcoming: usize,
    pub pending: usize,
    pub emergency: usize,
}

// ==============================================================================
// ERROR MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid confirmation ID or phone number")]
    LookupMismatch,

    #[error("{0}")]
    DateUnavailable(String),

    #[error("The selected time slot is not available")]
    SlotNotAvailable,

    #[error("This time slot has already been booked. Please choose another time")]
    SlotAlreadyBooked,

    #[error("Cannot change appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::LookupMismatch => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotNotAvailable | AppointmentError::SlotAlreadyBooked => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::DateUnavailable(msg) | AppointmentError::ValidationError(msg) => {
                AppError::ValidationError(msg)
            }
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(err.to_string()),
            AppointmentError::Doctor(e) => e.into(),
            AppointmentError::Patient(e) => e.into(),
            AppointmentError::DatabaseError(msg) => {
                tracing::error!("Appointment database error: {}", msg);
                AppError::Database("Failed to process appointment".to_string())
            }
        }
    }
}
