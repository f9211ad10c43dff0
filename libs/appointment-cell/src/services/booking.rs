use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{is_conflict, return_representation, SupabaseClient, SupabaseError};
use doctor_cell::models::SlotTime;
use doctor_cell::services::{AvailabilityService, DoctorService};
use patient_cell::services::PatientService;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookingConfirmation,
    DashboardAppointmentRequest,
};
use crate::services::confirmation::generate_confirmation_id;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::validation::BookingValidator;

/// Columns returned for an appointment, with patient and doctor summaries.
pub const APPOINTMENT_SELECT: &str =
    "*,patient:patients(id,name,phone,email),doctor:doctors(id,name)";

const CONFIRMATION_ID_ATTEMPTS: usize = 3;

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    availability: AvailabilityService,
    doctors: DoctorService,
    patients: PatientService,
    validator: BookingValidator,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            availability: AvailabilityService::new(config),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
            validator: BookingValidator::new(),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.availability = self.availability.with_today(today);
        self
    }

    /// Public booking form submission.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<BookingConfirmation, AppointmentError> {
        let booking = self.validator.validate(&request, self.availability.today())?;
        info!("Booking {} on {} at {} for {}", booking.service, booking.date, booking.time, booking.patient.email);

        let doctor = self.doctors.resolve_doctor(request.doctor_id, None).await?;
        self.ensure_slot_free(doctor.id, booking.date, booking.time, None).await?;

        let patient = self.patients.upsert_by_email(&booking.patient, None).await?;

        let row = json!({
            "patient_id": patient.id,
            "doctor_id": doctor.id,
            "date": booking.date,
            "time": booking.time,
            "type": booking.service,
            "status": AppointmentStatus::Pending,
            "payment_status": false,
            "payment_details": {
                "method": "upi",
                "utr_number": booking.utr_number,
            },
        });

        let appointment = self.insert_appointment(row, None).await?;
        info!("Appointment {} booked with confirmation {}", appointment.id, appointment.confirmation_id);

        Ok(BookingConfirmation {
            confirmation_id: appointment.confirmation_id.clone(),
            doctor_name: doctor.name,
            appointment,
        })
    }

    /// Appointment created from a dashboard for a patient on file.
    pub async fn create_dashboard_appointment(
        &self,
        request: DashboardAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let kind = request.kind.trim();
        if kind.is_empty() {
            return Err(AppointmentError::ValidationError("Please select a service".to_string()));
        }

        let time = request
            .time
            .parse::<SlotTime>()
            .map_err(|e| AppointmentError::ValidationError(e.to_string()))?;

        let status = request.status.unwrap_or(AppointmentStatus::Pending);
        if !self.lifecycle.is_valid_initial_status(status) {
            return Err(AppointmentError::ValidationError(format!(
                "New appointments cannot start as {}",
                status
            )));
        }

        let patient = self.patients.get_patient(request.patient_id, auth_token).await?;
        let doctor = self.doctors.resolve_doctor(request.doctor_id, Some(auth_token)).await?;
        self.ensure_slot_free(doctor.id, request.date, time, Some(auth_token)).await?;

        let row = json!({
            "patient_id": patient.id,
            "doctor_id": doctor.id,
            "date": request.date,
            "time": time,
            "type": kind,
            "status": status,
            "notes": request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            "payment_status": false,
        });

        let appointment = self.insert_appointment(row, Some(auth_token)).await?;
        info!("Dashboard appointment {} created for patient {}", appointment.id, patient.id);
        Ok(appointment)
    }

    /// Runs the same date and slot rules the public slot list shows.
    async fn ensure_slot_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: SlotTime,
        auth_token: Option<&str>,
    ) -> Result<(), AppointmentError> {
        let availability = self.availability
            .get_available_slots(doctor_id, date, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if let Some(reason) = availability.reason {
            debug!("Date {} rejected for doctor {}: {}", date, doctor_id, reason);
            return Err(AppointmentError::DateUnavailable(reason));
        }

        if !availability.has_slot(time) {
            debug!("Slot {} on {} is not free for doctor {}", time, date, doctor_id);
            return Err(AppointmentError::SlotNotAvailable);
        }

        Ok(())
    }

    /// Inserts with a fresh confirmation ID. The unique index on
    /// `(doctor_id, date, time)` turns a lost race into `SlotAlreadyBooked`;
    /// a confirmation ID collision is retried with a new ID.
    async fn insert_appointment(
        &self,
        mut row: Value,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?select={}", APPOINTMENT_SELECT);

        for attempt in 1..=CONFIRMATION_ID_ATTEMPTS {
            row["confirmation_id"] = json!(generate_confirmation_id());

            let result: anyhow::Result<Vec<Value>> = self.supabase
                .request_with_headers(
                    Method::POST,
                    &path,
                    auth_token,
                    Some(row.clone()),
                    Some(return_representation()),
                )
                .await;

            match result {
                Ok(rows) => {
                    let row = rows.into_iter().next().ok_or_else(|| {
                        AppointmentError::DatabaseError("Insert returned no rows".to_string())
                    })?;
                    return serde_json::from_value(row)
                        .map_err(|e| AppointmentError::DatabaseError(e.to_string()));
                }
                Err(e) if is_confirmation_collision(&e) => {
                    warn!("Confirmation ID collision on attempt {}, retrying", attempt);
                }
                Err(e) if is_conflict(&e) => {
                    warn!("Slot taken concurrently: {}", e);
                    return Err(AppointmentError::SlotAlreadyBooked);
                }
                Err(e) => return Err(AppointmentError::DatabaseError(e.to_string())),
            }
        }

        Err(AppointmentError::DatabaseError(
            "Could not generate a unique confirmation ID".to_string(),
        ))
    }
}

fn is_confirmation_collision(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<SupabaseError>(),
        Some(SupabaseError::Conflict(body)) if body.contains("confirmation_id")
    )
}
