use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use doctor_cell::services::resolver::clinic_today;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentOverview, AppointmentStatus,
    DateFilter, UpdateStatusRequest,
};
use crate::services::booking::APPOINTMENT_SELECT;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Appointment reads and status changes for the doctor and reception
/// dashboards.
pub struct AppointmentDashboardService {
    supabase: SupabaseClient,
    lifecycle: AppointmentLifecycleService,
    today: NaiveDate,
}

impl AppointmentDashboardService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            today: clinic_today(config),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn list_appointments(
        &self,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = list_path(query, self.today);
        debug!("Listing appointments: {}", path);

        let appointments = self.fetch(&path, auth_token).await?;

        let appointments = match query.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                appointments.into_iter().filter(|a| matches_search(a, &term)).collect()
            }
            _ => appointments,
        };

        Ok(appointments)
    }

    /// Counts shown on the dashboard header, over non-cancelled
    /// appointments from today onward.
    pub async fn overview(
        &self,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<AppointmentOverview, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?select=id,date,time,type,status,confirmation_id,patient_id,doctor_id&date=gte.{}&status=neq.cancelled",
            self.today
        );
        if let Some(doctor_id) = doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }

        let appointments = self.fetch(&path, auth_token).await?;
        Ok(summarize(&appointments, self.today))
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&select={}",
            appointment_id, APPOINTMENT_SELECT
        );
        self.fetch(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_status_transition(current.status, request.status)?;

        let mut body = json!({ "status": request.status });
        if let Some(notes) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            body["notes"] = json!(notes);
        }

        // Guard on the status we validated against so a concurrent change
        // is not silently overwritten.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}&select={}",
            appointment_id, current.status, APPOINTMENT_SELECT
        );
        let rows: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(return_representation()))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or_else(|| AppointmentError::ValidationError(
            "Appointment was changed by someone else, please reload".to_string(),
        ))?;
        let updated: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} moved from {} to {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }

    async fn fetch(&self, path: &str, auth_token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }
}

pub fn list_path(query: &AppointmentListQuery, today: NaiveDate) -> String {
    let mut path = format!("/rest/v1/appointments?select={}", APPOINTMENT_SELECT);

    match query.filter {
        DateFilter::Today => path.push_str(&format!("&date=eq.{}", today)),
        DateFilter::Upcoming => path.push_str(&format!("&date=gt.{}", today)),
        DateFilter::Past => path.push_str(&format!("&date=lt.{}", today)),
        DateFilter::All => {}
    }

    if let Some(doctor_id) = query.doctor_id {
        path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
    }
    if let Some(status) = query.status {
        path.push_str(&format!("&status=eq.{}", status));
    }

    let order = if query.filter == DateFilter::Past {
        "date.desc,time.desc"
    } else {
        "date.asc,time.asc"
    };
    path.push_str("&order=");
    path.push_str(order);
    path
}

/// `term` must already be lower-cased.
pub fn matches_search(appointment: &Appointment, term: &str) -> bool {
    let patient_hit = appointment.patient.as_ref().map_or(false, |p| {
        p.name.to_lowercase().contains(term)
            || p.phone.as_deref().map_or(false, |phone| phone.to_lowercase().contains(term))
    });

    patient_hit || appointment.confirmation_id.to_lowercase().contains(term)
}

pub fn summarize(appointments: &[Appointment], today: NaiveDate) -> AppointmentOverview {
    appointments
        .iter()
        .filter(|a| a.status != AppointmentStatus::Cancelled)
        .fold(AppointmentOverview::default(), |mut overview, a| {
            if a.date == today {
                overview.today += 1;
            } else if a.date > today {
                overview.upcoming += 1;
            }
            if a.status == AppointmentStatus::Pending {
                overview.pending += 1;
            }
            if a.is_emergency() {
                overview.emergency += 1;
            }
            overview
        })
}
