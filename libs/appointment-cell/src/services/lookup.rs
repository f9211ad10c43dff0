use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatusView, LookupRequest};
use crate::services::confirmation::{is_well_formed, normalize_confirmation_id};

// `!inner` drops the row unless the patient filter matches too.
const LOOKUP_SELECT: &str = "*,patient:patients!inner(id,name,phone),doctor:doctors(id,name)";

/// Public appointment status check by confirmation ID and phone number.
pub struct AppointmentLookupService {
    supabase: SupabaseClient,
}

impl AppointmentLookupService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Every kind of mismatch produces the same error, so the response does
    /// not reveal which half was wrong.
    pub async fn lookup(&self, request: LookupRequest) -> Result<AppointmentStatusView, AppointmentError> {
        let confirmation_id = normalize_confirmation_id(&request.confirmation_id);
        let phone = request.phone.trim();

        if confirmation_id.is_empty() || phone.is_empty() {
            return Err(AppointmentError::ValidationError(
                "Please enter both confirmation ID and phone number".to_string(),
            ));
        }

        if !is_well_formed(&confirmation_id) {
            debug!("Rejecting malformed confirmation ID without querying");
            return Err(AppointmentError::LookupMismatch);
        }

        let path = format!(
            "/rest/v1/appointments?select={}&confirmation_id=eq.{}&patient.phone=eq.{}",
            LOOKUP_SELECT,
            confirmation_id,
            urlencoding::encode(phone)
        );

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::LookupMismatch)?;
        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Status lookup for {}", appointment.confirmation_id);
        Ok(appointment.into())
    }
}
