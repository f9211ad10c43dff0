use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{merge_duplicates, SupabaseClient};

use crate::models::{Patient, PatientDetail, PatientError, PatientVisit, UpsertPatient};

const DEFAULT_SEARCH_LIMIT: u32 = 50;
const HISTORY_SELECT: &str = "id,confirmation_id,date,time,type,status,notes,doctor:doctors(name)";

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Insert the patient, or merge into the existing row with the same email.
    pub async fn upsert_by_email(
        &self,
        patient: &UpsertPatient,
        auth_token: Option<&str>,
    ) -> Result<Patient, PatientError> {
        debug!("Upserting patient record for: {}", patient.email);

        let body = serde_json::to_value(patient)
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients?on_conflict=email",
                auth_token,
                Some(body),
                Some(merge_duplicates()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if let Some(row) = rows.into_iter().next() {
            return parse_patient(row);
        }

        // Some policies hide the upserted row; fall back to reading it back.
        self.find_by_email(&patient.email, auth_token)
            .await?
            .ok_or_else(|| PatientError::DatabaseError("Upsert returned no patient".to_string()))
    }

    pub async fn find_by_email(
        &self,
        email: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<Patient>, PatientError> {
        let path = format!("/rest/v1/patients?email=eq.{}", urlencoding::encode(email));
        let rows = self.fetch(&path, auth_token).await?;
        rows.into_iter().next().map(parse_patient).transpose()
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows = self.fetch(&path, Some(auth_token)).await?;
        rows.into_iter().next().ok_or(PatientError::NotFound).and_then(parse_patient)
    }

    /// Patient plus their appointments, newest first.
    pub async fn get_patient_with_history(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientDetail, PatientError> {
        let history_path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&select={}&order=date.desc,time.desc",
            patient_id, HISTORY_SELECT
        );

        let (patient, history) = futures::try_join!(
            self.get_patient(patient_id, auth_token),
            self.fetch(&history_path, Some(auth_token)),
        )?;

        let appointments = history
            .into_iter()
            .map(|row| serde_json::from_value::<PatientVisit>(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(PatientDetail { patient, appointments })
    }

    /// Case-insensitive match on name, phone or email, newest first.
    pub async fn search_patients(
        &self,
        search: Option<&str>,
        limit: Option<u32>,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 200);
        let mut path = format!("/rest/v1/patients?order=created_at.desc&limit={}", limit);

        if let Some(filter) = search.and_then(search_filter) {
            path.push_str("&or=");
            path.push_str(&urlencoding::encode(&filter));
        }

        debug!("Searching patients: {}", path);
        let rows = self.fetch(&path, Some(auth_token)).await?;
        let patients = rows.into_iter().map(parse_patient).collect::<Result<Vec<_>, _>>()?;

        info!("Patient search returned {} rows", patients.len());
        Ok(patients)
    }

    async fn fetch(&self, path: &str, auth_token: Option<&str>) -> Result<Vec<Value>, PatientError> {
        self.supabase
            .request(Method::GET, path, auth_token, None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}

fn parse_patient(row: Value) -> Result<Patient, PatientError> {
    serde_json::from_value(row).map_err(|e| PatientError::DatabaseError(e.to_string()))
}

/// PostgREST `or` filter for a free-text search. Characters that carry
/// meaning inside the filter grammar are dropped from the term.
pub fn search_filter(term: &str) -> Option<String> {
    let cleaned: String = term
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"' | '\\'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Some(format!(
        "(name.ilike.*{0}*,phone.ilike.*{0}*,email.ilike.*{0}*)",
        cleaned
    ))
}
