use anyhow::Result;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{is_conflict, return_representation, SupabaseClient};

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, UpdateDoctorRequest, DOCTOR_COLUMNS};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_doctors(&self, auth_token: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?select={}&order=name.asc", DOCTOR_COLUMNS);
        let rows: Vec<Value> = self.fetch(&path, auth_token).await?;
        rows.into_iter().map(parse_doctor).collect()
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, DOCTOR_COLUMNS);
        let rows = self.fetch(&path, auth_token).await?;
        rows.into_iter().next().ok_or(DoctorError::NotFound).and_then(parse_doctor)
    }

    /// The clinic's default doctor: the earliest created row.
    pub async fn get_primary_doctor(&self, auth_token: Option<&str>) -> Result<Doctor, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?select={}&order=created_at.asc&limit=1",
            DOCTOR_COLUMNS
        );
        let rows = self.fetch(&path, auth_token).await?;
        rows.into_iter().next().ok_or(DoctorError::NoDoctorConfigured).and_then(parse_doctor)
    }

    /// `doctor_id` when given, the primary doctor otherwise.
    pub async fn resolve_doctor(
        &self,
        doctor_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        match doctor_id {
            Some(id) => self.get_doctor(id, auth_token).await,
            None => self.get_primary_doctor(auth_token).await,
        }
    }

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        validate_create(&request)?;
        debug!("Creating new doctor profile for: {}", request.email);

        let body = json!({
            "name": request.name.trim(),
            "email": request.email.trim().to_lowercase(),
            "phone": request.phone.trim(),
            "specialization": request.specialization.trim(),
            "experience": request.experience,
            "license": request.license.trim(),
            "avatar_url": request.avatar_url,
        });

        let path = format!("/rest/v1/doctors?select={}", DOCTOR_COLUMNS);
        let rows: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, &path, Some(auth_token), Some(body), Some(return_representation()))
            .await
            .map_err(|e| {
                if is_conflict(&e) {
                    DoctorError::ValidationError(format!("Doctor with email {} already exists", request.email))
                } else {
                    DoctorError::DatabaseError(e.to_string())
                }
            })?;

        let doctor = rows
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Insert returned no rows".to_string()))
            .and_then(parse_doctor)?;

        info!("Doctor profile created with ID: {}", doctor.id);
        Ok(doctor)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let mut changes = Map::new();
        let fields = [
            ("name", request.name),
            ("phone", request.phone),
            ("specialization", request.specialization),
            ("experience", request.experience),
            ("avatar_url", request.avatar_url),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                let value = value.trim().to_string();
                if value.is_empty() && matches!(column, "name" | "phone" | "specialization") {
                    return Err(DoctorError::ValidationError(format!("{} cannot be blank", column)));
                }
                changes.insert(column.to_string(), Value::String(value));
            }
        }

        if changes.is_empty() {
            return self.get_doctor(doctor_id, Some(auth_token)).await;
        }

        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, DOCTOR_COLUMNS);
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(changes)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let doctor = rows.into_iter().next().ok_or(DoctorError::NotFound).and_then(parse_doctor)?;
        info!("Doctor profile updated: {}", doctor.id);
        Ok(doctor)
    }

    async fn fetch(&self, path: &str, auth_token: Option<&str>) -> Result<Vec<Value>, DoctorError> {
        self.supabase
            .request(Method::GET, path, auth_token, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }
}

fn parse_doctor(row: Value) -> Result<Doctor, DoctorError> {
    serde_json::from_value(row).map_err(|e| DoctorError::DatabaseError(e.to_string()))
}

fn validate_create(request: &CreateDoctorRequest) -> Result<(), DoctorError> {
    let required = [
        ("name", &request.name),
        ("email", &request.email),
        ("phone", &request.phone),
        ("specialization", &request.specialization),
        ("license", &request.license),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(DoctorError::ValidationError(format!("{} is required", field)));
        }
    }
    if !request.email.contains('@') {
        return Err(DoctorError::ValidationError("email is invalid".to_string()));
    }
    Ok(())
}
