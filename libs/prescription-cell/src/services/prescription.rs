use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{
    CreatePrescriptionRequest, Medication, MedicationInput, Prescription, PrescriptionError,
    PrescriptionListQuery,
};

const PRESCRIPTION_SELECT: &str = "*,patient:patients(id,name),medications(*)";

/// Prescription fields after trimming and checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPrescription {
    pub patient_id: Uuid,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub medications: Vec<MedicationInput>,
}

pub fn validate_prescription(
    request: &CreatePrescriptionRequest,
) -> Result<ValidatedPrescription, PrescriptionError> {
    let invalid = |msg: &str| PrescriptionError::ValidationError(msg.to_string());

    let patient_id = request.patient_id.ok_or_else(|| invalid("Please select a patient"))?;

    let diagnosis = request.diagnosis.trim();
    if diagnosis.is_empty() {
        return Err(invalid("Diagnosis is required"));
    }

    if request.medications.is_empty() {
        return Err(invalid("Add at least one medication"));
    }

    let mut medications = Vec::with_capacity(request.medications.len());
    for (index, medication) in request.medications.iter().enumerate() {
        let name = medication.name.trim();
        let dosage = medication.dosage.trim();
        let frequency = medication.frequency.trim();
        if name.is_empty() || dosage.is_empty() || frequency.is_empty() {
            return Err(PrescriptionError::ValidationError(format!(
                "Medication {} needs a name, dosage and frequency",
                index + 1
            )));
        }

        medications.push(MedicationInput {
            name: name.to_string(),
            dosage: dosage.to_string(),
            frequency: frequency.to_string(),
            duration: medication
                .duration
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        });
    }

    Ok(ValidatedPrescription {
        patient_id,
        diagnosis: diagnosis.to_string(),
        notes: request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        medications,
    })
}

pub struct PrescriptionService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    patients: PatientService,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
        }
    }

    /// Writes the prescription, then its medications. A failed medication
    /// insert removes the prescription row again.
    pub async fn create_prescription(
        &self,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let validated = validate_prescription(&request)?;

        let patient = self.patients.get_patient(validated.patient_id, auth_token).await?;
        let doctor = self.doctors.resolve_doctor(request.doctor_id, Some(auth_token)).await?;

        let body = json!({
            "patient_id": patient.id,
            "doctor_id": doctor.id,
            "diagnosis": validated.diagnosis,
            "notes": validated.notes,
            "status": request.status.unwrap_or_default(),
        });

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/prescriptions",
                Some(auth_token),
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or_else(|| {
            PrescriptionError::DatabaseError("Insert returned no prescription".to_string())
        })?;
        let mut prescription: Prescription = serde_json::from_value(row)
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        let medication_rows: Vec<Value> = validated
            .medications
            .iter()
            .map(|m| json!({
                "prescription_id": prescription.id,
                "name": m.name,
                "dosage": m.dosage,
                "frequency": m.frequency,
                "duration": m.duration,
            }))
            .collect();

        let inserted: anyhow::Result<Vec<Medication>> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/medications",
                Some(auth_token),
                Some(Value::Array(medication_rows)),
                Some(return_representation()),
            )
            .await;

        match inserted {
            Ok(medications) => {
                prescription.medications = medications;
                info!(
                    "Prescription {} created for patient {} with {} medications",
                    prescription.id,
                    patient.id,
                    prescription.medications.len()
                );
                Ok(prescription)
            }
            Err(e) => {
                warn!("Medications for prescription {} failed, rolling back: {}", prescription.id, e);
                let path = format!("/rest/v1/prescriptions?id=eq.{}", prescription.id);
                if let Err(rollback) = self.supabase
                    .request::<Vec<Value>>(Method::DELETE, &path, Some(auth_token), None)
                    .await
                {
                    error!("Rollback of prescription {} failed: {}", prescription.id, rollback);
                }
                Err(PrescriptionError::DatabaseError(e.to_string()))
            }
        }
    }

    /// Newest first, with patient name and medications embedded.
    pub async fn list_prescriptions(
        &self,
        query: &PrescriptionListQuery,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        let mut path = format!(
            "/rest/v1/prescriptions?select={}&order=created_at.desc",
            PRESCRIPTION_SELECT
        );
        if let Some(patient_id) = query.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }

        debug!("Listing prescriptions: {}", path);
        self.fetch(&path, auth_token).await
    }

    pub async fn get_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let path = format!(
            "/rest/v1/prescriptions?id=eq.{}&select={}",
            prescription_id, PRESCRIPTION_SELECT
        );
        self.fetch(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(PrescriptionError::NotFound)
    }

    pub async fn delete_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PrescriptionError> {
        // 404 before touching anything
        self.get_prescription(prescription_id, auth_token).await?;

        let medications = format!("/rest/v1/medications?prescription_id=eq.{}", prescription_id);
        let _: Vec<Value> = self.supabase
            .request(Method::DELETE, &medications, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        let prescription = format!("/rest/v1/prescriptions?id=eq.{}", prescription_id);
        let _: Vec<Value> = self.supabase
            .request(Method::DELETE, &prescription, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        info!("Prescription {} deleted", prescription_id);
        Ok(())
    }

    async fn fetch(&self, path: &str, auth_token: &str) -> Result<Vec<Prescription>, PrescriptionError> {
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Prescription>, _>>()
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))
    }
}
