use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};

use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "Male")]
    Male,
    #[serde(alias = "Female")]
    Female,
    #[serde(alias = "Other")]
    Other,
}

impl FromStr for Gender {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(PatientError::ValidationError(
                "Gender must be male, female or other".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    const ALL: [(BloodGroup, &'static str); 8] = [
        (BloodGroup::APositive, "A+"),
        (BloodGroup::ANegative, "A-"),
        (BloodGroup::BPositive, "B+"),
        (BloodGroup::BNegative, "B-"),
        (BloodGroup::AbPositive, "AB+"),
        (BloodGroup::AbNegative, "AB-"),
        (BloodGroup::OPositive, "O+"),
        (BloodGroup::ONegative, "O-"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(group, _)| group == self)
            .map_or("", |(_, label)| label)
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .find(|(_, label)| *label == normalized)
            .map(|(group, _)| *group)
            .ok_or_else(|| PatientError::ValidationError(format!("Unknown blood group '{}'", s.trim())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    #[serde(default)]
    pub medical_history: Option<serde_json::Value>,
}

impl Patient {
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.dob.and_then(|dob| today.years_since(dob))
    }
}

/// Patient details captured by a booking. Written with upsert on `email`,
/// so a returning patient keeps one row.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertPatient {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<BloodGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientSearchQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorName {
    pub name: String,
}

/// One row of a patient's appointment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientVisit {
    pub id: Uuid,
    pub confirmation_id: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub doctor: Option<DoctorName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    pub appointments: Vec<PatientVisit>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::DatabaseError(msg) => {
                tracing::error!("Patient database error: {}", msg);
                AppError::Database("Failed to load patient".to_string())
            }
        }
    }
}
