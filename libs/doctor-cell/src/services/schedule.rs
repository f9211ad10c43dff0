use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{
    parse_window, BreakTime, DayStatus, DaySchedule, DoctorSchedule, Leave, ScheduleError,
    WorkingHours,
};

pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Dashboard read. A doctor without a schedule row gets the default one
    /// inserted and returned.
    pub async fn get_or_create_schedule(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        debug!("Fetching schedule for doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if let Some(row) = rows.into_iter().next() {
            return serde_json::from_value(row)
                .map_err(|e| ScheduleError::DatabaseError(e.to_string()));
        }

        info!("Creating default schedule for doctor {}", doctor_id);
        let schedule = DoctorSchedule::default_for(doctor_id);
        let body = serde_json::to_value(&schedule)
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let created: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_schedules",
                Some(auth_token),
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        match created.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| ScheduleError::DatabaseError(e.to_string())),
            None => Ok(schedule),
        }
    }

    pub async fn update_working_hours(
        &self,
        doctor_id: Uuid,
        hours: WorkingHours,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        validate_working_hours(&hours)?;
        self.write_column(doctor_id, "working_hours", json!(hours), auth_token).await
    }

    pub async fn update_breaks(
        &self,
        doctor_id: Uuid,
        breaks: Vec<BreakTime>,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        validate_breaks(&breaks)?;
        self.write_column(doctor_id, "breaks", json!(breaks), auth_token).await
    }

    pub async fn update_leaves(
        &self,
        doctor_id: Uuid,
        mut leaves: Vec<Leave>,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        validate_leaves(&leaves)?;
        leaves.sort_by_key(|leave| leave.start_date);
        self.write_column(doctor_id, "leaves", json!(leaves), auth_token).await
    }

    pub async fn update_weekly_schedule(
        &self,
        doctor_id: Uuid,
        weekly: Vec<DaySchedule>,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        validate_weekly_schedule(&weekly)?;
        self.write_column(doctor_id, "weekly_schedule", json!(weekly), auth_token).await
    }

    /// Each edit touches only its own column, so concurrent edits of
    /// different sections do not overwrite each other.
    async fn write_column(
        &self,
        doctor_id: Uuid,
        column: &str,
        value: Value,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        // Make sure the row exists before patching it.
        self.get_or_create_schedule(doctor_id, auth_token).await?;

        debug!("Updating {} for doctor {}", column, doctor_id);
        let path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        let body = json!({
            column: value,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(ScheduleError::NotFound)?;
        let schedule = serde_json::from_value(row)
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        info!("Updated {} for doctor {}", column, doctor_id);
        Ok(schedule)
    }
}

pub fn validate_working_hours(hours: &WorkingHours) -> Result<(), ScheduleError> {
    if hours.start >= hours.end {
        return Err(ScheduleError::InvalidTimeRange { what: "Working hours".to_string() });
    }
    Ok(())
}

pub fn validate_breaks(breaks: &[BreakTime]) -> Result<(), ScheduleError> {
    for b in breaks {
        if b.start >= b.end {
            let what = if b.kind.trim().is_empty() { "Break".to_string() } else { b.kind.clone() };
            return Err(ScheduleError::InvalidTimeRange { what });
        }
    }
    Ok(())
}

pub fn validate_leaves(leaves: &[Leave]) -> Result<(), ScheduleError> {
    for leave in leaves {
        if leave.end_date < leave.start_date {
            return Err(ScheduleError::InvalidLeave(format!(
                "end date {} is before start date {}",
                leave.end_date, leave.start_date
            )));
        }
        if leave.reason_text().is_none() {
            return Err(ScheduleError::InvalidLeave("a reason is required".to_string()));
        }
    }
    Ok(())
}

pub fn validate_weekly_schedule(weekly: &[DaySchedule]) -> Result<(), ScheduleError> {
    let mut seen = HashSet::new();

    for day in weekly {
        let weekday = day.weekday().ok_or_else(|| ScheduleError::InvalidWeekday(day.day.clone()))?;
        if !seen.insert(weekday) {
            return Err(ScheduleError::DuplicateDay(day.day.clone()));
        }

        if day.status == Some(DayStatus::Closed) && !day.slots.is_empty() {
            return Err(ScheduleError::ClosedDayHasSlots(day.day.clone()));
        }
        if day.status != Some(DayStatus::Closed) && day.slots.is_empty() {
            return Err(ScheduleError::OpenDayHasNoSlots(day.day.clone()));
        }

        // Entries that look like ranges must be well-formed ranges.
        for entry in &day.slots {
            if entry.contains(':') && parse_window(entry).is_none() {
                return Err(ScheduleError::InvalidWindow(entry.clone()));
            }
        }
    }

    Ok(())
}
