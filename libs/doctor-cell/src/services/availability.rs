use anyhow::Result;
use chrono::NaiveDate;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    DateAvailability, DoctorSchedule, SlotAvailability, SlotTime, UnavailableReason,
};
use crate::services::resolver::{clinic_today, AvailabilityPolicy, AvailabilityResolver};

#[derive(Debug, Deserialize)]
struct BookedRow {
    time: String,
}

/// Loads a doctor's schedule and booked times and hands them to the
/// resolver. Every caller that needs an availability answer goes through
/// here.
pub struct AvailabilityService {
    supabase: SupabaseClient,
    resolver: AvailabilityResolver,
    today: NaiveDate,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            resolver: AvailabilityResolver::new(AvailabilityPolicy::from_config(config)),
            today: clinic_today(config),
        }
    }

    /// Pins "today" instead of reading the clinic clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub async fn fetch_schedule(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<DoctorSchedule>> {
        let path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Times held by non-cancelled appointments. Rows whose time cannot be
    /// read are skipped with a warning.
    pub async fn fetch_booked_times(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<SlotTime>> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&status=neq.cancelled&select=time",
            doctor_id, date
        );
        let rows: Vec<BookedRow> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.time.parse::<SlotTime>() {
                Ok(time) => Some(time),
                Err(e) => {
                    warn!("Ignoring booked appointment with unreadable time: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn is_date_available(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<DateAvailability> {
        debug!("Checking date availability for doctor {} on {}", doctor_id, date);

        let verdict = match self.fetch_schedule(doctor_id, auth_token).await? {
            Some(schedule) => self.resolver.check_date(&schedule, date, self.today),
            None => {
                warn!("No schedule found for doctor {}", doctor_id);
                DateAvailability::Unavailable(UnavailableReason::ScheduleUnavailable)
            }
        };

        Ok(verdict)
    }

    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<SlotAvailability> {
        debug!("Fetching available slots for doctor {} on {}", doctor_id, date);

        let (schedule, booked) = futures::try_join!(
            self.fetch_schedule(doctor_id, auth_token),
            self.fetch_booked_times(doctor_id, date, auth_token),
        )?;

        let Some(schedule) = schedule else {
            warn!("No schedule found for doctor {}", doctor_id);
            let verdict = DateAvailability::Unavailable(UnavailableReason::ScheduleUnavailable);
            return Ok(SlotAvailability::new(doctor_id, date, &verdict, vec![]));
        };

        let verdict = self.resolver.check_date(&schedule, date, self.today);
        let slots = self.resolver.free_slots(&schedule, date, self.today, &booked);
        debug!("{} free slots for doctor {} on {}", slots.len(), doctor_id, date);

        Ok(SlotAvailability::new(doctor_id, date, &verdict, slots))
    }
}
