use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime, Timelike, Weekday};

use shared_models::error::AppError;

// ==============================================================================
// DOCTORS
// ==============================================================================

/// Columns selected from `doctors`; credential columns are never read.
pub const DOCTOR_COLUMNS: &str = "id,created_at,name,email,phone,specialization,experience,license,avatar_url";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub experience: Option<String>,
    pub license: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub experience: Option<String>,
    pub license: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub experience: Option<String>,
    pub avatar_url: Option<String>,
}

// ==============================================================================
// SLOT TIMES
// ==============================================================================

/// A bookable time of day at minute precision.
///
/// Accepts `"09:00"`, `"09:00:00"` and `"09:00 AM"` on input and always
/// renders as 24-hour `"HH:MM"`, so times written by different clients
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::new(minutes / 60, minutes % 60)
    }

    pub fn minutes(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSlotTimeError(pub String);

impl fmt::Display for ParseSlotTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid time '{}', expected HH:MM or hh:MM AM/PM", self.0)
    }
}

impl std::error::Error for ParseSlotTimeError {}

impl FromStr for SlotTime {
    type Err = ParseSlotTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSlotTimeError(s.to_string());
        let upper = s.trim().to_ascii_uppercase();

        let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
            (rest.trim_end(), Some(false))
        } else if let Some(rest) = upper.strip_suffix("PM") {
            (rest.trim_end(), Some(true))
        } else {
            (upper.as_str(), None)
        };

        let mut parts = clock.split(':');
        let hour: u32 = parts.next().and_then(|h| h.trim().parse().ok()).ok_or_else(err)?;
        let minute: u32 = parts.next().and_then(|m| m.trim().parse().ok()).ok_or_else(err)?;
        if let Some(seconds) = parts.next() {
            seconds.trim().parse::<u32>().map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }

        let hour = match meridiem {
            Some(pm) => {
                if !(1..=12).contains(&hour) {
                    return Err(err());
                }
                match (hour, pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                }
            }
            None => hour,
        };

        SlotTime::new(hour, minute).ok_or_else(err)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// SCHEDULES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: SlotTime,
    pub end: SlotTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakTime {
    pub start: SlotTime,
    pub end: SlotTime,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl BreakTime {
    pub fn covers(&self, slot: SlotTime) -> bool {
        self.start <= slot && slot < self.end
    }
}

/// A leave period, both ends inclusive. A single-day leave has
/// `start_date == end_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredLeave")]
pub struct Leave {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Both leave shapes found in stored schedules.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLeave {
    Range {
        #[serde(alias = "startDate")]
        start_date: NaiveDate,
        #[serde(alias = "endDate")]
        end_date: NaiveDate,
        #[serde(default)]
        reason: Option<String>,
    },
    SingleDay {
        date: NaiveDate,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl From<StoredLeave> for Leave {
    fn from(stored: StoredLeave) -> Self {
        match stored {
            StoredLeave::Range { start_date, end_date, reason } => Leave { start_date, end_date, reason },
            StoredLeave::SingleDay { date, reason } => Leave::single_day(date, reason),
        }
    }
}

impl Leave {
    pub fn single_day(date: NaiveDate, reason: Option<String>) -> Self {
        Self { start_date: date, end_date: date, reason }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Trimmed reason, `None` when blank.
    pub fn reason_text(&self) -> Option<&str> {
        self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayStatus {
    #[serde(rename = "Half Day")]
    HalfDay,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: String,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DayStatus>,
}

impl DaySchedule {
    pub fn new(day: Weekday, slots: &[&str], status: Option<DayStatus>) -> Self {
        Self {
            day: weekday_name(day).to_string(),
            slots: slots.iter().map(|s| s.to_string()).collect(),
            status,
        }
    }

    pub fn weekday(&self) -> Option<Weekday> {
        self.day.trim().parse().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.status == Some(DayStatus::Closed) || self.slots.is_empty()
    }

    /// Working windows listed as `"HH:MM - HH:MM"`; entries that do not
    /// parse are skipped.
    pub fn windows(&self) -> Vec<(SlotTime, SlotTime)> {
        self.slots
            .iter()
            .filter_map(|entry| parse_window(entry))
            .collect()
    }
}

pub fn parse_window(entry: &str) -> Option<(SlotTime, SlotTime)> {
    let (start, end) = entry.split_once('-')?;
    let start: SlotTime = start.trim().parse().ok()?;
    let end: SlotTime = end.trim().parse().ok()?;
    (start < end).then_some((start, end))
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub breaks: Vec<BreakTime>,
    #[serde(default)]
    pub leaves: Vec<Leave>,
    #[serde(default)]
    pub weekly_schedule: Vec<DaySchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DoctorSchedule {
    /// Schedule a doctor starts with: 09:00-17:00 on weekdays with a lunch
    /// break, a Saturday morning, Sundays closed.
    pub fn default_for(doctor_id: Uuid) -> Self {
        let weekday_slots = ["09:00 - 13:00", "14:00 - 17:00"];
        let open = |day| DaySchedule::new(day, &weekday_slots, None);

        Self {
            id: None,
            doctor_id,
            working_hours: WorkingHours {
                start: hm(9, 0),
                end: hm(17, 0),
            },
            breaks: vec![BreakTime {
                start: hm(13, 0),
                end: hm(14, 0),
                kind: "Lunch Break".to_string(),
            }],
            leaves: vec![],
            weekly_schedule: vec![
                open(Weekday::Mon),
                open(Weekday::Tue),
                open(Weekday::Wed),
                open(Weekday::Thu),
                open(Weekday::Fri),
                DaySchedule::new(Weekday::Sat, &["09:00 - 13:00"], Some(DayStatus::HalfDay)),
                DaySchedule::new(Weekday::Sun, &[], Some(DayStatus::Closed)),
            ],
            created_at: None,
            updated_at: None,
        }
    }

    pub fn day(&self, weekday: Weekday) -> Option<&DaySchedule> {
        self.weekly_schedule.iter().find(|d| d.weekday() == Some(weekday))
    }

    pub fn leave_on(&self, date: NaiveDate) -> Option<&Leave> {
        self.leaves.iter().find(|leave| leave.contains(date))
    }
}

// Literal clock times only.
fn hm(hour: u32, minute: u32) -> SlotTime {
    SlotTime(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBreaksRequest {
    pub breaks: Vec<BreakTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLeavesRequest {
    pub leaves: Vec<Leave>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWeeklyScheduleRequest {
    pub weekly_schedule: Vec<DaySchedule>,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// Why a date cannot be booked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    PastDate,
    TooFarInAdvance { months: u32 },
    OnLeave { reason: Option<String> },
    NotWorkingDay { weekday: Weekday },
    ScheduleUnavailable,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::PastDate => {
                write!(f, "You cannot book an appointment for a past date")
            }
            UnavailableReason::TooFarInAdvance { months } => {
                write!(f, "Appointments can only be booked up to {} months in advance", months)
            }
            UnavailableReason::OnLeave { reason: Some(reason) } => {
                write!(f, "The doctor is on leave on this date: {}", reason)
            }
            UnavailableReason::OnLeave { reason: None } => {
                write!(f, "The doctor is on leave on this date")
            }
            UnavailableReason::NotWorkingDay { weekday } => {
                write!(f, "The doctor doesn't work on {}s", weekday_name(*weekday))
            }
            UnavailableReason::ScheduleUnavailable => {
                write!(f, "Unable to check doctor's schedule")
            }
        }
    }
}

/// Date-level verdict. Serialized as `{"available": bool, "reason"?: string}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateAvailability {
    Available,
    Unavailable(UnavailableReason),
}

impl DateAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, DateAvailability::Available)
    }

    pub fn reason(&self) -> Option<&UnavailableReason> {
        match self {
            DateAvailability::Available => None,
            DateAvailability::Unavailable(reason) => Some(reason),
        }
    }
}

impl Serialize for DateAvailability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let reason = self.reason().map(|r| r.to_string());
        let mut state = serializer.serialize_struct("DateAvailability", 2)?;
        state.serialize_field("available", &self.is_available())?;
        if let Some(reason) = reason {
            state.serialize_field("reason", &reason)?;
        } else {
            state.skip_field("reason")?;
        }
        state.end()
    }
}

pub const NO_SLOTS_MESSAGE: &str = "No slots available";

/// Slot-level answer for one doctor and date.
#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub slots: Vec<SlotTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SlotAvailability {
    pub fn new(doctor_id: Uuid, date: NaiveDate, verdict: &DateAvailability, slots: Vec<SlotTime>) -> Self {
        let message = (verdict.is_available() && slots.is_empty()).then(|| NO_SLOTS_MESSAGE.to_string());
        Self {
            doctor_id,
            date,
            available: verdict.is_available() && !slots.is_empty(),
            reason: verdict.reason().map(|r| r.to_string()),
            slots,
            message,
        }
    }

    pub fn has_slot(&self, time: SlotTime) -> bool {
        self.slots.contains(&time)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule not found for doctor")]
    NotFound,

    #[error("{what} start time must be before end time")]
    InvalidTimeRange { what: String },

    #[error("Invalid leave: {0}")]
    InvalidLeave(String),

    #[error("Unknown day '{0}' in weekly schedule")]
    InvalidWeekday(String),

    #[error("Day '{0}' appears more than once in weekly schedule")]
    DuplicateDay(String),

    #[error("Invalid working window '{0}', expected HH:MM - HH:MM")]
    InvalidWindow(String),

    #[error("{0} is marked Closed but lists working windows")]
    ClosedDayHasSlots(String),

    #[error("{0} must have at least one time slot or be marked as Closed")]
    OpenDayHasNoSlots(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::NotFound => AppError::NotFound(err.to_string()),
            ScheduleError::DatabaseError(msg) => {
                tracing::error!("Schedule database error: {}", msg);
                AppError::Database("Failed to access schedule".to_string())
            }
            other => AppError::ValidationError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("No doctor is configured for this clinic")]
    NoDoctorConfigured,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::NoDoctorConfigured => AppError::NotFound(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => {
                tracing::error!("Doctor database error: {}", msg);
                AppError::Database("Failed to load doctor".to_string())
            }
        }
    }
}
