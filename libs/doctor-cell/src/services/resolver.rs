use chrono::{Datelike, FixedOffset, Months, NaiveDate, Utc};

use shared_config::{
    AppConfig, DEFAULT_MAX_ADVANCE_MONTHS, DEFAULT_SLOT_INTERVAL_MINUTES, MAX_UTC_OFFSET_MINUTES,
};

use crate::models::{DateAvailability, DoctorSchedule, SlotTime, UnavailableReason};

/// Booking rules that are clinic policy rather than per-doctor schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityPolicy {
    pub slot_interval_minutes: u32,
    pub max_advance_months: Option<u32>,
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self {
            slot_interval_minutes: DEFAULT_SLOT_INTERVAL_MINUTES,
            max_advance_months: Some(DEFAULT_MAX_ADVANCE_MONTHS),
        }
    }
}

impl AvailabilityPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            slot_interval_minutes: config.slot_interval_minutes.max(1),
            max_advance_months: config.max_advance_months,
        }
    }
}

/// Today's date on the clinic's wall clock.
pub fn clinic_today(config: &AppConfig) -> NaiveDate {
    let minutes = config
        .clinic_utc_offset_minutes
        .clamp(-MAX_UTC_OFFSET_MINUTES, MAX_UTC_OFFSET_MINUTES);
    match FixedOffset::east_opt(minutes * 60) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// The one place that decides whether a doctor can be booked on a date and
/// which times are still free. Pure: callers fetch the schedule and booked
/// times and pass them in.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityResolver {
    policy: AvailabilityPolicy,
}

impl AvailabilityResolver {
    pub fn new(policy: AvailabilityPolicy) -> Self {
        Self { policy }
    }

    /// Date-level check. Rules apply in order and the first match wins:
    /// past date, beyond the advance window, on leave, non-working weekday.
    pub fn check_date(
        &self,
        schedule: &DoctorSchedule,
        date: NaiveDate,
        today: NaiveDate,
    ) -> DateAvailability {
        if date < today {
            return DateAvailability::Unavailable(UnavailableReason::PastDate);
        }

        if let Some(months) = self.policy.max_advance_months {
            // `None` only past the end of chrono's calendar, where nothing is bookable anyway.
            let too_far = today
                .checked_add_months(Months::new(months))
                .map_or(true, |max_date| date > max_date);
            if too_far {
                return DateAvailability::Unavailable(UnavailableReason::TooFarInAdvance { months });
            }
        }

        if let Some(leave) = schedule.leave_on(date) {
            return DateAvailability::Unavailable(UnavailableReason::OnLeave {
                reason: leave.reason_text().map(str::to_string),
            });
        }

        let weekday = date.weekday();
        match schedule.day(weekday) {
            Some(day) if !day.is_closed() => DateAvailability::Available,
            _ => DateAvailability::Unavailable(UnavailableReason::NotWorkingDay { weekday }),
        }
    }

    /// Times the doctor works on `date`, before removing bookings: every
    /// interval step from the start of working hours, limited to the day's
    /// listed windows when it has any, minus breaks.
    pub fn candidate_slots(&self, schedule: &DoctorSchedule, date: NaiveDate) -> Vec<SlotTime> {
        let start = schedule.working_hours.start.minutes();
        let end = schedule.working_hours.end.minutes();
        if start >= end {
            return vec![];
        }

        let windows = schedule
            .day(date.weekday())
            .map(|day| day.windows())
            .unwrap_or_default();

        (start..end)
            .step_by(self.policy.slot_interval_minutes.max(1) as usize)
            .filter_map(SlotTime::from_minutes)
            .filter(|slot| windows.is_empty() || windows.iter().any(|(ws, we)| ws <= slot && slot < we))
            .filter(|slot| !schedule.breaks.iter().any(|b| b.covers(*slot)))
            .collect()
    }

    /// Free slots in chronological order. Empty when the date itself is not
    /// bookable or everything is taken; that is an answer, not an error.
    pub fn free_slots(
        &self,
        schedule: &DoctorSchedule,
        date: NaiveDate,
        today: NaiveDate,
        booked: &[SlotTime],
    ) -> Vec<SlotTime> {
        if !self.check_date(schedule, date, today).is_available() {
            return vec![];
        }

        let mut slots: Vec<SlotTime> = self
            .candidate_slots(schedule, date)
            .into_iter()
            .filter(|slot| !booked.contains(slot))
            .collect();
        slots.sort();
        slots
    }
}
