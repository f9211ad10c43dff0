use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use doctor_cell::models::SlotTime;
use patient_cell::models::{BloodGroup, Gender, UpsertPatient};

use crate::models::{AppointmentError, BookAppointmentRequest};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 ()-]*$";
const UTR_PATTERN: &str = r"^[0-9]{12}$";
const MIN_PHONE_DIGITS: usize = 10;

/// A booking form that passed every step.
#[derive(Debug, Clone)]
pub struct ValidatedBooking {
    pub patient: UpsertPatient,
    pub service: String,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub utr_number: String,
}

/// Checks the booking form in the order its steps are filled in and stops
/// at the first problem.
pub struct BookingValidator {
    email: Option<Regex>,
    phone: Option<Regex>,
    utr: Option<Regex>,
}

impl Default for BookingValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingValidator {
    pub fn new() -> Self {
        Self {
            email: Regex::new(EMAIL_PATTERN).ok(),
            phone: Regex::new(PHONE_PATTERN).ok(),
            utr: Regex::new(UTR_PATTERN).ok(),
        }
    }

    pub fn validate(
        &self,
        request: &BookAppointmentRequest,
        today: NaiveDate,
    ) -> Result<ValidatedBooking, AppointmentError> {
        debug!("Validating booking form for {}", request.email);

        // Step 1: personal details
        let name = required(&request.name, "Please enter your full name")?;

        let phone = request.phone.trim();
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if digits < MIN_PHONE_DIGITS || !matches(&self.phone, phone) {
            return Err(invalid("Please enter a valid phone number with at least 10 digits"));
        }

        let email = request.email.trim().to_lowercase();
        if !matches(&self.email, &email) || !email.contains('@') {
            return Err(invalid("Please enter a valid email address"));
        }

        let dob = NaiveDate::parse_from_str(request.dob.trim(), "%Y-%m-%d")
            .map_err(|_| invalid("Please enter your date of birth"))?;
        if dob >= today {
            return Err(invalid("Date of birth must be in the past"));
        }

        let gender: Gender = request.gender.parse().map_err(|_| invalid("Please select your gender"))?;

        let blood_group = match request.blood_group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<BloodGroup>().map_err(|_| invalid("Please select a valid blood group"))?),
        };

        // Step 2: service
        let service = required(&request.service, "Please select a service")?;

        // Step 3: time slot
        let date = request.date.ok_or_else(|| invalid("Please select an appointment date"))?;
        let time: SlotTime = request
            .time
            .parse()
            .map_err(|_| invalid("Please select an appointment time"))?;

        // Step 4: payment
        let utr_number = request.utr_number.trim();
        if !matches(&self.utr, utr_number) || utr_number.len() != 12 {
            return Err(invalid("UTR number must be exactly 12 digits"));
        }

        Ok(ValidatedBooking {
            patient: UpsertPatient {
                name,
                email,
                phone: phone.to_string(),
                dob,
                gender,
                blood_group,
            },
            service,
            date,
            time,
            utr_number: utr_number.to_string(),
        })
    }
}

fn required(value: &str, message: &str) -> Result<String, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(message));
    }
    Ok(trimmed.to_string())
}

// A pattern that failed to compile falls back to the plain checks around it.
fn matches(pattern: &Option<Regex>, value: &str) -> bool {
    pattern.as_ref().map_or(true, |re| re.is_match(value))
}

fn invalid(message: &str) -> AppointmentError {
    AppointmentError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn form() -> BookAppointmentRequest {
        BookAppointmentRequest {
            name: " Meera Nair ".into(),
            phone: "+91 91234 56780".into(),
            email: "Meera@Example.com".into(),
            dob: "1990-05-14".into(),
            gender: "Female".into(),
            blood_group: Some("o+".into()),
            service: "General Check-up".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20),
            time: "10:30 AM".into(),
            utr_number: "123456789012".into(),
            doctor_id: None,
        }
    }

    fn message(result: Result<ValidatedBooking, AppointmentError>) -> String {
        match result {
            Err(AppointmentError::ValidationError(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_form_is_normalized() {
        let booking = BookingValidator::new().validate(&form(), today()).unwrap();
        assert_eq!(booking.patient.name, "Meera Nair");
        assert_eq!(booking.patient.email, "meera@example.com");
        assert_eq!(booking.patient.gender, Gender::Female);
        assert_eq!(booking.patient.blood_group, Some(BloodGroup::OPositive));
        assert_eq!(booking.time.to_string(), "10:30");
    }

    #[test]
    fn personal_details_are_checked_first() {
        let validator = BookingValidator::new();
        let mut request = form();
        request.name = "".into();
        request.utr_number = "1".into();
        assert_eq!(message(validator.validate(&request, today())), "Please enter your full name");
    }

    #[test]
    fn phone_needs_ten_digits() {
        let mut request = form();
        request.phone = "12345 6789".into();
        assert!(message(BookingValidator::new().validate(&request, today())).contains("phone"));
    }

    #[test]
    fn email_must_look_like_an_address() {
        let mut request = form();
        request.email = "meera@example".into();
        assert_eq!(message(BookingValidator::new().validate(&request, today())), "Please enter a valid email address");
    }

    #[test]
    fn dob_must_be_before_today() {
        let mut request = form();
        request.dob = "2026-10-19".into();
        assert_eq!(message(BookingValidator::new().validate(&request, today())), "Date of birth must be in the past");
    }

    #[test]
    fn blank_blood_group_is_allowed() {
        let mut request = form();
        request.blood_group = Some("".into());
        let booking = BookingValidator::new().validate(&request, today()).unwrap();
        assert_eq!(booking.patient.blood_group, None);

        request.blood_group = Some("Z".into());
        assert_matches!(BookingValidator::new().validate(&request, today()), Err(AppointmentError::ValidationError(_)));
    }

    #[test]
    fn missing_slot_is_rejected() {
        let mut request = form();
        request.date = None;
        assert_eq!(message(BookingValidator::new().validate(&request, today())), "Please select an appointment date");

        let mut request = form();
        request.time = "half past ten".into();
        assert_eq!(message(BookingValidator::new().validate(&request, today())), "Please select an appointment time");
    }

    #[test]
    fn utr_must_be_twelve_digits() {
        let validator = BookingValidator::new();
        for utr in ["12345678901", "1234567890123", "12345678901a"] {
            let mut request = form();
            request.utr_number = utr.into();
            assert_eq!(message(validator.validate(&request, today())), "UTR number must be exactly 12 digits");
        }
    }
}
