use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOGIN_URL: &str = "/login";
pub const DEFAULT_SLOT_INTERVAL_MINUTES: u32 = 30;
pub const DEFAULT_MAX_ADVANCE_MONTHS: u32 = 3;
/// Largest clinic offset from UTC, just under a day either way.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 23 * 60 + 59;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub port: u16,
    /// Where unauthenticated browser requests to dashboard routes are sent.
    pub login_url: String,
    pub slot_interval_minutes: u32,
    /// `None` disables the booking window cap.
    pub max_advance_months: Option<u32>,
    /// Offset of the clinic's wall clock from UTC; decides what "today" is.
    pub clinic_utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            port: DEFAULT_PORT,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            slot_interval_minutes: DEFAULT_SLOT_INTERVAL_MINUTES,
            max_advance_months: Some(DEFAULT_MAX_ADVANCE_MONTHS),
            clinic_utc_offset_minutes: 0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let slot_interval_minutes = parse_var("SLOT_INTERVAL_MINUTES", DEFAULT_SLOT_INTERVAL_MINUTES);
        let slot_interval_minutes = if (5..=240).contains(&slot_interval_minutes) {
            slot_interval_minutes
        } else {
            warn!(
                "SLOT_INTERVAL_MINUTES={} out of range 5..=240, using {}",
                slot_interval_minutes, DEFAULT_SLOT_INTERVAL_MINUTES
            );
            DEFAULT_SLOT_INTERVAL_MINUTES
        };

        let max_advance_months = match parse_var("BOOKING_MAX_ADVANCE_MONTHS", DEFAULT_MAX_ADVANCE_MONTHS) {
            0 => None,
            months => Some(months),
        };

        let clinic_utc_offset_minutes = checked_utc_offset(parse_var("CLINIC_UTC_OFFSET_MINUTES", 0));

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            port: parse_var("PORT", DEFAULT_PORT),
            login_url: env::var("LOGIN_URL")
                .unwrap_or_else(|_| DEFAULT_LOGIN_URL.to_string()),
            slot_interval_minutes,
            max_advance_months,
            clinic_utc_offset_minutes,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

/// Offsets beyond a day are rejected in favour of UTC.
pub fn checked_utc_offset(minutes: i32) -> i32 {
    if (-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&minutes) {
        minutes
    } else {
        warn!(
            "CLINIC_UTC_OFFSET_MINUTES={} out of range -{max}..={max}, using 0",
            minutes,
            max = MAX_UTC_OFFSET_MINUTES
        );
        0
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
