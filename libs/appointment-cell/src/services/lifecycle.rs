use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Statuses an appointment may be created with from the dashboard.
    pub fn is_valid_initial_status(&self, status: AppointmentStatus) -> bool {
        !status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use AppointmentStatus::*;

    #[test]
    fn forward_transitions_are_allowed() {
        let lifecycle = AppointmentLifecycleService::new();
        for (from, to) in [(Pending, Confirmed), (Pending, Cancelled), (Confirmed, Completed), (Confirmed, Cancelled)] {
            assert!(lifecycle.validate_status_transition(from, to).is_ok(), "{} -> {}", from, to);
        }
    }

    #[test]
    fn terminal_and_same_status_are_rejected() {
        let lifecycle = AppointmentLifecycleService::new();
        for (from, to) in [
            (Cancelled, Confirmed),
            (Completed, Cancelled),
            (Pending, Pending),
            (Confirmed, Confirmed),
            (Pending, Completed),
        ] {
            assert_matches!(
                lifecycle.validate_status_transition(from, to),
                Err(AppointmentError::InvalidStatusTransition { .. })
            );
        }
    }

    #[test]
    fn completed_is_not_a_valid_initial_status() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.is_valid_initial_status(Confirmed));
        assert!(lifecycle.is_valid_initial_status(Pending));
        assert!(!lifecycle.is_valid_initial_status(Completed));
        assert!(!lifecycle.is_valid_initial_status(Cancelled));
    }
}
