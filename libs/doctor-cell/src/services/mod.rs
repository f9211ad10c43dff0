pub mod availability;
pub mod doctor;
pub mod resolver;
pub mod schedule;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use resolver::{AvailabilityPolicy, AvailabilityResolver};
pub use schedule::ScheduleService;
