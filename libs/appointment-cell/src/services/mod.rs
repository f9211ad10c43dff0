pub mod booking;
pub mod confirmation;
pub mod dashboard;
pub mod lifecycle;
pub mod lookup;
pub mod validation;

pub use booking::AppointmentBookingService;
pub use dashboard::AppointmentDashboardService;
pub use lifecycle::AppointmentLifecycleService;
pub use lookup::AppointmentLookupService;
