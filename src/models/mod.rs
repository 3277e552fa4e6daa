pub mod appointment;
pub mod availability;
pub mod clock_time;
pub mod selection;
pub mod service;

pub use appointment::{
    Appointment, AppointmentQuery, AppointmentServices, AppointmentStatus, AppointmentUser,
    CreateAppointmentRequest, CreateAppointmentResponse, RescheduleNotice, RescheduleRequest,
};
pub use availability::{find_day, DayAvailability, TimeSlot};
pub use clock_time::{ClockTime, ParseClockTimeError};
pub use selection::Selection;
pub use service::{SelectedService, Service};
