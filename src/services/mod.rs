pub mod api;
pub mod booking;
pub mod calendar;
pub mod clock;
pub mod slots;
