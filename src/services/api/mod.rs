pub mod http;

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::{
    Appointment, AppointmentQuery, CreateAppointmentRequest, CreateAppointmentResponse,
    DayAvailability, RescheduleRequest, Service,
};

/// The remote booking API. The server owns availability, conflict
/// detection and rescheduling; the client only reads and submits.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// Always bypasses any intermediate cache.
    async fn fetch_full_availability(&self) -> AppResult<Vec<DayAvailability>>;

    async fn list_services(&self) -> AppResult<Vec<Service>>;

    async fn create_appointment(
        &self,
        request: &CreateAppointmentRequest,
    ) -> AppResult<CreateAppointmentResponse>;

    async fn user_appointments(&self, query: &AppointmentQuery) -> AppResult<Vec<Appointment>>;

    async fn appointment(&self, id: &str) -> AppResult<Appointment>;

    async fn cancel_appointment(&self, id: &str, reason: Option<&str>) -> AppResult<()>;

    async fn reschedule_appointment(
        &self,
        id: &str,
        request: &RescheduleRequest,
    ) -> AppResult<Appointment>;

    async fn toggle_reminder(&self, id: &str, enabled: bool) -> AppResult<()>;
}
