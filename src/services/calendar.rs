use chrono::Duration;

use crate::models::Appointment;

/// Renders a single-event iCalendar file for an appointment. Returns `None`
/// when the appointment date cannot be read.
pub fn generate_ics(appointment: &Appointment, business_name: &str) -> Option<String> {
    let start = appointment.starts_at()?;
    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (start + Duration::minutes(i64::from(appointment.total_duration)))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = chrono::DateTime::parse_from_rfc3339(&appointment.created_at)
        .map(|dt| dt.naive_utc())
        .unwrap_or(start)
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let uid = format!("{}@barberbook", appointment.id);

    let summary = format!("Appointment at {business_name}");
    let services = appointment.services.names();
    let description = if services.is_empty() {
        "No services listed".to_string()
    } else {
        services.join(", ")
    };

    Some(format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Barberbook//Booking Client//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
        status = ics_status(appointment),
    ))
}

fn ics_status(appointment: &Appointment) -> &'static str {
    use crate::models::AppointmentStatus;
    match appointment.status {
        AppointmentStatus::Cancelled => "CANCELLED",
        AppointmentStatus::Confirmed | AppointmentStatus::Completed => "CONFIRMED",
        AppointmentStatus::Pending | AppointmentStatus::NeedsRescheduling => "TENTATIVE",
    }
}
