use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::ClockTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NeedsRescheduling,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NeedsRescheduling => "needsRescheduling",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => AppointmentStatus::Confirmed,
            "completed" => AppointmentStatus::Completed,
            "cancelled" => AppointmentStatus::Cancelled,
            "needsRescheduling" => AppointmentStatus::NeedsRescheduling,
            _ => AppointmentStatus::Pending,
        }
    }

    /// Statuses shown in the customer's "upcoming appointments" list.
    pub fn upcoming() -> [AppointmentStatus; 3] {
        [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::NeedsRescheduling,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppointmentUser {
    Id(String),
    Embedded(UserSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: f64,
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppointmentServices {
    Ids(Vec<String>),
    Embedded(Vec<ServiceSummary>),
}

impl AppointmentServices {
    pub fn names(&self) -> Vec<String> {
        match self {
            AppointmentServices::Ids(ids) => ids.clone(),
            AppointmentServices::Embedded(services) => {
                services.iter().map(|s| s.name.clone()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: AppointmentUser,
    pub services: AppointmentServices,
    pub date: String,
    pub time: ClockTime,
    pub total_duration: u32,
    #[serde(deserialize_with = "status_from_str", serialize_with = "status_to_str")]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reminder_sent: bool,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl Appointment {
    /// The backend sends either "YYYY-MM-DD" or a full ISO timestamp.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        self.date
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        self.calendar_date()
            .map(|d| d.and_time(self.time.to_naive_time()))
    }
}

fn status_from_str<'de, D>(deserializer: D) -> Result<AppointmentStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(AppointmentStatus::parse(&s))
}

fn status_to_str<S>(status: &AppointmentStatus, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(status.as_str())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateAppointmentRequest {
    pub services: Vec<String>,
    pub date: NaiveDate,
    pub time: ClockTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial update sent to the reschedule endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<ClockTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentResponse {
    #[serde(default)]
    pub success: bool,
    pub appointment: Appointment,
    #[serde(default)]
    pub rescheduled: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Recorded when the server moved the appointment to a different slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleNotice {
    pub original_date: NaiveDate,
    pub original_time: ClockTime,
    pub new_date: String,
    pub new_time: ClockTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentQuery {
    pub statuses: Vec<AppointmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AppointmentQuery {
    pub fn upcoming() -> Self {
        Self {
            statuses: AppointmentStatus::upcoming().to_vec(),
            ..Self::default()
        }
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![];
        if !self.statuses.is_empty() {
            let joined = self
                .statuses
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("status", joined));
        }
        if let Some(from) = self.from {
            params.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            params.push(("to", to.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NeedsRescheduling,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), status);
        }
        assert_eq!(AppointmentStatus::parse("bogus"), AppointmentStatus::Pending);
    }

    #[test]
    fn test_appointment_with_embedded_services() {
        let json = r#"{
            "_id":"apt-1",
            "user":{"_id":"u1","name":"Ana","email":"ana@example.com","phone":"600"},
            "services":[{"_id":"s1","name":"Haircut","price":15,"duration":30}],
            "date":"2025-06-16T00:00:00.000Z",
            "time":"10:00",
            "totalDuration":30,
            "status":"needsRescheduling",
            "reminderSent":false,
            "createdAt":"2025-06-01T10:00:00.000Z"
        }"#;
        let apt: Appointment = serde_json::from_str(json).unwrap();
        assert_eq!(apt.status, AppointmentStatus::NeedsRescheduling);
        assert_eq!(apt.services.names(), vec!["Haircut"]);
        assert_eq!(
            apt.calendar_date(),
            NaiveDate::from_ymd_opt(2025, 6, 16)
        );
        assert!(matches!(apt.user, AppointmentUser::Embedded(_)));
    }

    #[test]
    fn test_appointment_with_id_references() {
        let json = r#"{"_id":"apt-2","user":"u1","services":["s1","s2"],"date":"2025-06-17","time":"18:30","totalDuration":60,"status":"confirmed","createdAt":"2025-06-01"}"#;
        let apt: Appointment = serde_json::from_str(json).unwrap();
        assert_eq!(apt.services.names(), vec!["s1", "s2"]);
        let start = apt.starts_at().unwrap();
        assert_eq!(start.format("%Y-%m-%d %H:%M").to_string(), "2025-06-17 18:30");
    }

    #[test]
    fn test_create_request_wire_format() {
        let req = CreateAppointmentRequest {
            services: vec!["s1".to_string()],
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time: "09:30".parse().unwrap(),
            employee: None,
            notes: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"services":["s1"],"date":"2025-06-16","time":"09:30"})
        );
    }

    #[test]
    fn test_upcoming_query_params() {
        let params = AppointmentQuery::upcoming().to_params();
        assert_eq!(
            params,
            vec![("status", "pending,confirmed,needsRescheduling".to_string())]
        );
    }
}
