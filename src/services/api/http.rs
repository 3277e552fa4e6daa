use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::BookingBackend;
use crate::errors::{AppError, AppResult};
use crate::models::{
    Appointment, AppointmentQuery, CreateAppointmentRequest, CreateAppointmentResponse,
    DayAvailability, RescheduleRequest, Service,
};

const DEFAULT_CONFLICT_MESSAGE: &str =
    "The selected time has already been booked. Please choose another time.";

pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> AppResult<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "API URL must start with http:// or https://, got {base_url}"
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        let resp = self.authorized(builder).send().await?;
        check_status(resp).await
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> AppResult<T> {
        let resp = self.send(builder).await?;
        let data: Value = resp.json().await?;
        serde_json::from_value(data).map_err(|e| AppError::InvalidResponse(e.to_string()))
    }
}

async fn check_status(resp: Response) -> AppResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: Value = resp.json().await.unwrap_or(Value::Null);
    tracing::warn!(status = status.as_u16(), body = %body, "booking API returned error");

    match status {
        StatusCode::UNAUTHORIZED => Err(AppError::Unauthorized),
        StatusCode::CONFLICT => Err(AppError::Conflict(
            body["error"]
                .as_str()
                .unwrap_or(DEFAULT_CONFLICT_MESSAGE)
                .to_string(),
        )),
        _ => Err(AppError::Server {
            status: status.as_u16(),
            message: body["message"]
                .as_str()
                .or_else(|| body["error"].as_str())
                .unwrap_or("unknown error")
                .to_string(),
        }),
    }
}

/// Single-appointment endpoints answer either with the document itself or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum AppointmentEnvelope {
    Wrapped { appointment: Appointment },
    Bare(Appointment),
}

impl From<AppointmentEnvelope> for Appointment {
    fn from(envelope: AppointmentEnvelope) -> Self {
        match envelope {
            AppointmentEnvelope::Wrapped { appointment } => appointment,
            AppointmentEnvelope::Bare(appointment) => appointment,
        }
    }
}

#[async_trait]
impl BookingBackend for HttpBackend {
    async fn fetch_full_availability(&self) -> AppResult<Vec<DayAvailability>> {
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();
        let resp = self
            .send(
                self.client
                    .get(self.url("/api/availability/full"))
                    .query(&[("t", cache_buster)]),
            )
            .await?;

        let data: Value = resp.json().await?;
        if !data.is_array() {
            tracing::error!(body = %data, "availability response is not an array");
            return Err(AppError::InvalidResponse(
                "availability response is not a list of days".to_string(),
            ));
        }

        let days: Vec<DayAvailability> =
            serde_json::from_value(data).map_err(|e| AppError::InvalidResponse(e.to_string()))?;
        tracing::debug!(
            days = days.len(),
            closed = days.iter().filter(|d| !d.is_open).count(),
            "fetched availability"
        );
        Ok(days)
    }

    async fn list_services(&self) -> AppResult<Vec<Service>> {
        self.send_json(self.client.get(self.url("/api/services")))
            .await
    }

    async fn create_appointment(
        &self,
        request: &CreateAppointmentRequest,
    ) -> AppResult<CreateAppointmentResponse> {
        self.send_json(self.client.post(self.url("/api/appointments")).json(request))
            .await
    }

    async fn user_appointments(&self, query: &AppointmentQuery) -> AppResult<Vec<Appointment>> {
        self.send_json(
            self.client
                .get(self.url("/api/appointments/user"))
                .query(&query.to_params()),
        )
        .await
    }

    async fn appointment(&self, id: &str) -> AppResult<Appointment> {
        let envelope: AppointmentEnvelope = self
            .send_json(self.client.get(self.url(&format!("/api/appointments/{id}"))))
            .await?;
        Ok(envelope.into())
    }

    async fn cancel_appointment(&self, id: &str, reason: Option<&str>) -> AppResult<()> {
        self.send(
            self.client
                .put(self.url(&format!("/api/appointments/{id}/cancel")))
                .json(&json!({ "reason": reason })),
        )
        .await?;
        Ok(())
    }

    async fn reschedule_appointment(
        &self,
        id: &str,
        request: &RescheduleRequest,
    ) -> AppResult<Appointment> {
        let envelope: AppointmentEnvelope = self
            .send_json(
                self.client
                    .put(self.url(&format!("/api/appointments/{id}/reschedule")))
                    .json(request),
            )
            .await?;
        Ok(envelope.into())
    }

    async fn toggle_reminder(&self, id: &str, enabled: bool) -> AppResult<()> {
        self.send(
            self.client
                .put(self.url(&format!("/api/reminders/appointments/{id}/toggle")))
                .json(&json!({ "enabled": enabled })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_url_without_scheme() {
        let result = HttpBackend::new("localhost:5000", None, Duration::from_secs(10));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend =
            HttpBackend::new("http://localhost:5000/", None, Duration::from_secs(10)).unwrap();
        assert_eq!(
            backend.url("/api/services"),
            "http://localhost:5000/api/services"
        );
    }

    #[test]
    fn test_envelope_accepts_both_shapes() {
        let bare = r#"{"_id":"a1","user":"u1","services":["s1"],"date":"2025-06-16","time":"10:00","totalDuration":30,"status":"pending","createdAt":"2025-06-01"}"#;
        let wrapped = format!(r#"{{"success":true,"appointment":{bare}}}"#);

        let a: Appointment = serde_json::from_str::<AppointmentEnvelope>(bare).unwrap().into();
        let b: Appointment = serde_json::from_str::<AppointmentEnvelope>(&wrapped)
            .unwrap()
            .into();
        assert_eq!(a.id, "a1");
        assert_eq!(b.id, "a1");
    }
}
