use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub database_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub business_name: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:5000".to_string()),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "barberbook.db".to_string()),
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            business_name: env::var("BUSINESS_NAME").unwrap_or_else(|_| "Barbershop".to_string()),
        }
    }
}
