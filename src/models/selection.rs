use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ClockTime, SelectedService};

/// What the customer has picked so far. Persisted locally between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub date: Option<NaiveDate>,
    pub time: Option<ClockTime>,
    #[serde(default)]
    pub services: Vec<SelectedService>,
}

impl Selection {
    pub fn total_duration(&self) -> u32 {
        self.services
            .iter()
            .fold(0u32, |total, s| total.saturating_add(s.duration_minutes))
    }

    pub fn total_price(&self) -> f64 {
        self.services.iter().map(|s| s.price).sum()
    }

    /// Re-adding a service replaces it and moves it to the end.
    pub fn add_service(&mut self, service: SelectedService) {
        self.services.retain(|s| s.id != service.id);
        self.services.push(service);
    }

    pub fn remove_service(&mut self, service_id: &str) -> bool {
        let before = self.services.len();
        self.services.retain(|s| s.id != service_id);
        self.services.len() != before
    }

    pub fn service_ids(&self) -> Vec<String> {
        self.services.iter().map(|s| s.id.clone()).collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
