use serde::{Deserialize, Serialize};

/// A catalog entry as returned by `GET /api/services`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub duration: u32,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedService {
    pub id: String,
    pub name: String,
    pub duration_minutes: u32,
    pub price: f64,
}

impl SelectedService {
    /// A stored entry is only trusted when it can still contribute to the total duration.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && self.duration_minutes > 0
    }
}

impl From<&Service> for SelectedService {
    fn from(service: &Service) -> Self {
        Self {
            id: service.id.clone(),
            name: service.name.clone(),
            duration_minutes: service.duration,
            price: service.price,
        }
    }
}
