use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ClockTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time: ClockTime,
    pub available: bool,
}

/// One day of the backend's availability feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub is_open: bool,
    #[serde(default)]
    pub slots: Vec<TimeSlot>,
}

impl DayAvailability {
    pub fn from_json(s: &str) -> anyhow::Result<Vec<Self>> {
        let days: Vec<DayAvailability> = serde_json::from_str(s)?;
        Ok(days)
    }

    pub fn slot(&self, time: ClockTime) -> Option<&TimeSlot> {
        self.slots.iter().find(|slot| slot.time == time)
    }

    pub fn is_slot_available(&self, time: ClockTime) -> bool {
        self.slot(time).map(|slot| slot.available).unwrap_or(false)
    }

    pub fn available_times(&self) -> Vec<ClockTime> {
        self.slots
            .iter()
            .filter(|slot| slot.available)
            .map(|slot| slot.time)
            .collect()
    }

    pub fn to_human_readable(&self) -> String {
        let day = self.date.format("%a %Y-%m-%d");
        if !self.is_open {
            return format!("{day}: closed");
        }

        let first = self.slots.iter().map(|s| s.time).min();
        let last = self.slots.iter().map(|s| s.time).max();
        let free = self.slots.iter().filter(|s| s.available).count();

        match (first, last) {
            (Some(first), Some(last)) => {
                format!("{day}: {first}-{last} ({free} of {} free)", self.slots.len())
            }
            _ => format!("{day}: open, no slots"),
        }
    }
}

pub fn find_day(days: &[DayAvailability], date: NaiveDate) -> Option<&DayAvailability> {
    days.iter().find(|day| day.date == date)
}
