use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{find_day, ClockTime, DayAvailability};
use crate::services::clock::{end_minutes, minutes_to_time};

/// The last slot start is treated as the final half hour of the day, so an
/// appointment may run this long past it.
pub const CLOSING_GRACE_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Date, time or services still missing. Not an error.
    Undecided,
    Valid,
    Invalid { message: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Validation::Invalid { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayStatus {
    pub is_selected: bool,
    pub is_open: bool,
    pub has_slots: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPeriods {
    pub morning: Vec<ClockTime>,
    pub afternoon: Vec<ClockTime>,
    pub evening: Vec<ClockTime>,
}

/// Latest slot start of the day, regardless of whether it is still free.
pub fn derive_closing_time(day: &DayAvailability) -> Option<ClockTime> {
    day.slots.iter().map(|slot| slot.time).max()
}

pub fn closing_times(days: &[DayAvailability]) -> BTreeMap<NaiveDate, ClockTime> {
    days.iter()
        .filter_map(|day| derive_closing_time(day).map(|closing| (day.date, closing)))
        .collect()
}

fn fits_before_closing(start: ClockTime, total_minutes: u32, closing: ClockTime) -> bool {
    end_minutes(start, total_minutes) <= closing.minutes() + CLOSING_GRACE_MINUTES
}

/// Available slots of an open day that can hold `total_minutes` of services.
pub fn filter_valid_slots(
    day: &DayAvailability,
    total_minutes: u32,
    closing: Option<ClockTime>,
) -> Vec<ClockTime> {
    if !day.is_open {
        return vec![];
    }

    day.slots
        .iter()
        .filter(|slot| slot.available)
        .map(|slot| slot.time)
        .filter(|&start| match closing {
            Some(closing) if total_minutes > 0 => {
                fits_before_closing(start, total_minutes, closing)
            }
            _ => true,
        })
        .collect()
}

pub fn validate_selection(
    date: Option<NaiveDate>,
    time: Option<ClockTime>,
    total_minutes: u32,
    closing: Option<ClockTime>,
) -> Validation {
    let time = match (date, time) {
        (Some(_), Some(time)) if total_minutes > 0 => time,
        _ => return Validation::Undecided,
    };

    let Some(closing) = closing else {
        return Validation::Valid;
    };

    if fits_before_closing(time, total_minutes, closing) {
        Validation::Valid
    } else {
        let end = minutes_to_time(end_minutes(time, total_minutes));
        Validation::Invalid {
            message: format!(
                "Your appointment would end at {end}, but opening hours end at {closing}. Please choose an earlier time."
            ),
        }
    }
}

pub fn day_status(
    days: &[DayAvailability],
    date: NaiveDate,
    total_minutes: u32,
    selected: Option<NaiveDate>,
) -> DayStatus {
    let day = find_day(days, date);
    DayStatus {
        is_selected: selected == Some(date),
        is_open: day.map(|d| d.is_open).unwrap_or(false),
        has_slots: day
            .map(|d| !filter_valid_slots(d, total_minutes, derive_closing_time(d)).is_empty())
            .unwrap_or(false),
    }
}

/// Open, non-past days with at least one slot that fits the selection.
pub fn selectable_dates(
    days: &[DayAvailability],
    total_minutes: u32,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    days.iter()
        .filter(|day| day.date >= today)
        .filter(|day| {
            !filter_valid_slots(day, total_minutes, derive_closing_time(day)).is_empty()
        })
        .map(|day| day.date)
        .collect()
}

pub fn group_by_period(slots: &[ClockTime]) -> SlotPeriods {
    let mut periods = SlotPeriods::default();
    for &slot in slots {
        match slot.hour() {
            0..=11 => periods.morning.push(slot),
            12..=16 => periods.afternoon.push(slot),
            _ => periods.evening.push(slot),
        }
    }
    periods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSlot;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Half-hour slots from 09:00 through 19:30, all free.
    fn full_day(date: &str) -> DayAvailability {
        let slots = (18..=39)
            .map(|half_hours| TimeSlot {
                time: ClockTime::from_minutes(half_hours * 30).unwrap(),
                available: true,
            })
            .collect();
        DayAvailability {
            date: d(date),
            is_open: true,
            slots,
        }
    }

    #[test]
    fn test_closing_time_is_latest_slot() {
        let mut day = full_day("2025-06-16");
        day.slots.reverse();
        assert_eq!(derive_closing_time(&day), Some(t("19:30")));
    }

    #[test]
    fn test_closing_time_none_without_slots() {
        let day = DayAvailability {
            date: d("2025-06-16"),
            is_open: true,
            slots: vec![],
        };
        assert_eq!(derive_closing_time(&day), None);
        assert!(closing_times(&[day]).is_empty());
    }

    #[test]
    fn test_sixty_minutes_last_slot_is_seven_pm() {
        let day = full_day("2025-06-16");
        let closing = derive_closing_time(&day);
        let valid = filter_valid_slots(&day, 60, closing);
        assert_eq!(valid.last(), Some(&t("19:00")));
        assert!(!valid.contains(&t("19:30")));
        assert_eq!(valid.first(), Some(&t("09:00")));
    }

    #[test]
    fn test_filter_matches_closing_bound_for_every_slot() {
        let day = full_day("2025-06-16");
        let closing = derive_closing_time(&day).unwrap();
        for duration in [15, 30, 45, 60, 90, 120, 600] {
            let valid = filter_valid_slots(&day, duration, Some(closing));
            for slot in &day.slots {
                let expected = slot.time.minutes() + duration <= closing.minutes() + 30;
                assert_eq!(valid.contains(&slot.time), expected, "{} +{duration}", slot.time);
            }
        }
    }

    #[test]
    fn test_closed_day_yields_nothing() {
        let mut day = full_day("2025-06-15");
        day.is_open = false;
        for duration in [0, 30, 60] {
            assert!(filter_valid_slots(&day, duration, derive_closing_time(&day)).is_empty());
            assert!(filter_valid_slots(&day, duration, None).is_empty());
        }
    }

    #[test]
    fn test_zero_duration_passes_all_available() {
        let mut day = full_day("2025-06-16");
        day.slots[1].available = false;
        let valid = filter_valid_slots(&day, 0, derive_closing_time(&day));
        assert_eq!(valid, day.available_times());
        assert_eq!(valid.len(), day.slots.len() - 1);
    }

    #[test]
    fn test_unknown_closing_passes_all_available() {
        let day = full_day("2025-06-16");
        assert_eq!(filter_valid_slots(&day, 600, None).len(), day.slots.len());
    }

    #[test]
    fn test_filter_preserves_feed_order() {
        let mut day = full_day("2025-06-16");
        day.slots.swap(0, 3);
        let valid = filter_valid_slots(&day, 30, derive_closing_time(&day));
        assert_eq!(valid[0], day.slots[0].time);
        assert_eq!(valid[3], day.slots[3].time);
    }

    #[test]
    fn test_validate_undecided_without_inputs() {
        let closing = Some(t("19:30"));
        assert_eq!(
            validate_selection(None, Some(t("10:00")), 30, closing),
            Validation::Undecided
        );
        assert_eq!(
            validate_selection(Some(d("2025-06-16")), None, 30, closing),
            Validation::Undecided
        );
        assert_eq!(
            validate_selection(Some(d("2025-06-16")), Some(t("10:00")), 0, closing),
            Validation::Undecided
        );
    }

    #[test]
    fn test_validate_without_closing_is_valid() {
        let v = validate_selection(Some(d("2025-06-16")), Some(t("23:00")), 120, None);
        assert!(v.is_valid());
    }

    #[test]
    fn test_validate_reports_end_and_closing() {
        let v = validate_selection(Some(d("2025-06-16")), Some(t("19:30")), 60, Some(t("19:30")));
        assert!(!v.is_valid());
        let msg = v.message().unwrap();
        assert!(msg.contains("20:30"), "{msg}");
        assert!(msg.contains("19:30"), "{msg}");
    }

    #[test]
    fn test_validate_boundary_is_inclusive() {
        let v = validate_selection(Some(d("2025-06-16")), Some(t("19:00")), 60, Some(t("19:30")));
        assert_eq!(v, Validation::Valid);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let args = (Some(d("2025-06-16")), Some(t("19:15")), 90, Some(t("19:30")));
        let first = validate_selection(args.0, args.1, args.2, args.3);
        let second = validate_selection(args.0, args.1, args.2, args.3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_day_status() {
        let mut closed = full_day("2025-06-15");
        closed.is_open = false;
        let days = vec![closed, full_day("2025-06-16")];

        let open = day_status(&days, d("2025-06-16"), 60, Some(d("2025-06-16")));
        assert_eq!(
            open,
            DayStatus {
                is_selected: true,
                is_open: true,
                has_slots: true
            }
        );

        let sunday = day_status(&days, d("2025-06-15"), 60, Some(d("2025-06-16")));
        assert!(!sunday.is_open);
        assert!(!sunday.has_slots);
        assert!(!sunday.is_selected);

        let missing = day_status(&days, d("2025-06-20"), 60, None);
        assert!(!missing.is_open);
    }

    #[test]
    fn test_day_status_no_slot_fits() {
        let days = vec![full_day("2025-06-16")];
        // 09:00 + 11h = 20:00 still fits; 11h30 does not fit anywhere.
        assert!(day_status(&days, d("2025-06-16"), 660, None).has_slots);
        assert!(!day_status(&days, d("2025-06-16"), 690, None).has_slots);
    }

    #[test]
    fn test_selectable_dates() {
        let mut closed = full_day("2025-06-15");
        closed.is_open = false;
        let past = full_day("2025-06-13");
        let days = vec![past, closed, full_day("2025-06-16"), full_day("2025-06-17")];
        let dates = selectable_dates(&days, 30, d("2025-06-14"));
        assert_eq!(dates, vec![d("2025-06-16"), d("2025-06-17")]);
    }

    #[test]
    fn test_group_by_period() {
        let slots = [t("09:00"), t("11:30"), t("12:00"), t("16:30"), t("17:00"), t("19:30")];
        let periods = group_by_period(&slots);
        assert_eq!(periods.morning, vec![t("09:00"), t("11:30")]);
        assert_eq!(periods.afternoon, vec![t("12:00"), t("16:30")]);
        assert_eq!(periods.evening, vec![t("17:00"), t("19:30")]);
    }
}
