use std::fmt::Write as _;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{find_day, AppointmentQuery, ClockTime, RescheduleRequest, SelectedService};
use crate::services::booking::{BookingFlow, SubmitOutcome};
use crate::services::calendar::generate_ics;
use crate::services::clock::{
    calculate_end_time, format_date, is_date_in_past, is_date_in_range, is_date_time_in_past,
};
use crate::services::slots::{
    derive_closing_time, filter_valid_slots, group_by_period, validate_selection,
};
use crate::state::AppState;

/// How far ahead appointments can be booked.
pub const BOOKING_WINDOW_MONTHS: u32 = 2;

/// Drops the stored session token when the backend rejects it.
fn forget_rejected_token(state: &AppState, error: &AppError) -> anyhow::Result<()> {
    if matches!(error, AppError::Unauthorized) {
        tracing::warn!("session expired or token invalid, clearing stored token");
        queries::clear_token(&*state.db()?)?;
    }
    Ok(())
}

fn guard<T>(state: &AppState, result: AppResult<T>) -> anyhow::Result<T> {
    if let Err(e) = &result {
        forget_rejected_token(state, e)?;
    }
    result.map_err(anyhow::Error::from)
}

/// Restores the stored selection and validates it against a fresh feed.
pub async fn load_flow(state: &AppState) -> anyhow::Result<BookingFlow> {
    let selection = queries::load_selection(&*state.db()?)?;
    let days = guard(state, state.backend.fetch_full_availability().await)
        .context("could not load availability, please try again later")?;
    if days.is_empty() {
        anyhow::bail!("availability is empty right now, please try again later");
    }

    let mut flow = BookingFlow::new(selection);
    flow.apply_availability(days);
    save_flow(state, &flow)?;
    Ok(flow)
}

fn save_flow(state: &AppState, flow: &BookingFlow) -> anyhow::Result<()> {
    queries::save_selection(&*state.db()?, flow.selection())
}

fn with_notice(mut out: String, flow: &BookingFlow) -> String {
    if let Some(notice) = flow.notice() {
        let _ = writeln!(out, "note: {notice}");
    }
    out
}

pub async fn show_availability(state: &AppState, today: NaiveDate) -> anyhow::Result<String> {
    let flow = load_flow(state).await?;
    let selectable = flow.selectable_dates(today);
    let mut out = String::new();

    for day in flow.availability() {
        let status = flow.day_status(day.date);
        let marker = if status.is_selected { "*" } else { " " };
        let fits = if is_date_in_past(day.date, today) {
            "past"
        } else if selectable.contains(&day.date) {
            "bookable"
        } else if status.is_open {
            "no fitting slots"
        } else {
            "closed"
        };
        let _ = writeln!(out, "{marker} {} [{fits}]", day.to_human_readable());
    }

    Ok(with_notice(out, &flow))
}

pub async fn list_services(state: &AppState) -> anyhow::Result<String> {
    let services = guard(state, state.backend.list_services().await)?;
    let mut out = String::new();
    for s in &services {
        let _ = writeln!(
            out,
            "{:<24} {:<28} {:>4} min {:>8.2}",
            s.id, s.name, s.duration, s.price
        );
    }
    Ok(out)
}

pub async fn add_service(state: &AppState, service_id: &str) -> anyhow::Result<String> {
    let services = guard(state, state.backend.list_services().await)?;
    let service = services
        .iter()
        .find(|s| s.id == service_id)
        .with_context(|| format!("unknown service: {service_id}"))?;

    let mut flow = load_flow(state).await?;
    flow.add_service(SelectedService::from(service))?;
    save_flow(state, &flow)?;

    let out = format!(
        "added {} (total {} min)\n",
        service.name,
        flow.selection().total_duration()
    );
    Ok(with_notice(out, &flow))
}

pub async fn remove_service(state: &AppState, service_id: &str) -> anyhow::Result<String> {
    let mut flow = load_flow(state).await?;
    let removed = flow.remove_service(service_id)?;
    save_flow(state, &flow)?;

    let out = if removed {
        format!("removed {service_id}\n")
    } else {
        format!("{service_id} was not selected\n")
    };
    Ok(with_notice(out, &flow))
}

pub async fn choose_date(
    state: &AppState,
    date: NaiveDate,
    today: NaiveDate,
) -> anyhow::Result<String> {
    if is_date_in_past(date, today) {
        anyhow::bail!("{date} is in the past");
    }
    if !is_date_in_range(date, today, BOOKING_WINDOW_MONTHS) {
        anyhow::bail!("{date} is more than {BOOKING_WINDOW_MONTHS} months ahead");
    }

    let mut flow = load_flow(state).await?;
    flow.select_date(date)?;
    save_flow(state, &flow)?;

    let mut out = format!("date set to {}\n", format_date(date, true));
    write_slots(&mut out, flow.valid_slots());
    Ok(with_notice(out, &flow))
}

pub async fn choose_time(
    state: &AppState,
    time: ClockTime,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let mut flow = load_flow(state).await?;
    if let Some(date) = flow.selection().date {
        if is_date_time_in_past(date, Some(time), now) {
            anyhow::bail!("{date} {time} has already passed");
        }
    }
    let result = flow.select_time(time);
    save_flow(state, &flow)?;
    result?;

    Ok(with_notice(format!("time set to {time}\n"), &flow))
}

fn write_slots(out: &mut String, slots: &[ClockTime]) {
    if slots.is_empty() {
        let _ = writeln!(out, "no times available for this date");
        return;
    }

    let periods = group_by_period(slots);
    for (label, times) in [
        ("morning", &periods.morning),
        ("afternoon", &periods.afternoon),
        ("evening", &periods.evening),
    ] {
        if times.is_empty() {
            continue;
        }
        let joined = times
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "  {label:<10} {joined}");
    }
}

pub async fn status(state: &AppState) -> anyhow::Result<String> {
    let flow = load_flow(state).await?;
    let selection = flow.selection();
    let mut out = String::new();

    let _ = writeln!(out, "state: {}", flow.state().as_str());
    for s in &selection.services {
        let _ = writeln!(out, "  {} ({} min, {:.2})", s.name, s.duration_minutes, s.price);
    }
    let _ = writeln!(
        out,
        "total: {} min, {:.2}",
        selection.total_duration(),
        selection.total_price()
    );

    match selection.date {
        Some(date) => {
            let _ = writeln!(out, "date: {}", format_date(date, true));
            if let Some(closing) = flow.closing_time(date) {
                let _ = writeln!(out, "last start: {closing}");
            }
        }
        None => {
            let _ = writeln!(out, "date: not selected");
        }
    }
    match selection.time {
        Some(time) => {
            let end = calculate_end_time(time, selection.total_duration());
            let _ = writeln!(out, "time: {time}-{end}");
        }
        None => {
            let _ = writeln!(out, "time: not selected");
            if selection.date.is_some() {
                write_slots(&mut out, flow.valid_slots());
            }
        }
    }
    if let Some(message) = flow.validation().message() {
        let _ = writeln!(out, "invalid: {message}");
    }

    if let Some(notice) = queries::load_reschedule_notice(&*state.db()?)? {
        let _ = writeln!(
            out,
            "last booking was moved from {} {} to {} {}",
            notice.original_date, notice.original_time, notice.new_date, notice.new_time
        );
    }

    Ok(with_notice(out, &flow))
}

pub async fn book(state: &AppState) -> anyhow::Result<String> {
    let mut flow = load_flow(state).await?;
    let outcome = flow.submit(state.backend.as_ref()).await?;

    match outcome {
        SubmitOutcome::Confirmed {
            appointment,
            reschedule,
        } => {
            {
                let db = state.db()?;
                queries::clear_selection(&db)?;
                match &reschedule {
                    Some(notice) => queries::save_reschedule_notice(&db, notice)?,
                    None => queries::clear_reschedule_notice(&db)?,
                }
            }

            let mut out = format!(
                "booked {} on {} at {}\n",
                appointment.id, appointment.date, appointment.time
            );
            if let Some(notice) = reschedule {
                let _ = writeln!(
                    out,
                    "warning: your appointment was automatically moved from {} {} to {} {}",
                    notice.original_date, notice.original_time, notice.new_date, notice.new_time
                );
            }
            Ok(out)
        }
        SubmitOutcome::NeedsReselection { message } => {
            save_flow(state, &flow)?;
            let mut out = format!("{message}\n");
            if flow.selection().date.is_some() {
                write_slots(&mut out, flow.valid_slots());
            }
            Ok(out)
        }
        SubmitOutcome::Failed(e) => {
            save_flow(state, &flow)?;
            forget_rejected_token(state, &e)?;
            let retryable = e.is_retryable();
            let err = anyhow::Error::from(e);
            if retryable {
                Err(err.context("booking failed, please try again"))
            } else {
                Err(err)
            }
        }
    }
}

pub async fn appointments(state: &AppState, query: &AppointmentQuery) -> anyhow::Result<String> {
    let appointments = guard(state, state.backend.user_appointments(query).await)?;
    let mut out = String::new();
    if appointments.is_empty() {
        let _ = writeln!(out, "no appointments");
    }
    for a in &appointments {
        let _ = writeln!(
            out,
            "{:<26} {} {} {:>4} min  {:<18} {}",
            a.id,
            a.calendar_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| a.date.clone()),
            a.time,
            a.total_duration,
            a.status.as_str(),
            a.services.names().join(", ")
        );
    }
    Ok(out)
}

pub async fn cancel(state: &AppState, id: &str, reason: Option<&str>) -> anyhow::Result<String> {
    guard(state, state.backend.cancel_appointment(id, reason).await)?;
    tracing::info!(appointment = id, "appointment cancelled");
    Ok(format!("cancelled {id}\n"))
}

/// Moves an existing appointment, checking the new slot against a fresh feed
/// for the appointment's own duration first.
pub async fn reschedule(
    state: &AppState,
    id: &str,
    date: NaiveDate,
    time: ClockTime,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    if is_date_time_in_past(date, Some(time), now) {
        anyhow::bail!("{date} {time} has already passed");
    }
    if !is_date_in_range(date, now.date(), BOOKING_WINDOW_MONTHS) {
        anyhow::bail!("{date} is more than {BOOKING_WINDOW_MONTHS} months ahead");
    }

    let appointment = guard(state, state.backend.appointment(id).await)?;
    let days = guard(state, state.backend.fetch_full_availability().await)
        .context("could not load availability, please try again later")?;

    let day = find_day(&days, date)
        .filter(|day| day.is_open)
        .with_context(|| format!("{date} is not available for appointments"))?;
    let closing = derive_closing_time(day);
    if !filter_valid_slots(day, appointment.total_duration, closing).contains(&time) {
        match validate_selection(Some(date), Some(time), appointment.total_duration, closing)
            .message()
        {
            Some(message) => anyhow::bail!("{message}"),
            None => anyhow::bail!("{time} is not available on {date}"),
        }
    }

    let request = RescheduleRequest {
        date: Some(date),
        time: Some(time),
        ..RescheduleRequest::default()
    };
    let updated = guard(state, state.backend.reschedule_appointment(id, &request).await)?;
    tracing::info!(appointment = id, date = %date, time = %time, "appointment rescheduled");
    Ok(format!(
        "rescheduled {} to {} {}\n",
        updated.id, updated.date, updated.time
    ))
}

pub async fn set_reminder(state: &AppState, id: &str, enabled: bool) -> anyhow::Result<String> {
    guard(state, state.backend.toggle_reminder(id, enabled).await)?;
    let word = if enabled { "enabled" } else { "disabled" };
    Ok(format!("reminder {word} for {id}\n"))
}

pub async fn export_ics(state: &AppState, id: &str) -> anyhow::Result<String> {
    let appointment = guard(state, state.backend.appointment(id).await)?;
    generate_ics(&appointment, &state.config.business_name)
        .with_context(|| format!("appointment {id} has an unreadable date: {}", appointment.date))
}

pub fn clear(state: &AppState) -> anyhow::Result<String> {
    queries::clear_selection(&*state.db()?)?;
    Ok("selection cleared\n".to_string())
}
