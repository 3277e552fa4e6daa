use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::errors::{AppError, AppResult};
use crate::models::{
    find_day, Appointment, ClockTime, CreateAppointmentRequest, CreateAppointmentResponse,
    DayAvailability, RescheduleNotice, SelectedService, Selection,
};
use crate::services::api::BookingBackend;
use crate::services::slots::{
    self, closing_times, derive_closing_time, filter_valid_slots, validate_selection, DayStatus,
    Validation,
};

/// Client-observable states of the booking flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    NoServicesSelected,
    DateUnselected,
    TimeUnselected,
    Ready,
    Submitting,
    Confirmed,
    ConflictNeedsReselection,
    HardError,
}

impl BookingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingState::NoServicesSelected => "no_services_selected",
            BookingState::DateUnselected => "date_unselected",
            BookingState::TimeUnselected => "time_unselected",
            BookingState::Ready => "ready",
            BookingState::Submitting => "submitting",
            BookingState::Confirmed => "confirmed",
            BookingState::ConflictNeedsReselection => "conflict_needs_reselection",
            BookingState::HardError => "hard_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Editing,
    Submitting,
    Confirmed,
    Conflict,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    DateUnavailable,
    TimeUnavailable,
    DurationExceedsClosing { message: String },
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::DateUnavailable => "date no longer available",
            ConflictReason::TimeUnavailable => "time no longer available",
            ConflictReason::DurationExceedsClosing { .. } => "duration no longer fits",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::DateUnavailable => write!(
                f,
                "Sorry, this day is no longer available. Please choose another date."
            ),
            ConflictReason::TimeUnavailable => write!(
                f,
                "Sorry, this time is no longer available. Please choose another time."
            ),
            ConflictReason::DurationExceedsClosing { message } => write!(f, "{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reason: ConflictReason,
    /// Valid slots for the selected day in the fresh feed.
    pub valid_slots: Vec<ClockTime>,
}

/// Result of re-checking a selection against a freshly fetched feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub days: Vec<DayAvailability>,
    pub rejection: Option<Rejection>,
}

impl Reconciliation {
    pub fn is_ok(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Last-call check before committing: the slot may have been taken since it
/// was picked. There is still a window between this and the create call, so
/// the server remains the final arbiter.
pub async fn reconcile_before_submit(
    backend: &dyn BookingBackend,
    date: NaiveDate,
    time: ClockTime,
    total_minutes: u32,
) -> AppResult<Reconciliation> {
    let days = backend.fetch_full_availability().await?;
    if days.is_empty() {
        return Err(AppError::InvalidResponse("availability feed is empty".to_string()));
    }
    let rejection = check_fresh_feed(&days, date, time, total_minutes);

    if let Some(rejection) = &rejection {
        tracing::warn!(
            date = %date,
            time = %time,
            reason = rejection.reason.as_str(),
            "selection failed pre-submit reconciliation"
        );
    }

    Ok(Reconciliation { days, rejection })
}

fn check_fresh_feed(
    days: &[DayAvailability],
    date: NaiveDate,
    time: ClockTime,
    total_minutes: u32,
) -> Option<Rejection> {
    let day = match find_day(days, date) {
        Some(day) if day.is_open => day,
        _ => {
            return Some(Rejection {
                reason: ConflictReason::DateUnavailable,
                valid_slots: vec![],
            })
        }
    };

    let closing = derive_closing_time(day);
    let valid_slots = filter_valid_slots(day, total_minutes, closing);

    if !day.is_slot_available(time) {
        return Some(Rejection {
            reason: ConflictReason::TimeUnavailable,
            valid_slots,
        });
    }

    if let Validation::Invalid { message } =
        validate_selection(Some(date), Some(time), total_minutes, closing)
    {
        return Some(Rejection {
            reason: ConflictReason::DurationExceedsClosing { message },
            valid_slots,
        });
    }

    None
}

/// A submission that passed local validation and holds the busy flag.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    pub date: NaiveDate,
    pub time: ClockTime,
    pub total_minutes: u32,
    pub request: CreateAppointmentRequest,
}

#[derive(Debug)]
pub enum SubmitAttempt {
    Rejected(Reconciliation),
    Created(CreateAppointmentResponse),
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Confirmed {
        appointment: Appointment,
        reschedule: Option<RescheduleNotice>,
    },
    NeedsReselection {
        message: String,
    },
    Failed(AppError),
}

/// Runs the network half of a submission: reconcile, then create.
pub async fn execute_submission(
    backend: &dyn BookingBackend,
    pending: &PendingSubmission,
) -> AppResult<SubmitAttempt> {
    let reconciliation =
        reconcile_before_submit(backend, pending.date, pending.time, pending.total_minutes).await?;
    if !reconciliation.is_ok() {
        return Ok(SubmitAttempt::Rejected(reconciliation));
    }

    let response = backend.create_appointment(&pending.request).await?;
    Ok(SubmitAttempt::Created(response))
}

/// Selection state for one customer plus the last availability feed it was
/// validated against.
#[derive(Debug, Clone)]
pub struct BookingFlow {
    availability: Vec<DayAvailability>,
    closing_times: BTreeMap<NaiveDate, ClockTime>,
    selection: Selection,
    valid_slots: Vec<ClockTime>,
    notice: Option<String>,
    phase: Phase,
    busy: bool,
}

impl BookingFlow {
    pub fn new(selection: Selection) -> Self {
        Self {
            availability: vec![],
            closing_times: BTreeMap::new(),
            selection,
            valid_slots: vec![],
            notice: None,
            phase: Phase::Editing,
            busy: false,
        }
    }

    pub fn state(&self) -> BookingState {
        match self.phase {
            Phase::Submitting => BookingState::Submitting,
            Phase::Confirmed => BookingState::Confirmed,
            Phase::Conflict => BookingState::ConflictNeedsReselection,
            Phase::Failed => BookingState::HardError,
            Phase::Editing => {
                if self.selection.services.is_empty() {
                    BookingState::NoServicesSelected
                } else if self.selection.date.is_none() {
                    BookingState::DateUnselected
                } else if self.selection.time.is_none() {
                    BookingState::TimeUnselected
                } else {
                    BookingState::Ready
                }
            }
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn availability(&self) -> &[DayAvailability] {
        &self.availability
    }

    /// Valid start times for the selected date, in feed order.
    pub fn valid_slots(&self) -> &[ClockTime] {
        &self.valid_slots
    }

    /// Latest user-facing message: a validation failure, an invalidated
    /// choice, a conflict, or a reschedule warning.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn closing_time(&self, date: NaiveDate) -> Option<ClockTime> {
        self.closing_times.get(&date).copied()
    }

    pub fn validation(&self) -> Validation {
        let closing = self.selection.date.and_then(|d| self.closing_time(d));
        validate_selection(
            self.selection.date,
            self.selection.time,
            self.selection.total_duration(),
            closing,
        )
    }

    pub fn day_status(&self, date: NaiveDate) -> DayStatus {
        slots::day_status(
            &self.availability,
            date,
            self.selection.total_duration(),
            self.selection.date,
        )
    }

    pub fn selectable_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        slots::selectable_dates(&self.availability, self.selection.total_duration(), today)
    }

    /// Replaces the feed wholesale and drops any part of the selection it no
    /// longer supports.
    pub fn apply_availability(&mut self, days: Vec<DayAvailability>) {
        self.closing_times = closing_times(&days);
        self.availability = days;

        if let Some(date) = self.selection.date {
            let still_open = find_day(&self.availability, date)
                .map(|day| day.is_open)
                .unwrap_or(false);
            if !still_open {
                tracing::info!(date = %date, "selected date no longer open, clearing");
                self.selection.date = None;
                self.selection.time = None;
                self.notice = Some(
                    "The selected day is no longer available. Please choose another date."
                        .to_string(),
                );
            }
        }

        self.revalidate();
    }

    pub fn select_date(&mut self, date: NaiveDate) -> AppResult<()> {
        self.ensure_idle()?;

        let is_open = find_day(&self.availability, date)
            .map(|day| day.is_open)
            .unwrap_or(false);
        if !is_open {
            return Err(AppError::InvalidSelection(
                "This day is not available for appointments".to_string(),
            ));
        }

        self.phase = Phase::Editing;
        self.notice = None;
        self.selection.date = Some(date);
        self.selection.time = None;
        self.revalidate();

        let total = self.selection.total_duration();
        if self.valid_slots.is_empty() && total > 0 {
            let closes = self
                .closing_time(date)
                .map(|c| format!(" (last start time is {c})"))
                .unwrap_or_default();
            self.notice = Some(format!(
                "No times available for services lasting {total} minutes{closes}."
            ));
        }

        Ok(())
    }

    pub fn select_time(&mut self, time: ClockTime) -> AppResult<()> {
        self.ensure_idle()?;

        let Some(date) = self.selection.date else {
            return Err(AppError::InvalidSelection(
                "Please choose a date first".to_string(),
            ));
        };

        let validation = validate_selection(
            Some(date),
            Some(time),
            self.selection.total_duration(),
            self.closing_time(date),
        );
        if let Validation::Invalid { message } = validation {
            self.notice = Some(message.clone());
            return Err(AppError::InvalidSelection(message));
        }

        if !self.valid_slots.contains(&time) {
            return Err(AppError::InvalidSelection(format!(
                "{time} is not available on {date}"
            )));
        }

        self.phase = Phase::Editing;
        self.notice = None;
        self.selection.time = Some(time);
        Ok(())
    }

    pub fn add_service(&mut self, service: SelectedService) -> AppResult<()> {
        self.ensure_idle()?;
        self.phase = Phase::Editing;
        self.selection.add_service(service);
        self.revalidate();
        Ok(())
    }

    pub fn remove_service(&mut self, service_id: &str) -> AppResult<bool> {
        self.ensure_idle()?;
        self.phase = Phase::Editing;
        let removed = self.selection.remove_service(service_id);
        self.revalidate();
        Ok(removed)
    }

    /// Explicit cancellation by the user.
    pub fn clear(&mut self) -> AppResult<()> {
        self.ensure_idle()?;
        self.selection.clear();
        self.phase = Phase::Editing;
        self.notice = None;
        self.valid_slots.clear();
        Ok(())
    }

    /// Validates locally and takes the busy flag. A second call before
    /// [`BookingFlow::finish_submit`] fails with [`AppError::Busy`].
    pub fn begin_submit(&mut self) -> AppResult<PendingSubmission> {
        self.ensure_idle()?;

        let (date, time) = match (self.selection.date, self.selection.time) {
            (Some(date), Some(time)) if !self.selection.services.is_empty() => (date, time),
            _ => {
                return Err(AppError::InvalidSelection(
                    "Please complete all required fields".to_string(),
                ))
            }
        };

        if let Validation::Invalid { message } = self.validation() {
            self.notice = Some(message.clone());
            return Err(AppError::InvalidSelection(message));
        }

        self.busy = true;
        self.phase = Phase::Submitting;
        self.notice = None;

        Ok(PendingSubmission {
            date,
            time,
            total_minutes: self.selection.total_duration(),
            request: CreateAppointmentRequest {
                services: self.selection.service_ids(),
                date,
                time,
                employee: None,
                notes: None,
            },
        })
    }

    /// Applies the result of [`execute_submission`] and releases the busy flag.
    pub fn finish_submit(
        &mut self,
        pending: &PendingSubmission,
        attempt: AppResult<SubmitAttempt>,
    ) -> SubmitOutcome {
        self.busy = false;

        match attempt {
            Ok(SubmitAttempt::Created(response)) => {
                let reschedule = response.rescheduled.then(|| RescheduleNotice {
                    original_date: pending.date,
                    original_time: pending.time,
                    new_date: response.appointment.date.clone(),
                    new_time: response.appointment.time,
                });

                tracing::info!(
                    appointment = %response.appointment.id,
                    rescheduled = response.rescheduled,
                    "appointment created"
                );

                self.phase = Phase::Confirmed;
                self.selection.clear();
                self.valid_slots.clear();
                self.notice = reschedule.as_ref().map(|_| {
                    "Your appointment was automatically rescheduled due to a scheduling conflict."
                        .to_string()
                });

                SubmitOutcome::Confirmed {
                    appointment: response.appointment,
                    reschedule,
                }
            }
            Ok(SubmitAttempt::Rejected(reconciliation)) => {
                let rejection = reconciliation
                    .rejection
                    .clone()
                    .unwrap_or(Rejection {
                        reason: ConflictReason::TimeUnavailable,
                        valid_slots: vec![],
                    });

                self.closing_times = closing_times(&reconciliation.days);
                self.availability = reconciliation.days;
                if rejection.reason == ConflictReason::DateUnavailable {
                    self.selection.date = None;
                }
                self.selection.time = None;
                self.valid_slots = rejection.valid_slots;

                let message = rejection.reason.to_string();
                self.phase = Phase::Conflict;
                self.notice = Some(message.clone());
                SubmitOutcome::NeedsReselection { message }
            }
            Err(AppError::Conflict(message)) => {
                tracing::warn!(date = %pending.date, time = %pending.time, "server reported booking conflict");
                self.selection.time = None;
                self.phase = Phase::Conflict;
                self.notice = Some(message.clone());
                SubmitOutcome::NeedsReselection { message }
            }
            Err(e) => {
                tracing::error!(error = %e, "appointment submission failed");
                self.phase = Phase::Failed;
                self.notice = Some(e.to_string());
                SubmitOutcome::Failed(e)
            }
        }
    }

    /// Full submission: local check, reconciliation against a fresh feed,
    /// then the create call. Errors only when the submission never started.
    pub async fn submit(&mut self, backend: &dyn BookingBackend) -> AppResult<SubmitOutcome> {
        let pending = self.begin_submit()?;
        let attempt = execute_submission(backend, &pending).await;
        Ok(self.finish_submit(&pending, attempt))
    }

    fn ensure_idle(&self) -> AppResult<()> {
        if self.busy {
            return Err(AppError::Busy);
        }
        Ok(())
    }

    /// Restores the invariant that a selected time is one of the valid slots.
    fn revalidate(&mut self) {
        let total = self.selection.total_duration();
        let date = self.selection.date;
        let closing = date.and_then(|d| self.closing_time(d));

        self.valid_slots = date
            .and_then(|d| find_day(&self.availability, d))
            .map(|day| filter_valid_slots(day, total, closing))
            .unwrap_or_default();

        let Some(time) = self.selection.time else {
            return;
        };
        if self.valid_slots.contains(&time) {
            return;
        }

        let message = match validate_selection(date, Some(time), total, closing) {
            Validation::Invalid { message } => message,
            _ => format!(
                "The selected time ({time}) is no longer valid for the total service duration ({total} min)."
            ),
        };
        tracing::info!(time = %time, total_minutes = total, "clearing invalidated time");
        self.selection.time = None;
        self.notice = Some(message);
    }
}
