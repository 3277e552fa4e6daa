use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use barberbook::commands;
use barberbook::config::AppConfig;
use barberbook::db::{self, queries};
use barberbook::models::{AppointmentQuery, AppointmentStatus, ClockTime};
use barberbook::services::api::http::HttpBackend;
use barberbook::state::AppState;
use chrono::NaiveDate;

#[derive(Parser)]
#[command(name = "barberbook", about = "Book barbershop appointments from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL override
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Local state database path override
    #[arg(long, global = true)]
    db: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show every day in the availability feed
    Availability,
    /// List the service catalog
    Services,
    /// Add a service to the current selection
    AddService { id: String },
    /// Remove a service from the current selection
    RemoveService { id: String },
    /// Pick the appointment date (YYYY-MM-DD)
    Date { date: NaiveDate },
    /// Pick the start time (HH:MM)
    Time { time: ClockTime },
    /// Show the current selection and what can still be picked
    Status,
    /// Re-check availability and book the current selection
    Book,
    /// List your appointments
    Appointments {
        /// Comma-separated statuses; defaults to upcoming ones
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Cancel an appointment
    Cancel {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Move an appointment to another date and time
    Reschedule {
        id: String,
        date: NaiveDate,
        time: ClockTime,
    },
    /// Turn the reminder for an appointment on or off
    Reminder {
        id: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Print an appointment as an iCalendar file
    Ics { id: String },
    /// Manage the stored session token
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
    /// Discard the current selection
    Clear,
}

#[derive(Subcommand)]
enum TokenCommand {
    Set { token: String },
    Clear,
}

fn parse_statuses(raw: &str) -> Vec<AppointmentStatus> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(AppointmentStatus::parse)
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(path) = cli.db {
        config.database_url = path;
    }

    let conn = db::init_db(&config.database_url)?;

    let token = match config.api_token.clone() {
        Some(token) => Some(token),
        None => queries::load_token(&conn)?,
    };
    let backend = HttpBackend::new(&config.api_url, token, config.request_timeout)?;
    tracing::debug!(api_url = %config.api_url, "using booking API");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        backend: Box::new(backend),
    };
    let now = chrono::Local::now().naive_local();
    let today = now.date();

    let output = match cli.command {
        Command::Availability => commands::show_availability(&state, today).await?,
        Command::Services => commands::list_services(&state).await?,
        Command::AddService { id } => commands::add_service(&state, &id).await?,
        Command::RemoveService { id } => commands::remove_service(&state, &id).await?,
        Command::Date { date } => commands::choose_date(&state, date, today).await?,
        Command::Time { time } => commands::choose_time(&state, time, now).await?,
        Command::Status => commands::status(&state).await?,
        Command::Book => commands::book(&state).await?,
        Command::Appointments { status, from, to } => {
            let mut query = match status.as_deref() {
                Some(raw) => AppointmentQuery {
                    statuses: parse_statuses(raw),
                    ..AppointmentQuery::default()
                },
                None => AppointmentQuery::upcoming(),
            };
            query.from = from;
            query.to = to;
            commands::appointments(&state, &query).await?
        }
        Command::Cancel { id, reason } => {
            commands::cancel(&state, &id, reason.as_deref()).await?
        }
        Command::Reschedule { id, date, time } => {
            commands::reschedule(&state, &id, date, time, now).await?
        }
        Command::Reminder { id, enabled } => commands::set_reminder(&state, &id, enabled).await?,
        Command::Ics { id } => commands::export_ics(&state, &id).await?,
        Command::Token { action } => {
            let db = state.db()?;
            match action {
                TokenCommand::Set { token } => queries::save_token(&db, &token)?,
                TokenCommand::Clear => {
                    queries::clear_token(&db)?;
                }
            }
            "token updated\n".to_string()
        }
        Command::Clear => commands::clear(&state)?,
    };

    print!("{output}");
    Ok(())
}
