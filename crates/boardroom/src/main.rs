//! CLI entry point for boardroom.

use std::env;
use std::io;
use std::path::PathBuf;

use anyhow::Result;
use boardroom_app::{JsonDirStore, ProjectConfig, SecretaryService};
use boardroom_core::id::{MeetingId, ParticipantId, ProgramId, TaskId};
use boardroom_core::recurrence::MAX_CYCLES;
use boardroom_core::{Cadence, Frequency, Priority, TaskStatus};
use clap::{Parser, Subcommand, ValueEnum};
use time::OffsetDateTime;
use tracing::debug;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt::format::FmtSpan};

mod commands;

const DATA_DIR_ENV: &str = "BOARDROOM_DATA_DIR";

/// Meetings, decisions and compliance deadlines for the corporate secretary.
#[derive(Parser, Debug)]
#[command(
    name = "boardroom",
    version,
    about = "boardroom: board meetings, decision follow-ups and compliance programs"
)]
struct Cli {
    /// Directory holding the JSON records and config.toml.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the participant directory.
    Participant {
        #[command(subcommand)]
        action: ParticipantCommand,
    },

    /// Schedule meetings, keep minutes and send invitations.
    Meeting {
        #[command(subcommand)]
        action: MeetingCommand,
    },

    /// Track action items.
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Run recurring compliance programs.
    Compliance {
        #[command(subcommand)]
        action: ComplianceCommand,
    },

    /// Inspect or change preferences.
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Write every record into one JSON bundle.
    Export {
        /// Destination file (defaults to stdout).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace records from a JSON bundle.
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ParticipantCommand {
    /// Add a contact.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// List contacts.
    Ls {
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
    /// Remove a contact.
    Rm {
        #[arg(long)]
        id: ParticipantId,
    },
}

#[derive(Subcommand, Debug)]
enum MeetingCommand {
    /// Schedule a meeting.
    New {
        #[arg(long)]
        title: String,
        /// Start time (RFC 3339).
        #[arg(long, value_parser = parse_timestamp)]
        start: OffsetDateTime,
        /// End time (RFC 3339); defaults to the configured meeting length.
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<OffsetDateTime>,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(short = 'a', long = "attendee")]
        attendees: Vec<ParticipantId>,
        /// Days until decisions from this meeting fall due.
        #[arg(long)]
        sla_days: Option<u32>,
    },
    /// List meetings by start time.
    Ls {
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
    /// Print a meeting as JSON.
    Show {
        #[arg(long)]
        id: MeetingId,
    },
    /// Replace the meeting notes.
    Notes {
        #[arg(long)]
        id: MeetingId,
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        /// Read the notes from a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Append an agenda item.
    Agenda {
        #[arg(long)]
        id: MeetingId,
        #[arg(long)]
        title: String,
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long)]
        owner: Option<String>,
        /// Supporting document reference.
        #[arg(long)]
        doc: Option<String>,
    },
    /// Convert decision lines in the notes into tasks.
    Decisions {
        #[arg(long)]
        id: MeetingId,
        /// Owner for every created task.
        #[arg(long)]
        owner: Option<String>,
    },
    /// Render a calendar invitation.
    Ics {
        #[arg(long)]
        id: MeetingId,
        /// Destination file (defaults to stdout).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Create a task, expanding repeats.
    New {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        owner: String,
        /// Deadline (RFC 3339).
        #[arg(long, value_parser = parse_timestamp)]
        due: OffsetDateTime,
        #[arg(long, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long, default_value_t = Frequency::None)]
        repeat: Frequency,
        /// Units of `repeat` between instances.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        every: u32,
        /// Future instances to generate (defaults to the configured value).
        #[arg(long, value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_CYCLES)))]
        cycles: Option<u32>,
    },
    /// List tasks by deadline.
    Ls {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
    /// Change a task's status.
    Status {
        #[arg(long)]
        id: TaskId,
        #[arg(long)]
        status: TaskStatus,
    },
    /// Move a task's deadline.
    Due {
        #[arg(long)]
        id: TaskId,
        #[arg(long, value_parser = parse_timestamp)]
        due: OffsetDateTime,
    },
    /// Delete a task.
    Rm {
        #[arg(long)]
        id: TaskId,
    },
}

#[derive(Subcommand, Debug)]
enum ComplianceCommand {
    /// Register a program.
    New {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        owner: String,
        #[arg(long)]
        cadence: Cadence,
        /// First deadline (RFC 3339).
        #[arg(long, value_parser = parse_timestamp)]
        next_due: OffsetDateTime,
        #[arg(short = 'i', long = "item")]
        items: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List programs.
    Ls {
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
    /// Tick a checklist item (counted from 1).
    Check {
        #[arg(long)]
        id: ProgramId,
        #[arg(long)]
        item: usize,
        /// Untick instead.
        #[arg(long)]
        undo: bool,
    },
    /// Create tasks for unchecked items.
    Push {
        #[arg(long)]
        id: ProgramId,
    },
    /// Close the cycle and roll the deadline forward.
    Complete {
        #[arg(long)]
        id: ProgramId,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print settings as JSON.
    Show,
    /// Change one setting.
    Set {
        #[arg(value_enum)]
        key: SettingKey,
        value: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SettingKey {
    Timezone,
    DecisionSlaDays,
    DefaultMeetingMinutes,
    DefaultDecisionOwner,
    DefaultComplianceOwner,
    IncludeAttendees,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let Cli { data_dir, cmd } = Cli::parse();
    install_tracing();

    let data_dir = resolve_data_dir(data_dir);
    debug!(data_dir = %data_dir.display(), "using data directory");
    let config = ProjectConfig::from_data_dir(&data_dir)?;
    let store = JsonDirStore::new(data_dir);
    let now = OffsetDateTime::now_utc();
    let mut service = SecretaryService::open(store, &config, now)?;
    let mut stdout = io::stdout().lock();
    commands::run(cmd, &mut service, now, &mut stdout)
}

/// Flag first, then the environment, then the platform data directory.
fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        .or_else(|| dirs::data_dir().map(|dir| dir.join("boardroom")))
        .unwrap_or_else(|| PathBuf::from(".boardroom"))
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(raw.trim(), &time::format_description::well_known::Rfc3339)
}

/// Filter built from `RUST_LOG`-style directives, INFO when none are given.
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

fn install_tracing() {
    let directives = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(&directives))
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}
