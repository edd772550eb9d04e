use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::id::{MeetingId, ParticipantId, ProgramId, TaskId};

/// Decision SLA applied when neither the meeting nor the caller supplies one.
pub const DEFAULT_DECISION_SLA_DAYS: u32 = 14;

/// Meeting length used when a meeting carries no explicit end.
pub const DEFAULT_MEETING_MINUTES: u32 = 60;

/// A keyword on the command line or in a record did not name a known variant.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// Offending input.
    pub value: String,
}

macro_rules! keyword_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Keyword used on the wire and on the command line.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Unique identifier within the directory.
    pub id: ParticipantId,
    /// Display name; meetings copy this by value.
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Role label such as "Chair" or "CFO".
    #[serde(default)]
    pub role: Option<String>,
}

/// Attendee copied into a meeting from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    /// Display name at the time the attendee was added.
    pub name: String,
    /// Email at the time the attendee was added.
    #[serde(default)]
    pub email: Option<String>,
}

impl From<&Participant> for Attendee {
    fn from(p: &Participant) -> Self {
        Self {
            name: p.name.clone(),
            email: p.email.clone(),
        }
    }
}

/// One line of a meeting agenda.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    /// Topic title.
    pub title: String,
    /// Planned duration.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Presenter, by name.
    #[serde(default)]
    pub owner: Option<String>,
    /// Reference to a supporting document.
    #[serde(default)]
    pub doc_ref: Option<String>,
}

/// Board or committee meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// Identifier.
    pub id: MeetingId,
    /// Title shown in invitations.
    pub title: String,
    /// Start instant.
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    /// End instant; invitations fall back to a one hour slot when absent.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
    /// Free-form location.
    #[serde(default)]
    pub location: String,
    /// Attendees in invitation order.
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    /// Agenda in presentation order.
    #[serde(default)]
    pub agenda: Vec<AgendaItem>,
    /// Minutes text; decision lines are harvested from here.
    #[serde(default)]
    pub notes: String,
    /// Per-meeting override of the decision SLA.
    #[serde(default)]
    pub decision_sla_days: Option<u32>,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started.
    Open,
    /// Being worked on.
    InProgress,
    /// Waiting on something external.
    Blocked,
    /// Done.
    Completed,
    /// Past due and not completed.
    Overdue,
}

keyword_enum!(TaskStatus, "task status", {
    Open => "open",
    InProgress => "in-progress",
    Blocked => "blocked",
    Completed => "completed",
    Overdue => "overdue",
});

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Urgent.
    High,
    /// Default.
    Medium,
    /// Nice to have.
    Low,
}

keyword_enum!(Priority, "priority", {
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// Step unit of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// No repetition.
    #[default]
    None,
    /// Every day.
    Day,
    /// Every seven days.
    Week,
    /// Every calendar month.
    Month,
    /// Every three calendar months.
    Quarter,
    /// Every twelve calendar months.
    Year,
}

keyword_enum!(Frequency, "frequency", {
    None => "none",
    Day => "day",
    Week => "week",
    Month => "month",
    Quarter => "quarter",
    Year => "year",
});

/// Compliance cadence: a frequency that always repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Daily.
    Day,
    /// Weekly.
    Week,
    /// Monthly.
    Month,
    /// Quarterly.
    Quarter,
    /// Yearly.
    Year,
}

keyword_enum!(Cadence, "cadence", {
    Day => "day",
    Week => "week",
    Month => "month",
    Quarter => "quarter",
    Year => "year",
});

impl From<Cadence> for Frequency {
    fn from(cadence: Cadence) -> Self {
        match cadence {
            Cadence::Day => Self::Day,
            Cadence::Week => Self::Week,
            Cadence::Month => Self::Month,
            Cadence::Quarter => Self::Quarter,
            Cadence::Year => Self::Year,
        }
    }
}

/// Repetition rule attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Step unit.
    pub frequency: Frequency,
    /// Number of units per step.
    pub interval: NonZeroU32,
}

impl Recurrence {
    /// Rule stepping `interval` units of `frequency`.
    #[must_use]
    pub const fn every(interval: NonZeroU32, frequency: Frequency) -> Self {
        Self {
            frequency,
            interval,
        }
    }

    /// Whether the rule produces any repetitions.
    #[must_use]
    pub const fn repeats(&self) -> bool {
        !matches!(self.frequency, Frequency::None)
    }
}

/// Where a task came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskSource {
    /// Harvested from a meeting's decisions.
    Meeting {
        /// Originating meeting.
        id: MeetingId,
        /// Meeting title at conversion time.
        title: String,
    },
    /// Pushed from a compliance checklist.
    Compliance {
        /// Originating program.
        id: ProgramId,
        /// Program name at push time.
        title: String,
    },
}

/// Action item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Identifier.
    pub id: TaskId,
    /// What has to be done.
    pub title: String,
    /// Responsible person by name; may be empty.
    #[serde(default)]
    pub owner: String,
    /// Deadline.
    #[serde(with = "time::serde::rfc3339")]
    pub due: OffsetDateTime,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Priority.
    pub priority: Priority,
    /// Repetition rule used when the task was created.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    /// Origin of the task.
    #[serde(default)]
    pub source: Option<TaskSource>,
}

impl Task {
    /// Whether the task counts as late at `now`.
    #[must_use]
    pub fn is_past_due(&self, now: OffsetDateTime) -> bool {
        self.status != TaskStatus::Completed && self.due < now
    }
}

/// Mark every unfinished task whose deadline has passed as overdue.
///
/// Returns how many tasks changed status.
pub fn refresh_overdue(tasks: &mut [Task], now: OffsetDateTime) -> usize {
    let mut changed = 0;
    for task in tasks.iter_mut() {
        if task.is_past_due(now) && task.status != TaskStatus::Overdue {
            task.status = TaskStatus::Overdue;
            changed += 1;
        }
    }
    changed
}

/// Checklist entry of a compliance program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// What has to be verified.
    pub text: String,
    /// Checked off for the current cycle.
    #[serde(default)]
    pub done: bool,
}

/// Recurring compliance obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceProgram {
    /// Identifier.
    pub id: ProgramId,
    /// Program name.
    pub name: String,
    /// Responsible person by name.
    #[serde(default)]
    pub owner: String,
    /// How often the program comes due.
    pub cadence: Cadence,
    /// Next deadline.
    #[serde(with = "time::serde::rfc3339")]
    pub next_due: OffsetDateTime,
    /// Items to verify each cycle.
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

/// Process-wide preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Timezone label shown to users.
    pub timezone: String,
    /// Days between a meeting and the deadline of its decisions.
    pub decision_sla_days: u32,
    /// Length given to new meetings without an explicit end.
    pub default_meeting_minutes: u32,
    /// Owner assigned to decision tasks when no override is given.
    pub default_decision_owner: String,
    /// Owner assigned to compliance tasks when the program has none.
    pub default_compliance_owner: String,
    /// Embed attendee lines in calendar files.
    pub include_attendees: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: "Asia/Jerusalem".to_owned(),
            decision_sla_days: DEFAULT_DECISION_SLA_DAYS,
            default_meeting_minutes: DEFAULT_MEETING_MINUTES,
            default_decision_owner: String::new(),
            default_compliance_owner: String::new(),
            include_attendees: true,
        }
    }
}
