//! Domain records and pure helpers for board-meeting record keeping.
//!
//! Nothing here performs I/O. Helpers that mint records take an
//! [`id::IdSource`], and helpers that depend on the current instant take it
//! as an argument.

/// Compliance program helpers.
pub mod compliance;
/// Decision-line extraction and conversion into tasks.
pub mod decisions;
/// Calendar file rendering.
pub mod ics;
/// Identifier types and identifier sources.
pub mod id;
/// Plain records shared by every layer.
pub mod model;
/// Recurrence stepping and expansion.
pub mod recurrence;

pub use decisions::{DecisionSource, decisions_to_tasks, extract_decisions};
pub use ics::{IcsError, escape_text, format_ics_date, meeting_to_ics};
pub use model::{
    AgendaItem, Attendee, Cadence, ChecklistItem, ComplianceProgram, Frequency, Meeting,
    Participant, Priority, Recurrence, Settings, Task, TaskSource, TaskStatus, refresh_overdue,
};
pub use recurrence::RecurrenceError;
