//! Harvesting decision lines from meeting minutes.

use time::{Duration, OffsetDateTime};

use crate::id::{IdSource, MeetingId};
use crate::model::{DEFAULT_DECISION_SLA_DAYS, Meeting, Priority, Task, TaskSource, TaskStatus};

/// Hebrew marker; the script has no case, so it is matched literally.
const HEBREW_MARKER: &str = "החלטה:";
/// Latin markers, matched ignoring ASCII case.
const LATIN_MARKERS: [&str; 2] = ["[DECISION]", "Decision:"];

/// Extract decision texts from free-form notes, in line order.
///
/// A line counts as a decision when, after trimming, it starts with one of
/// the markers. The marker and the whitespace after it are stripped; lines
/// with nothing left after the marker are ignored.
#[must_use]
pub fn extract_decisions(notes: &str) -> Vec<String> {
    notes
        .split('\n')
        .map(str::trim)
        .filter_map(strip_marker)
        .map(str::trim_start)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
        .collect()
}

fn strip_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix(HEBREW_MARKER) {
        return Some(rest);
    }
    LATIN_MARKERS.iter().find_map(|marker| {
        let head = line.get(..marker.len())?;
        head.eq_ignore_ascii_case(marker)
            .then(|| &line[marker.len()..])
    })
}

/// Meeting fields the decision builder needs.
#[derive(Debug, Clone, Copy)]
pub struct DecisionSource<'a> {
    /// Meeting the decisions were taken in.
    pub id: MeetingId,
    /// Meeting title, copied into each task's source reference.
    pub title: &'a str,
    /// Meeting start; deadlines count from here.
    pub start: OffsetDateTime,
    /// Days until each decision is due; [`DEFAULT_DECISION_SLA_DAYS`] when absent.
    pub sla_days: Option<u32>,
}

impl<'a> DecisionSource<'a> {
    /// Use the meeting's own SLA override, else `fallback_sla_days`.
    #[must_use]
    pub fn from_meeting(meeting: &'a Meeting, fallback_sla_days: Option<u32>) -> Self {
        Self {
            id: meeting.id,
            title: &meeting.title,
            start: meeting.start,
            sla_days: meeting.decision_sla_days.or(fallback_sla_days),
        }
    }

    /// Deadline for decisions taken in this meeting.
    #[must_use]
    pub fn due(&self) -> OffsetDateTime {
        let days = self.sla_days.unwrap_or(DEFAULT_DECISION_SLA_DAYS);
        self.start
            .saturating_add(Duration::minutes(i64::from(days) * 1440))
    }
}

/// Turn every decision line in `notes` into an open, medium-priority task.
///
/// The owner is `owner_override` when it is non-blank, otherwise
/// `default_owner` (which may be empty). An empty vector means no decisions
/// were found.
pub fn decisions_to_tasks(
    notes: &str,
    source: &DecisionSource<'_>,
    default_owner: &str,
    owner_override: Option<&str>,
    ids: &mut impl IdSource,
) -> Vec<Task> {
    let owner = owner_override
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(default_owner);
    let due = source.due();

    extract_decisions(notes)
        .into_iter()
        .map(|title| Task {
            id: ids.next_id(),
            title,
            owner: owner.to_owned(),
            due,
            status: TaskStatus::Open,
            priority: Priority::Medium,
            recurrence: None,
            source: Some(TaskSource::Meeting {
                id: source.id,
                title: source.title.to_owned(),
            }),
        })
        .collect()
}
