//! iCalendar (RFC 5545) export of meetings.

use thiserror::Error;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::id::IdSource;
use crate::model::{AgendaItem, DEFAULT_MEETING_MINUTES, Meeting};

const PRODID: &str = "-//Boardroom//Board Meetings//HE";
const UID_DOMAIN: &str = "boardroom";
/// Content lines are folded once they exceed this many octets.
const FOLD_OCTETS: usize = 75;

/// Errors raised while rendering calendar files.
#[derive(Debug, Error)]
pub enum IcsError {
    /// The instant falls outside the four-digit years iCalendar can express.
    #[error("year {0} cannot be written as an iCalendar date")]
    YearOutOfRange(i32),
    /// The formatter rejected the instant.
    #[error("failed to format calendar timestamp: {0}")]
    Format(#[from] time::error::Format),
}

/// Render `instant` in UTC as `YYYYMMDDThhmmssZ`.
///
/// # Errors
/// Returns [`IcsError::YearOutOfRange`] for instants outside years 0 to 9999.
pub fn format_ics_date(instant: OffsetDateTime) -> Result<String, IcsError> {
    let utc = OffsetDateTime::from_unix_timestamp(instant.unix_timestamp())
        .map_err(|_| IcsError::YearOutOfRange(instant.year()))?;
    if !(0..=9999).contains(&utc.year()) {
        return Err(IcsError::YearOutOfRange(utc.year()));
    }
    Ok(utc.format(format_description!(
        "[year][month][day]T[hour][minute][second]Z"
    ))?)
}

/// Escape a TEXT value: backslash, newline, comma and semicolon.
///
/// A carriage return directly before a newline is dropped; a lone carriage
/// return is written as a newline.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_text`].
#[must_use]
pub fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped @ ('\\' | ',' | ';')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Build a single-event calendar document for `meeting`.
///
/// `now` becomes the `DTSTAMP`; the event `UID` is minted from `ids`. Attendee
/// lines are written only when `include_attendees` is set, and only for
/// attendees with an email address.
///
/// # Errors
/// Returns an error when one of the timestamps cannot be written.
pub fn meeting_to_ics(
    meeting: &Meeting,
    include_attendees: bool,
    now: OffsetDateTime,
    ids: &mut impl IdSource,
) -> Result<String, IcsError> {
    let end = meeting.end.unwrap_or_else(|| {
        meeting
            .start
            .saturating_add(Duration::minutes(i64::from(DEFAULT_MEETING_MINUTES)))
    });

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_owned(),
        "VERSION:2.0".to_owned(),
        format!("PRODID:{PRODID}"),
        "CALSCALE:GREGORIAN".to_owned(),
        "METHOD:PUBLISH".to_owned(),
        "BEGIN:VEVENT".to_owned(),
        format!("UID:{}@{UID_DOMAIN}", ids.next_uuid()),
        format!("DTSTAMP:{}", format_ics_date(now)?),
        format!("DTSTART:{}", format_ics_date(meeting.start)?),
        format!("DTEND:{}", format_ics_date(end)?),
        format!("SUMMARY:{}", escape_text(&meeting.title)),
        format!("LOCATION:{}", escape_text(&meeting.location)),
        format!("DESCRIPTION:{}", escape_text(&describe(meeting))),
    ];

    if include_attendees {
        for attendee in &meeting.attendees {
            let Some(email) = mailto_address(attendee.email.as_deref()) else {
                continue;
            };
            lines.push(format!(
                "ATTENDEE;CN={};ROLE=REQ-PARTICIPANT:mailto:{email}",
                quote_param(&attendee.name)
            ));
        }
    }

    lines.push("END:VEVENT".to_owned());
    lines.push("END:VCALENDAR".to_owned());

    let mut doc = String::new();
    for line in &lines {
        doc.push_str(&fold_line(line));
        doc.push_str("\r\n");
    }
    Ok(doc)
}

/// Find the first `name` property in `doc` and return its unescaped value.
///
/// Folded lines are joined before matching; parameters are skipped.
#[must_use]
pub fn read_property(doc: &str, name: &str) -> Option<String> {
    let unfolded = doc
        .replace("\r\n ", "")
        .replace("\r\n\t", "")
        .replace("\n ", "");
    unfolded.lines().find_map(|line| {
        let line = line.trim_end_matches('\r');
        let split = value_start(line)?;
        let head = &line[..split];
        let prop = head.split(';').next()?;
        prop.eq_ignore_ascii_case(name)
            .then(|| unescape_text(&line[split + 1..]))
    })
}

/// Byte offset of the colon separating name and parameters from the value.
fn value_start(line: &str) -> Option<usize> {
    let mut quoted = false;
    for (idx, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ':' if !quoted => return Some(idx),
            _ => {}
        }
    }
    None
}

fn describe(meeting: &Meeting) -> String {
    let mut description = meeting
        .agenda
        .iter()
        .enumerate()
        .map(|(idx, item)| agenda_line(idx + 1, item))
        .collect::<Vec<_>>()
        .join("\n");
    if !meeting.notes.trim().is_empty() {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(&meeting.notes);
    }
    description
}

fn agenda_line(number: usize, item: &AgendaItem) -> String {
    let mut line = format!("{number}. {}", item.title);
    if let Some(owner) = non_blank(item.owner.as_deref()) {
        line.push_str(&format!(" (אחראי: {owner})"));
    }
    if let Some(doc) = non_blank(item.doc_ref.as_deref()) {
        line.push_str(&format!(" [מסמך: {doc}]"));
    }
    line
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Address usable after `mailto:`; blank or control-bearing addresses are skipped.
fn mailto_address(email: Option<&str>) -> Option<&str> {
    non_blank(email).filter(|address| !address.chars().any(char::is_control))
}

/// Parameter values cannot carry quotes or control characters.
fn quote_param(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != '"' && !c.is_control())
        .collect();
    format!("\"{cleaned}\"")
}

fn fold_line(line: &str) -> String {
    if line.len() <= FOLD_OCTETS {
        return line.to_owned();
    }
    let mut out = String::with_capacity(line.len() + line.len() / FOLD_OCTETS * 3);
    // Continuation lines start with a space, which counts toward the limit.
    let mut budget = FOLD_OCTETS;
    let mut used = 0;
    for c in line.chars() {
        if used + c.len_utf8() > budget {
            out.push_str("\r\n ");
            budget = FOLD_OCTETS - 1;
            used = 0;
        }
        out.push(c);
        used += c.len_utf8();
    }
    out
}
