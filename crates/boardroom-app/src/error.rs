//! Error type of the application layer.

use boardroom_core::id::{MeetingId, ParticipantId, ProgramId, TaskId};
use boardroom_core::{IcsError, RecurrenceError};
use thiserror::Error;
use time::OffsetDateTime;

use crate::store::RecordKey;

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by [`crate::SecretaryService`] and state loading.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No participant with this id.
    #[error("participant {0} not found")]
    MissingParticipant(ParticipantId),
    /// A participant with this id is already in the directory.
    #[error("participant {0} already exists")]
    DuplicateParticipant(ParticipantId),
    /// No meeting with this id.
    #[error("meeting {0} not found")]
    MissingMeeting(MeetingId),
    /// No task with this id.
    #[error("task {0} not found")]
    MissingTask(TaskId),
    /// No compliance program with this id.
    #[error("compliance program {0} not found")]
    MissingProgram(ProgramId),
    /// Checklist index out of bounds.
    #[error("program {program} has no checklist item #{index}")]
    MissingChecklistItem {
        /// Program searched.
        program: ProgramId,
        /// One-based index requested.
        index: usize,
    },
    /// A required text field was blank.
    #[error("{0} must not be empty")]
    Blank(&'static str),
    /// A single-line field contained control characters.
    #[error("{0} must not contain control characters")]
    ControlCharacter(&'static str),
    /// More repetitions requested than one expansion allows.
    #[error("cannot generate {requested} repetitions, the limit is {max}")]
    TooManyCycles {
        /// Requested count.
        requested: u32,
        /// Upper bound.
        max: u32,
    },
    /// Meeting end precedes its start.
    #[error("meeting ends at {end} before it starts at {start}")]
    EndBeforeStart {
        /// Requested start.
        start: OffsetDateTime,
        /// Requested end.
        end: OffsetDateTime,
    },
    /// A stored record could not be decoded.
    #[error("failed to decode {key} record: {source}")]
    Decode {
        /// Offending record.
        key: RecordKey,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be encoded.
    #[error("failed to encode {key} record: {source}")]
    Encode {
        /// Offending record.
        key: RecordKey,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
    /// Date stepping overflowed.
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    /// Calendar rendering failed.
    #[error(transparent)]
    Calendar(#[from] IcsError),
    /// Backing store returned an error.
    #[error("store error: {0}")]
    Store(anyhow::Error),
}

impl ServiceError {
    pub(crate) fn store<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Store(err.into())
    }
}
