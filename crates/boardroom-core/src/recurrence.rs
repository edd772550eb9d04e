//! Expansion of repeating tasks into concrete instances.
//!
//! Month, quarter and year steps add calendar fields and let the day of month
//! overflow into the following month (January 31 plus one month lands on
//! March 3 in a common year). No end-of-month clamping is applied.

use std::num::NonZeroU32;

use thiserror::Error;
use time::{Date, Duration, Month, OffsetDateTime};

use crate::id::IdSource;
use crate::model::{Frequency, Recurrence, Task, TaskStatus};

/// Largest number of future instances a single expansion may request.
pub const MAX_CYCLES: u32 = 520;

/// Errors raised while stepping dates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    /// The stepped date does not fit the supported calendar range.
    #[error("advancing {from} by {interval} x {frequency} leaves the supported date range")]
    OutOfRange {
        /// Cursor before the failing step.
        from: OffsetDateTime,
        /// Step unit.
        frequency: Frequency,
        /// Units per step.
        interval: u32,
    },
}

/// Advance `from` by one step of `interval` x `frequency`.
///
/// `Frequency::None` leaves the instant unchanged.
///
/// # Errors
/// Returns [`RecurrenceError::OutOfRange`] when the result is not representable.
pub fn advance(
    from: OffsetDateTime,
    frequency: Frequency,
    interval: NonZeroU32,
) -> Result<OffsetDateTime, RecurrenceError> {
    let n = i64::from(interval.get());
    let stepped = match frequency {
        Frequency::None => Some(from),
        Frequency::Day => from.checked_add(Duration::days(n)),
        Frequency::Week => from.checked_add(Duration::weeks(n)),
        Frequency::Month => add_months(from, n),
        Frequency::Quarter => add_months(from, n * 3),
        Frequency::Year => add_months(from, n * 12),
    };
    stepped.ok_or(RecurrenceError::OutOfRange {
        from,
        frequency,
        interval: interval.get(),
    })
}

/// Expand `base` into itself followed by `cycles` future instances.
///
/// Tasks without a repeating rule come back as a single-element vector.
/// Every generated instance gets a fresh id from `ids`, the next due date and
/// status [`TaskStatus::Open`]; the base task is returned untouched.
///
/// # Errors
/// Returns [`RecurrenceError::OutOfRange`] if any step overflows the calendar.
pub fn expand(
    base: &Task,
    cycles: u32,
    ids: &mut impl IdSource,
) -> Result<Vec<Task>, RecurrenceError> {
    let Some(rule) = base.recurrence.filter(Recurrence::repeats) else {
        return Ok(vec![base.clone()]);
    };

    let mut tasks = vec![base.clone()];
    let mut cursor = base.due;
    for _ in 0..cycles {
        cursor = advance(cursor, rule.frequency, rule.interval)?;
        tasks.push(Task {
            id: ids.next_id(),
            due: cursor,
            status: TaskStatus::Open,
            ..base.clone()
        });
    }
    Ok(tasks)
}

fn add_months(from: OffsetDateTime, months: i64) -> Option<OffsetDateTime> {
    let date = from.date();
    let index = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1 + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let shifted = first.checked_add(Duration::days(i64::from(date.day()) - 1))?;
    Some(from.replace_date(shifted))
}
