//! Compliance program helpers.

use std::num::NonZeroU32;

use crate::id::IdSource;
use crate::model::{ComplianceProgram, Priority, Task, TaskSource, TaskStatus};
use crate::recurrence::{self, RecurrenceError};

/// Create one open task per unchecked checklist item.
///
/// Tasks are owned by the program owner, or `default_owner` when the program
/// has none, and fall due on the program's next deadline.
pub fn checklist_to_tasks(
    program: &ComplianceProgram,
    default_owner: &str,
    ids: &mut impl IdSource,
) -> Vec<Task> {
    let owner = if program.owner.trim().is_empty() {
        default_owner
    } else {
        program.owner.as_str()
    };

    program
        .checklist
        .iter()
        .filter(|item| !item.done)
        .map(|item| Task {
            id: ids.next_id(),
            title: item.text.clone(),
            owner: owner.to_owned(),
            due: program.next_due,
            status: TaskStatus::Open,
            priority: Priority::Medium,
            recurrence: None,
            source: Some(TaskSource::Compliance {
                id: program.id,
                title: program.name.clone(),
            }),
        })
        .collect()
}

/// Close the current cycle: move the deadline one cadence step forward and
/// uncheck every checklist item.
///
/// # Errors
/// Returns [`RecurrenceError::OutOfRange`] if the next deadline overflows the
/// calendar; the program is left unchanged in that case.
pub fn complete_cycle(program: &mut ComplianceProgram) -> Result<(), RecurrenceError> {
    program.next_due = recurrence::advance(program.next_due, program.cadence.into(), NonZeroU32::MIN)?;
    for item in &mut program.checklist {
        item.done = false;
    }
    Ok(())
}
