use boardroom_core::compliance;
use boardroom_core::id::{IdSource, MeetingId, ParticipantId, ProgramId, SystemIds, TaskId};
use boardroom_core::recurrence::{self, MAX_CYCLES};
use boardroom_core::{
    AgendaItem, Attendee, Cadence, ChecklistItem, ComplianceProgram, DecisionSource, Meeting,
    Participant, Priority, Recurrence, Settings, Task, TaskStatus, decisions_to_tasks,
    meeting_to_ics,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::bundle::ExportBundle;
use crate::config::ProjectConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::store::{RecordKey, RecordStore};

/// Service façade owning the loaded state and every persisting mutation.
pub struct SecretaryService<S, I = SystemIds> {
    store: S,
    ids: I,
    state: AppState,
    default_cycles: u32,
}

impl<S: RecordStore> SecretaryService<S> {
    /// Load state from `store` with time-ordered identifiers.
    ///
    /// # Errors
    /// Returns an error if any record cannot be loaded.
    pub fn open(store: S, config: &ProjectConfig, now: OffsetDateTime) -> ServiceResult<Self> {
        Self::with_ids(store, config, SystemIds, now)
    }
}

impl<S, I> SecretaryService<S, I> {
    /// Current state.
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Current settings.
    pub const fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Meeting by id.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingMeeting`] if no meeting matches.
    pub fn meeting(&self, id: MeetingId) -> ServiceResult<&Meeting> {
        self.state
            .meetings
            .iter()
            .find(|meeting| meeting.id == id)
            .ok_or(ServiceError::MissingMeeting(id))
    }

    fn meeting_index(&self, id: MeetingId) -> ServiceResult<usize> {
        self.state
            .meetings
            .iter()
            .position(|meeting| meeting.id == id)
            .ok_or(ServiceError::MissingMeeting(id))
    }

    fn task_index(&self, id: TaskId) -> ServiceResult<usize> {
        self.state
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(ServiceError::MissingTask(id))
    }

    fn program_index(&self, id: ProgramId) -> ServiceResult<usize> {
        self.state
            .compliance
            .iter()
            .position(|program| program.id == id)
            .ok_or(ServiceError::MissingProgram(id))
    }
}

impl<S: RecordStore, I: IdSource> SecretaryService<S, I> {
    /// Load state from `store`, minting new identifiers from `ids`.
    ///
    /// # Errors
    /// Returns an error if any record cannot be loaded.
    pub fn with_ids(store: S, config: &ProjectConfig, ids: I, now: OffsetDateTime) -> ServiceResult<Self> {
        let state = AppState::load(&store, &config.defaults.seed_settings(), now)?;
        Ok(Self {
            store,
            ids,
            state,
            default_cycles: config.recurrence.default_cycles(),
        })
    }

    /// Apply `change`, then write `key`; the in-memory change is undone if the write fails.
    fn commit<T>(&mut self, key: RecordKey, change: impl FnOnce(&mut AppState) -> T) -> ServiceResult<T> {
        let before = ExportBundle::of(&self.state, key);
        let output = change(&mut self.state);
        if let Err(err) = self.state.persist(&self.store, key) {
            before.apply(&mut self.state);
            return Err(err);
        }
        Ok(output)
    }

    /// Add a contact to the directory.
    ///
    /// # Errors
    /// Rejects a blank name, control characters in the email, or an id
    /// already in use.
    pub fn add_participant(&mut self, input: NewParticipant) -> ServiceResult<Participant> {
        let name = required(input.name, "participant name")?;
        let email = input.email.and_then(non_blank);
        if email.as_deref().is_some_and(|e| e.chars().any(char::is_control)) {
            return Err(ServiceError::ControlCharacter("participant email"));
        }
        let id = match input.id {
            Some(id) if self.state.participants.iter().any(|p| p.id == id) => {
                return Err(ServiceError::DuplicateParticipant(id));
            }
            Some(id) => id,
            None => self.ids.next_id(),
        };
        let participant = Participant {
            id,
            name,
            email,
            role: input.role.and_then(non_blank),
        };
        let added = participant.clone();
        self.commit(RecordKey::Participants, |state| state.participants.push(added))?;
        info!(participant = %id, "added participant");
        Ok(participant)
    }

    /// Remove a contact. Meetings keep their attendee snapshots.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingParticipant`] if no contact matches.
    pub fn remove_participant(&mut self, id: ParticipantId) -> ServiceResult<Participant> {
        let index = self
            .state
            .participants
            .iter()
            .position(|p| p.id == id)
            .ok_or(ServiceError::MissingParticipant(id))?;
        let removed = self.commit(RecordKey::Participants, |state| state.participants.remove(index))?;
        info!(participant = %id, "removed participant");
        Ok(removed)
    }

    /// Schedule a meeting.
    ///
    /// Without an explicit end the meeting lasts the configured default
    /// length. Attendees are copied from the directory.
    ///
    /// # Errors
    /// Rejects a blank title, an end before the start, or an unknown attendee.
    pub fn create_meeting(&mut self, input: NewMeeting) -> ServiceResult<Meeting> {
        let title = required(input.title, "meeting title")?;
        let end = input.end.unwrap_or_else(|| {
            input.start.saturating_add(Duration::minutes(i64::from(
                self.state.settings.default_meeting_minutes,
            )))
        });
        if end < input.start {
            return Err(ServiceError::EndBeforeStart {
                start: input.start,
                end,
            });
        }
        let attendees = input
            .attendees
            .iter()
            .map(|id| {
                self.state
                    .participants
                    .iter()
                    .find(|p| p.id == *id)
                    .map(Attendee::from)
                    .ok_or(ServiceError::MissingParticipant(*id))
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        let meeting = Meeting {
            id: self.ids.next_id(),
            title,
            start: input.start,
            end: Some(end),
            location: input.location.trim().to_owned(),
            attendees,
            agenda: Vec::new(),
            notes: String::new(),
            decision_sla_days: input.decision_sla_days,
        };
        let added = meeting.clone();
        self.commit(RecordKey::Meetings, |state| state.meetings.push(added))?;
        info!(meeting = %meeting.id, attendees = meeting.attendees.len(), "created meeting");
        Ok(meeting)
    }

    /// Replace a meeting's free-text notes.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingMeeting`] if no meeting matches.
    pub fn set_notes(&mut self, id: MeetingId, notes: impl Into<String>) -> ServiceResult<&Meeting> {
        let index = self.meeting_index(id)?;
        let notes = notes.into();
        self.commit(RecordKey::Meetings, |state| state.meetings[index].notes = notes)?;
        info!(meeting = %id, "updated notes");
        Ok(&self.state.meetings[index])
    }

    /// Append an item to a meeting's agenda.
    ///
    /// # Errors
    /// Rejects a blank title or an unknown meeting.
    pub fn add_agenda_item(&mut self, id: MeetingId, item: AgendaItem) -> ServiceResult<&Meeting> {
        let index = self.meeting_index(id)?;
        let item = AgendaItem {
            title: required(item.title, "agenda item title")?,
            duration_minutes: item.duration_minutes,
            owner: item.owner.and_then(non_blank),
            doc_ref: item.doc_ref.and_then(non_blank),
        };
        self.commit(RecordKey::Meetings, |state| state.meetings[index].agenda.push(item))?;
        info!(meeting = %id, items = self.state.meetings[index].agenda.len(), "added agenda item");
        Ok(&self.state.meetings[index])
    }

    /// Turn the decision lines of a meeting's notes into tasks.
    ///
    /// An empty result means the notes hold no decisions; nothing is written.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingMeeting`] if no meeting matches.
    pub fn convert_decisions(&mut self, id: MeetingId, owner_override: Option<&str>) -> ServiceResult<Vec<Task>> {
        let index = self.meeting_index(id)?;
        let settings = &self.state.settings;
        let meeting = &self.state.meetings[index];
        let source = DecisionSource::from_meeting(meeting, Some(settings.decision_sla_days));
        let created = decisions_to_tasks(
            &meeting.notes,
            &source,
            &settings.default_decision_owner,
            owner_override,
            &mut self.ids,
        );
        if created.is_empty() {
            warn!(meeting = %id, "no decision lines found");
            return Ok(created);
        }
        self.commit(RecordKey::Tasks, |state| state.tasks.extend(created.iter().cloned()))?;
        info!(meeting = %id, created = created.len(), "converted decisions");
        Ok(created)
    }

    /// Render a calendar invitation for a meeting.
    ///
    /// # Errors
    /// Returns an error if the meeting is unknown or a timestamp cannot be written.
    pub fn meeting_invite(&mut self, id: MeetingId, now: OffsetDateTime) -> ServiceResult<String> {
        let index = self.meeting_index(id)?;
        let include_attendees = self.state.settings.include_attendees;
        let ics = meeting_to_ics(&self.state.meetings[index], include_attendees, now, &mut self.ids)?;
        Ok(ics)
    }

    /// Create a task, expanding repeating rules into future instances.
    ///
    /// # Errors
    /// Rejects a blank title or more than [`MAX_CYCLES`] repetitions; fails
    /// if a recurrence step leaves the calendar.
    pub fn create_task(&mut self, input: NewTask) -> ServiceResult<Vec<Task>> {
        let title = required(input.title, "task title")?;
        let cycles = input.cycles.unwrap_or(self.default_cycles);
        if cycles > MAX_CYCLES {
            return Err(ServiceError::TooManyCycles {
                requested: cycles,
                max: MAX_CYCLES,
            });
        }
        let base = Task {
            id: self.ids.next_id(),
            title,
            owner: input.owner.trim().to_owned(),
            due: input.due,
            status: TaskStatus::Open,
            priority: input.priority,
            recurrence: input.recurrence,
            source: None,
        };
        let created = recurrence::expand(&base, cycles, &mut self.ids)?;
        self.commit(RecordKey::Tasks, |state| state.tasks.extend(created.iter().cloned()))?;
        info!(task = %base.id, created = created.len(), "created task");
        Ok(created)
    }

    /// Change a task's status.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingTask`] if no task matches.
    pub fn set_task_status(&mut self, id: TaskId, status: TaskStatus) -> ServiceResult<&Task> {
        let index = self.task_index(id)?;
        self.commit(RecordKey::Tasks, |state| state.tasks[index].status = status)?;
        info!(task = %id, %status, "updated task status");
        Ok(&self.state.tasks[index])
    }

    /// Move a task's deadline.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingTask`] if no task matches.
    pub fn set_task_due(&mut self, id: TaskId, due: OffsetDateTime) -> ServiceResult<&Task> {
        let index = self.task_index(id)?;
        self.commit(RecordKey::Tasks, |state| state.tasks[index].due = due)?;
        info!(task = %id, %due, "moved task deadline");
        Ok(&self.state.tasks[index])
    }

    /// Delete a task.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingTask`] if no task matches.
    pub fn delete_task(&mut self, id: TaskId) -> ServiceResult<Task> {
        let index = self.task_index(id)?;
        let removed = self.commit(RecordKey::Tasks, |state| state.tasks.remove(index))?;
        info!(task = %id, "deleted task");
        Ok(removed)
    }

    /// Register a compliance program with an unchecked checklist.
    ///
    /// # Errors
    /// Rejects a blank name.
    pub fn create_program(&mut self, input: NewProgram) -> ServiceResult<ComplianceProgram> {
        let name = required(input.name, "program name")?;
        let program = ComplianceProgram {
            id: self.ids.next_id(),
            name,
            owner: input.owner.trim().to_owned(),
            cadence: input.cadence,
            next_due: input.next_due,
            checklist: input
                .checklist
                .into_iter()
                .filter_map(non_blank)
                .map(|text| ChecklistItem { text, done: false })
                .collect(),
            notes: input.notes,
        };
        let added = program.clone();
        self.commit(RecordKey::Compliance, |state| state.compliance.push(added))?;
        info!(program = %program.id, items = program.checklist.len(), "created compliance program");
        Ok(program)
    }

    /// Tick or untick checklist item `index`, counted from one.
    ///
    /// # Errors
    /// Fails if the program or the item does not exist.
    pub fn set_checklist_item(&mut self, id: ProgramId, index: usize, done: bool) -> ServiceResult<&ComplianceProgram> {
        let program_index = self.program_index(id)?;
        let slot = index
            .checked_sub(1)
            .filter(|slot| *slot < self.state.compliance[program_index].checklist.len())
            .ok_or(ServiceError::MissingChecklistItem { program: id, index })?;
        self.commit(RecordKey::Compliance, |state| {
            state.compliance[program_index].checklist[slot].done = done;
        })?;
        info!(program = %id, index, done, "updated checklist item");
        Ok(&self.state.compliance[program_index])
    }

    /// Create tasks for the unchecked checklist items of a program.
    ///
    /// # Errors
    /// Returns [`ServiceError::MissingProgram`] if no program matches.
    pub fn push_checklist(&mut self, id: ProgramId) -> ServiceResult<Vec<Task>> {
        let index = self.program_index(id)?;
        let created = compliance::checklist_to_tasks(
            &self.state.compliance[index],
            &self.state.settings.default_compliance_owner,
            &mut self.ids,
        );
        if created.is_empty() {
            warn!(program = %id, "every checklist item is already done");
            return Ok(created);
        }
        self.commit(RecordKey::Tasks, |state| state.tasks.extend(created.iter().cloned()))?;
        info!(program = %id, created = created.len(), "pushed checklist to tasks");
        Ok(created)
    }

    /// Close the current cycle of a program.
    ///
    /// # Errors
    /// Fails if the program is unknown or the next deadline leaves the calendar.
    pub fn complete_cycle(&mut self, id: ProgramId) -> ServiceResult<&ComplianceProgram> {
        let index = self.program_index(id)?;
        let mut program = self.state.compliance[index].clone();
        compliance::complete_cycle(&mut program)?;
        self.commit(RecordKey::Compliance, |state| state.compliance[index] = program)?;
        info!(program = %id, next_due = %self.state.compliance[index].next_due, "completed cycle");
        Ok(&self.state.compliance[index])
    }

    /// Edit the settings in place and persist them.
    ///
    /// # Errors
    /// Returns an error if the settings record cannot be written.
    pub fn update_settings(&mut self, edit: impl FnOnce(&mut Settings)) -> ServiceResult<&Settings> {
        self.commit(RecordKey::Settings, |state| edit(&mut state.settings))?;
        info!("updated settings");
        Ok(&self.state.settings)
    }

    /// Snapshot of every record.
    pub fn export_bundle(&self) -> ExportBundle {
        ExportBundle::from_state(&self.state)
    }

    /// Replace the collections present in `bundle` and persist each of them.
    ///
    /// If a write fails, every replaced collection is restored in memory and
    /// the records already written are written back.
    ///
    /// # Errors
    /// Returns an error if a replaced record cannot be written.
    pub fn import_bundle(&mut self, bundle: ExportBundle) -> ServiceResult<Vec<RecordKey>> {
        let before = ExportBundle::from_state(&self.state);
        let replaced = bundle.apply(&mut self.state);
        if replaced.is_empty() {
            warn!("import bundle contained no records");
        }
        for (written, key) in replaced.iter().enumerate() {
            if let Err(err) = self.state.persist(&self.store, *key) {
                before.apply(&mut self.state);
                for restored in &replaced[..written] {
                    if let Err(rollback) = self.state.persist(&self.store, *restored) {
                        warn!(record = %restored, error = %rollback, "failed to restore record");
                    }
                }
                return Err(err);
            }
        }
        info!(records = replaced.len(), "imported bundle");
        Ok(replaced)
    }
}

fn required(value: String, field: &'static str) -> ServiceResult<String> {
    non_blank(value).ok_or(ServiceError::Blank(field))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Directory entry to add.
#[derive(Debug, Clone, Default)]
pub struct NewParticipant {
    /// Explicit id, e.g. when restoring a directory entry. Minted when absent.
    pub id: Option<ParticipantId>,
    /// Display name.
    pub name: String,
    /// Address used on invitations.
    pub email: Option<String>,
    /// Board role or title.
    pub role: Option<String>,
}

/// Meeting to schedule.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    /// Meeting title.
    pub title: String,
    /// Start time.
    pub start: OffsetDateTime,
    /// End time; the default meeting length applies when absent.
    pub end: Option<OffsetDateTime>,
    /// Room or link.
    pub location: String,
    /// Directory entries invited.
    pub attendees: Vec<ParticipantId>,
    /// Days allowed to act on decisions; the settings value when absent.
    pub decision_sla_days: Option<u32>,
}

/// Task to create.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Task title.
    pub title: String,
    /// Responsible person.
    pub owner: String,
    /// First deadline.
    pub due: OffsetDateTime,
    /// Priority of every generated instance.
    pub priority: Priority,
    /// Repetition rule, if any.
    pub recurrence: Option<Recurrence>,
    /// Future instances to generate; the configured default when absent.
    pub cycles: Option<u32>,
}

/// Compliance program to register.
#[derive(Debug, Clone)]
pub struct NewProgram {
    /// Program name.
    pub name: String,
    /// Responsible person; the compliance default when blank.
    pub owner: String,
    /// How often a cycle repeats.
    pub cadence: Cadence,
    /// Deadline of the current cycle.
    pub next_due: OffsetDateTime,
    /// Checklist item texts; blank entries are dropped.
    pub checklist: Vec<String>,
    /// Free-text notes.
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use boardroom_core::Frequency;
    use boardroom_core::id::SequentialIds;
    use std::num::NonZeroU32;
    use std::sync::{Arc, Mutex, PoisonError};
    use time::macros::datetime;

    type TestService = SecretaryService<Arc<MemoryStore>, SequentialIds>;

    const NOW: OffsetDateTime = datetime!(2025-03-01 09:00 UTC);

    fn service() -> (Arc<MemoryStore>, TestService) {
        let store = Arc::new(MemoryStore::new());
        let service = SecretaryService::with_ids(
            Arc::clone(&store),
            &ProjectConfig::default(),
            SequentialIds::starting_at(1),
            NOW,
        )
        .unwrap_or_else(|err| panic!("open service: {err}"));
        (store, service)
    }

    fn meeting_input(title: &str) -> NewMeeting {
        NewMeeting {
            title: title.into(),
            start: datetime!(2025-03-10 16:00 UTC),
            end: None,
            location: "Board room".into(),
            attendees: Vec::new(),
            decision_sla_days: None,
        }
    }

    fn task_input(recurrence: Option<Recurrence>, cycles: Option<u32>) -> NewTask {
        NewTask {
            title: "File quarterly report".into(),
            owner: "Dana".into(),
            due: datetime!(2025-04-01 12:00 UTC),
            priority: Priority::High,
            recurrence,
            cycles,
        }
    }

    #[test]
    fn meeting_end_defaults_to_configured_length() -> ServiceResult<()> {
        let (store, mut service) = service();
        service.update_settings(|s| s.default_meeting_minutes = 90)?;
        let meeting = service.create_meeting(meeting_input("Q1 board"))?;

        assert_eq!(meeting.end, Some(datetime!(2025-03-10 17:30 UTC)));
        assert!(store.get(RecordKey::Meetings).is_some());
        Ok(())
    }

    #[test]
    fn meeting_rejects_end_before_start_and_blank_title() {
        let (_, mut service) = service();
        let mut input = meeting_input("Q1 board");
        input.end = Some(datetime!(2025-03-10 15:00 UTC));
        assert!(matches!(
            service.create_meeting(input),
            Err(ServiceError::EndBeforeStart { .. })
        ));
        assert!(matches!(
            service.create_meeting(meeting_input("   ")),
            Err(ServiceError::Blank("meeting title"))
        ));
        assert!(service.state().meetings.is_empty());
    }

    #[test]
    fn meeting_copies_known_attendees_and_rejects_unknown() -> ServiceResult<()> {
        let (_, mut service) = service();
        let avi = service.add_participant(NewParticipant {
            name: "Avi".into(),
            email: Some("avi@example.com".into()),
            ..NewParticipant::default()
        })?;

        let mut input = meeting_input("Audit committee");
        input.attendees = vec![avi.id];
        let meeting = service.create_meeting(input.clone())?;
        assert_eq!(meeting.attendees[0].email.as_deref(), Some("avi@example.com"));

        let stranger = ParticipantId::new();
        input.attendees.push(stranger);
        let Err(err) = service.create_meeting(input) else {
            panic!("unknown attendee should be rejected");
        };
        assert!(matches!(err, ServiceError::MissingParticipant(id) if id == stranger));
        Ok(())
    }

    #[test]
    fn duplicate_participant_id_is_rejected() -> ServiceResult<()> {
        let (_, mut service) = service();
        let first = service.add_participant(NewParticipant {
            name: "Noa".into(),
            ..NewParticipant::default()
        })?;
        let Err(err) = service.add_participant(NewParticipant {
            id: Some(first.id),
            name: "Noa again".into(),
            ..NewParticipant::default()
        }) else {
            panic!("duplicate id must fail");
        };
        assert!(matches!(err, ServiceError::DuplicateParticipant(_)));
        assert_eq!(service.state().participants.len(), 1);
        Ok(())
    }

    #[test]
    fn decisions_use_settings_sla_and_default_owner() -> ServiceResult<()> {
        let (_, mut service) = service();
        service.update_settings(|s| {
            s.decision_sla_days = 7;
            s.default_decision_owner = "Secretary".into();
        })?;
        let meeting = service.create_meeting(meeting_input("Q1 board"))?;
        service.set_notes(meeting.id, "Opening\n[DECISION] Approve budget\nDecision: Hire auditor\n")?;

        let tasks = service.convert_decisions(meeting.id, None)?;
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.owner == "Secretary"));
        assert!(tasks.iter().all(|t| t.due == datetime!(2025-03-17 16:00 UTC)));
        assert_eq!(service.state().tasks.len(), 2);
        Ok(())
    }

    #[test]
    fn meeting_sla_and_owner_override_win() -> ServiceResult<()> {
        let (_, mut service) = service();
        let mut input = meeting_input("Q1 board");
        input.decision_sla_days = Some(3);
        let meeting = service.create_meeting(input)?;
        service.set_notes(meeting.id, "החלטה: לאשר את הדוחות")?;

        let tasks = service.convert_decisions(meeting.id, Some("CFO"))?;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].owner, "CFO");
        assert_eq!(tasks[0].due, datetime!(2025-03-13 16:00 UTC));
        Ok(())
    }

    #[test]
    fn notes_without_decisions_write_nothing() -> ServiceResult<()> {
        let (store, mut service) = service();
        let meeting = service.create_meeting(meeting_input("Q1 board"))?;
        service.set_notes(meeting.id, "Minutes only")?;

        assert!(service.convert_decisions(meeting.id, None)?.is_empty());
        assert!(store.get(RecordKey::Tasks).is_none());
        Ok(())
    }

    #[test]
    fn repeating_task_uses_configured_cycles() -> ServiceResult<()> {
        let (_, mut service) = service();
        let monthly = NonZeroU32::new(1).map(|n| Recurrence::every(n, Frequency::Month));

        let created = service.create_task(task_input(monthly, None))?;
        assert_eq!(created.len(), 7);
        assert_eq!(created[6].due, datetime!(2025-10-01 12:00 UTC));

        let created = service.create_task(task_input(monthly, Some(2)))?;
        assert_eq!(created.len(), 3);
        assert_eq!(service.state().tasks.len(), 10);
        Ok(())
    }

    #[test]
    fn task_edits_persist_and_unknown_ids_fail() -> ServiceResult<()> {
        let (store, mut service) = service();
        let created = service.create_task(task_input(None, None))?;
        let id = created[0].id;

        service.set_task_status(id, TaskStatus::InProgress)?;
        service.set_task_due(id, datetime!(2025-05-01 12:00 UTC))?;
        let stored = store.get(RecordKey::Tasks).unwrap_or_default();
        assert!(stored.contains("in-progress"));
        assert!(stored.contains("2025-05-01T12:00:00Z"));

        service.delete_task(id)?;
        assert!(service.state().tasks.is_empty());
        assert!(matches!(service.delete_task(id), Err(ServiceError::MissingTask(_))));
        Ok(())
    }

    #[test]
    fn checklist_flow_pushes_open_items_and_rolls_cycle() -> ServiceResult<()> {
        let (_, mut service) = service();
        service.update_settings(|s| s.default_compliance_owner = "Legal".into())?;
        let program = service.create_program(NewProgram {
            name: "Monthly filings".into(),
            owner: String::new(),
            cadence: Cadence::Month,
            next_due: datetime!(2025-03-15 12:00 UTC),
            checklist: vec!["VAT return".into(), "  ".into(), "Payroll report".into()],
            notes: String::new(),
        })?;
        assert_eq!(program.checklist.len(), 2);

        service.set_checklist_item(program.id, 1, true)?;
        let pushed = service.push_checklist(program.id)?;
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].title, "Payroll report");
        assert_eq!(pushed[0].owner, "Legal");

        let rolled = service.complete_cycle(program.id)?;
        assert_eq!(rolled.next_due, datetime!(2025-04-15 12:00 UTC));
        assert!(rolled.checklist.iter().all(|item| !item.done));

        assert!(matches!(
            service.set_checklist_item(program.id, 0, true),
            Err(ServiceError::MissingChecklistItem { index: 0, .. })
        ));
        assert!(matches!(
            service.set_checklist_item(program.id, 3, true),
            Err(ServiceError::MissingChecklistItem { index: 3, .. })
        ));
        Ok(())
    }

    #[test]
    fn invite_respects_attendee_setting() -> ServiceResult<()> {
        let (_, mut service) = service();
        let avi = service.add_participant(NewParticipant {
            name: "Avi".into(),
            email: Some("avi@example.com".into()),
            ..NewParticipant::default()
        })?;
        let mut input = meeting_input("Q1 board");
        input.attendees = vec![avi.id];
        let meeting = service.create_meeting(input)?;

        let with = service.meeting_invite(meeting.id, NOW)?;
        assert!(with.contains("ATTENDEE;"));

        service.update_settings(|s| s.include_attendees = false)?;
        let without = service.meeting_invite(meeting.id, NOW)?;
        assert!(!without.contains("ATTENDEE"));
        assert!(without.contains("DTSTART:20250310T160000Z"));
        Ok(())
    }

    #[test]
    fn import_replaces_only_present_records() -> ServiceResult<()> {
        let (store, mut service) = service();
        service.add_participant(NewParticipant {
            name: "Avi".into(),
            ..NewParticipant::default()
        })?;
        service.create_task(task_input(None, None))?;

        let replaced = service.import_bundle(ExportBundle {
            tasks: Some(Vec::new()),
            ..ExportBundle::default()
        })?;
        assert_eq!(replaced, vec![RecordKey::Tasks]);
        assert!(service.state().tasks.is_empty());
        assert_eq!(service.state().participants.len(), 1);
        assert_eq!(store.get(RecordKey::Tasks).as_deref(), Some("[]"));
        Ok(())
    }

    /// Store whose writes of one record can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: Mutex<Option<RecordKey>>,
    }

    impl FlakyStore {
        fn fail_on(&self, key: Option<RecordKey>) {
            *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = key;
        }
    }

    impl RecordStore for FlakyStore {
        type Error = anyhow::Error;

        fn load(&self, key: RecordKey) -> Result<Option<String>, Self::Error> {
            Ok(self.inner.get(key))
        }

        fn save(&self, key: RecordKey, contents: &str) -> Result<(), Self::Error> {
            if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) == Some(key) {
                anyhow::bail!("disk full while writing {key}");
            }
            self.inner.save(key, contents)?;
            Ok(())
        }
    }

    fn flaky_service() -> (Arc<FlakyStore>, SecretaryService<Arc<FlakyStore>, SequentialIds>) {
        let store = Arc::new(FlakyStore::default());
        let service = SecretaryService::with_ids(
            Arc::clone(&store),
            &ProjectConfig::default(),
            SequentialIds::starting_at(1),
            NOW,
        )
        .unwrap_or_else(|err| panic!("open service: {err}"));
        (store, service)
    }

    #[test]
    fn failed_write_leaves_state_as_it_was() -> ServiceResult<()> {
        let (store, mut service) = flaky_service();
        let avi = service.add_participant(NewParticipant {
            name: "Avi".into(),
            ..NewParticipant::default()
        })?;
        let meeting = service.create_meeting(meeting_input("Q1 board"))?;

        store.fail_on(Some(RecordKey::Participants));
        let err = service
            .add_participant(NewParticipant {
                name: "Noa".into(),
                ..NewParticipant::default()
            })
            .err();
        assert!(matches!(err, Some(ServiceError::Store(_))));
        assert_eq!(service.state().participants.len(), 1);
        assert!(service.remove_participant(avi.id).is_err());
        assert_eq!(service.state().participants[0].id, avi.id);

        store.fail_on(Some(RecordKey::Meetings));
        assert!(service.set_notes(meeting.id, "Decision: approve budget").is_err());
        assert!(service.meeting(meeting.id)?.notes.is_empty());

        store.fail_on(Some(RecordKey::Settings));
        assert!(service.update_settings(|s| s.decision_sla_days = 99).is_err());
        assert_ne!(service.settings().decision_sla_days, 99);

        store.fail_on(None);
        service.set_notes(meeting.id, "Decision: approve budget")?;
        assert_eq!(service.meeting(meeting.id)?.notes, "Decision: approve budget");
        Ok(())
    }

    #[test]
    fn failed_import_restores_every_collection() -> ServiceResult<()> {
        let (store, mut service) = flaky_service();
        service.add_participant(NewParticipant {
            name: "Avi".into(),
            ..NewParticipant::default()
        })?;
        service.create_task(task_input(None, None))?;
        let saved_participants = store.inner.get(RecordKey::Participants);

        store.fail_on(Some(RecordKey::Tasks));
        let result = service.import_bundle(ExportBundle {
            participants: Some(Vec::new()),
            tasks: Some(Vec::new()),
            ..ExportBundle::default()
        });
        assert!(result.is_err());
        assert_eq!(service.state().participants.len(), 1);
        assert_eq!(service.state().tasks.len(), 1);
        assert_eq!(store.inner.get(RecordKey::Participants), saved_participants);
        Ok(())
    }

    #[test]
    fn cycles_above_limit_are_rejected() {
        let (store, mut service) = service();
        let rule = Recurrence {
            frequency: Frequency::Week,
            interval: NonZeroU32::MIN,
        };
        let err = service.create_task(task_input(Some(rule), Some(MAX_CYCLES + 1))).err();
        assert!(matches!(
            err,
            Some(ServiceError::TooManyCycles { requested, max: MAX_CYCLES }) if requested == MAX_CYCLES + 1
        ));
        assert!(service.state().tasks.is_empty());
        assert!(store.get(RecordKey::Tasks).is_none());
    }

    #[test]
    fn email_with_line_break_is_rejected() {
        let (_, mut service) = service();
        let err = service
            .add_participant(NewParticipant {
                name: "Eve".into(),
                email: Some("eve@x.invalid\r\nSUMMARY:Hijacked".into()),
                ..NewParticipant::default()
            })
            .err();
        assert!(matches!(err, Some(ServiceError::ControlCharacter("participant email"))));
        assert!(service.state().participants.is_empty());
    }
}
