use std::fs;
use std::io::Write;
use std::num::NonZeroU32;
use std::path::Path;

use anyhow::{Context, Result, bail};
use boardroom_app::{
    ExportBundle, NewMeeting, NewParticipant, NewProgram, NewTask, RecordStore, SecretaryService,
};
use boardroom_core::id::IdSource;
use boardroom_core::{
    AgendaItem, ComplianceProgram, Frequency, Meeting, Participant, Recurrence, Settings, Task,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{
    Command, ComplianceCommand, ListFormat, MeetingCommand, ParticipantCommand, SettingKey,
    SettingsCommand, TaskCommand,
};

pub fn run<S: RecordStore, I: IdSource>(
    command: Command,
    service: &mut SecretaryService<S, I>,
    now: OffsetDateTime,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Participant { action } => run_participant(action, service, out),
        Command::Meeting { action } => run_meeting(action, service, now, out),
        Command::Task { action } => run_task(action, service, out),
        Command::Compliance { action } => run_compliance(action, service, out),
        Command::Settings { action } => run_settings(action, service, out),
        Command::Export { out: path } => {
            let json = serde_json::to_string_pretty(&service.export_bundle())?;
            match path {
                Some(path) => {
                    write_file(&path, &json)?;
                    writeln!(out, "exported records to {}", path.display())?;
                }
                None => writeln!(out, "{json}")?,
            }
            Ok(())
        }
        Command::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let bundle: ExportBundle = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse bundle {}", file.display()))?;
            let replaced = service.import_bundle(bundle)?;
            if replaced.is_empty() {
                writeln!(out, "bundle contained no records")?;
            }
            for key in replaced {
                writeln!(out, "replaced {key}")?;
            }
            Ok(())
        }
    }
}

fn run_participant<S: RecordStore, I: IdSource>(
    action: ParticipantCommand,
    service: &mut SecretaryService<S, I>,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        ParticipantCommand::Add { name, email, role } => {
            let participant = service.add_participant(NewParticipant {
                id: None,
                name,
                email,
                role,
            })?;
            writeln!(out, "added participant: {} ({})", participant.id, participant.name)?;
        }
        ParticipantCommand::Ls { format } => {
            let participants = &service.state().participants;
            if participants.is_empty() {
                writeln!(out, "No participants found")?;
                return Ok(());
            }
            match format {
                ListFormat::Table => render_participant_table(participants, out)?,
                ListFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(participants)?)?,
            }
        }
        ParticipantCommand::Rm { id } => {
            let removed = service.remove_participant(id)?;
            writeln!(out, "removed participant: {} ({})", removed.id, removed.name)?;
        }
    }
    Ok(())
}

fn run_meeting<S: RecordStore, I: IdSource>(
    action: MeetingCommand,
    service: &mut SecretaryService<S, I>,
    now: OffsetDateTime,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        MeetingCommand::New {
            title,
            start,
            end,
            location,
            attendees,
            sla_days,
        } => {
            let meeting = service.create_meeting(NewMeeting {
                title,
                start,
                end,
                location,
                attendees,
                decision_sla_days: sla_days,
            })?;
            writeln!(out, "created meeting: {} ({})", meeting.id, meeting.title)?;
        }
        MeetingCommand::Ls { format } => {
            let mut meetings: Vec<&Meeting> = service.state().meetings.iter().collect();
            if meetings.is_empty() {
                writeln!(out, "No meetings found")?;
                return Ok(());
            }
            meetings.sort_by_key(|meeting| meeting.start);
            match format {
                ListFormat::Table => render_meeting_table(&meetings, out)?,
                ListFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&meetings)?)?,
            }
        }
        MeetingCommand::Show { id } => {
            let meeting = service.meeting(id)?;
            writeln!(out, "{}", serde_json::to_string_pretty(meeting)?)?;
        }
        MeetingCommand::Notes { id, text, file } => {
            let notes = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read notes from {}", path.display()))?,
                (None, None) => bail!("either --text or --file is required"),
            };
            service.set_notes(id, notes)?;
            writeln!(out, "updated notes: {id}")?;
        }
        MeetingCommand::Agenda {
            id,
            title,
            minutes,
            owner,
            doc,
        } => {
            let meeting = service.add_agenda_item(
                id,
                AgendaItem {
                    title,
                    duration_minutes: minutes,
                    owner,
                    doc_ref: doc,
                },
            )?;
            writeln!(out, "agenda of {id} now has {} items", meeting.agenda.len())?;
        }
        MeetingCommand::Decisions { id, owner } => {
            let created = service.convert_decisions(id, owner.as_deref())?;
            if created.is_empty() {
                writeln!(out, "nothing to convert: no decision lines in meeting {id}")?;
                return Ok(());
            }
            for task in created {
                writeln!(out, "created task: {} ({}) due {}", task.id, task.title, rfc3339(task.due)?)?;
            }
        }
        MeetingCommand::Ics { id, out: path } => {
            let ics = service.meeting_invite(id, now)?;
            match path {
                Some(path) => {
                    write_file(&path, &ics)?;
                    writeln!(out, "wrote invitation to {}", path.display())?;
                }
                None => out.write_all(ics.as_bytes())?,
            }
        }
    }
    Ok(())
}

fn run_task<S: RecordStore, I: IdSource>(
    action: TaskCommand,
    service: &mut SecretaryService<S, I>,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        TaskCommand::New {
            title,
            owner,
            due,
            priority,
            repeat,
            every,
            cycles,
        } => {
            let recurrence = match repeat {
                Frequency::None => None,
                frequency => Some(Recurrence::every(
                    NonZeroU32::new(every).context("--every must be at least 1")?,
                    frequency,
                )),
            };
            let created = service.create_task(NewTask {
                title,
                owner,
                due,
                priority,
                recurrence,
                cycles,
            })?;
            for task in created {
                writeln!(out, "created task: {} due {}", task.id, rfc3339(task.due)?)?;
            }
        }
        TaskCommand::Ls {
            status,
            owner,
            format,
        } => {
            let mut tasks: Vec<&Task> = service
                .state()
                .tasks
                .iter()
                .filter(|task| status.is_none_or(|wanted| task.status == wanted))
                .filter(|task| owner.as_deref().is_none_or(|wanted| task.owner == wanted))
                .collect();
            if tasks.is_empty() {
                if status.is_none() && owner.is_none() {
                    writeln!(out, "No tasks found")?;
                } else {
                    writeln!(out, "No tasks matched the provided filters")?;
                }
                return Ok(());
            }
            tasks.sort_by_key(|task| task.due);
            match format {
                ListFormat::Table => render_task_table(&tasks, out)?,
                ListFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&tasks)?)?,
            }
        }
        TaskCommand::Status { id, status } => {
            service.set_task_status(id, status)?;
            writeln!(out, "task {id} is now {status}")?;
        }
        TaskCommand::Due { id, due } => {
            let task = service.set_task_due(id, due)?;
            writeln!(out, "task {id} now due {}", rfc3339(task.due)?)?;
        }
        TaskCommand::Rm { id } => {
            let removed = service.delete_task(id)?;
            writeln!(out, "deleted task: {} ({})", removed.id, removed.title)?;
        }
    }
    Ok(())
}

fn run_compliance<S: RecordStore, I: IdSource>(
    action: ComplianceCommand,
    service: &mut SecretaryService<S, I>,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        ComplianceCommand::New {
            name,
            owner,
            cadence,
            next_due,
            items,
            notes,
        } => {
            let program = service.create_program(NewProgram {
                name,
                owner,
                cadence,
                next_due,
                checklist: items,
                notes,
            })?;
            writeln!(out, "created program: {} ({})", program.id, program.name)?;
        }
        ComplianceCommand::Ls { format } => {
            let programs = &service.state().compliance;
            if programs.is_empty() {
                writeln!(out, "No compliance programs found")?;
                return Ok(());
            }
            match format {
                ListFormat::Table => render_program_table(programs, out)?,
                ListFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(programs)?)?,
            }
        }
        ComplianceCommand::Check { id, item, undo } => {
            let program = service.set_checklist_item(id, item, !undo)?;
            let open = program.checklist.iter().filter(|entry| !entry.done).count();
            writeln!(out, "{id}: {open} of {} items open", program.checklist.len())?;
        }
        ComplianceCommand::Push { id } => {
            let created = service.push_checklist(id)?;
            if created.is_empty() {
                writeln!(out, "nothing to push: every item of {id} is done")?;
            }
            for task in created {
                writeln!(out, "created task: {} ({})", task.id, task.title)?;
            }
        }
        ComplianceCommand::Complete { id } => {
            let program = service.complete_cycle(id)?;
            writeln!(out, "{id} next due {}", rfc3339(program.next_due)?)?;
        }
    }
    Ok(())
}

fn run_settings<S: RecordStore, I: IdSource>(
    action: SettingsCommand,
    service: &mut SecretaryService<S, I>,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        SettingsCommand::Show => {
            writeln!(out, "{}", serde_json::to_string_pretty(service.settings())?)?;
        }
        SettingsCommand::Set { key, value } => {
            let mut updated = service.settings().clone();
            apply_setting(&mut updated, key, &value)?;
            service.update_settings(|settings| *settings = updated)?;
            writeln!(out, "updated setting")?;
        }
    }
    Ok(())
}

fn apply_setting(settings: &mut Settings, key: SettingKey, raw: &str) -> Result<()> {
    let value = raw.trim();
    match key {
        SettingKey::Timezone => {
            if value.is_empty() {
                bail!("timezone must not be empty");
            }
            settings.timezone = value.to_owned();
        }
        SettingKey::DecisionSlaDays => {
            settings.decision_sla_days = value
                .parse()
                .with_context(|| format!("invalid day count: {value}"))?;
        }
        SettingKey::DefaultMeetingMinutes => {
            settings.default_meeting_minutes = value
                .parse()
                .with_context(|| format!("invalid minute count: {value}"))?;
        }
        SettingKey::DefaultDecisionOwner => value.clone_into(&mut settings.default_decision_owner),
        SettingKey::DefaultComplianceOwner => value.clone_into(&mut settings.default_compliance_owner),
        SettingKey::IncludeAttendees => {
            settings.include_attendees = value
                .parse()
                .with_context(|| format!("expected true or false, got {value}"))?;
        }
    }
    Ok(())
}

fn render_participant_table(participants: &[Participant], out: &mut impl Write) -> Result<()> {
    writeln!(out, "ID | Name | Email | Role")?;
    writeln!(out, "-- | ---- | ----- | ----")?;
    for participant in participants {
        writeln!(
            out,
            "{} | {} | {} | {}",
            participant.id,
            participant.name,
            participant.email.as_deref().unwrap_or("-"),
            participant.role.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn render_meeting_table(meetings: &[&Meeting], out: &mut impl Write) -> Result<()> {
    writeln!(out, "ID | Start | Title | Location | Attendees")?;
    writeln!(out, "-- | ----- | ----- | -------- | ---------")?;
    for meeting in meetings {
        let location = if meeting.location.is_empty() {
            "-"
        } else {
            meeting.location.as_str()
        };
        writeln!(
            out,
            "{} | {} | {} | {} | {}",
            meeting.id,
            rfc3339(meeting.start)?,
            meeting.title,
            location,
            meeting.attendees.len()
        )?;
    }
    Ok(())
}

fn render_task_table(tasks: &[&Task], out: &mut impl Write) -> Result<()> {
    writeln!(out, "ID | Due | Status | Priority | Owner | Title")?;
    writeln!(out, "-- | --- | ------ | -------- | ----- | -----")?;
    for task in tasks {
        let owner = if task.owner.is_empty() { "-" } else { task.owner.as_str() };
        writeln!(
            out,
            "{} | {} | {} | {} | {} | {}",
            task.id,
            rfc3339(task.due)?,
            task.status,
            task.priority,
            owner,
            task.title
        )?;
    }
    Ok(())
}

fn render_program_table(programs: &[ComplianceProgram], out: &mut impl Write) -> Result<()> {
    writeln!(out, "ID | Next due | Cadence | Name | Owner | Open items")?;
    writeln!(out, "-- | -------- | ------- | ---- | ----- | ----------")?;
    for program in programs {
        let owner = if program.owner.is_empty() { "-" } else { program.owner.as_str() };
        let open = program.checklist.iter().filter(|item| !item.done).count();
        writeln!(
            out,
            "{} | {} | {} | {} | {} | {}/{}",
            program.id,
            rfc3339(program.next_due)?,
            program.cadence,
            program.name,
            owner,
            open,
            program.checklist.len()
        )?;
    }
    Ok(())
}

fn rfc3339(instant: OffsetDateTime) -> Result<String> {
    instant
        .format(&Rfc3339)
        .with_context(|| format!("cannot format {instant}"))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardroom_app::{MemoryStore, ProjectConfig};
    use boardroom_core::id::SequentialIds;
    use boardroom_core::{Cadence, Priority, TaskStatus};
    use tempfile::tempdir;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-03-01 09:00 UTC);

    type TestService = SecretaryService<MemoryStore, SequentialIds>;

    fn service() -> TestService {
        SecretaryService::with_ids(
            MemoryStore::new(),
            &ProjectConfig::default(),
            SequentialIds::starting_at(1),
            NOW,
        )
        .unwrap_or_else(|err| panic!("open service: {err}"))
    }

    fn run_to_string(command: Command, service: &mut TestService) -> Result<String> {
        let mut out = Vec::new();
        run(command, service, NOW, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn new_meeting(service: &mut TestService, notes: &str) -> Result<boardroom_core::id::MeetingId> {
        let meeting = service.create_meeting(NewMeeting {
            title: "Q1 board".into(),
            start: datetime!(2025-03-10 16:00 UTC),
            end: None,
            location: "HQ".into(),
            attendees: Vec::new(),
            decision_sla_days: None,
        })?;
        service.set_notes(meeting.id, notes)?;
        Ok(meeting.id)
    }

    #[test]
    fn decisions_without_markers_report_nothing_to_convert() -> Result<()> {
        let mut service = service();
        let id = new_meeting(&mut service, "Minutes only")?;

        let output = run_to_string(
            Command::Meeting {
                action: MeetingCommand::Decisions { id, owner: None },
            },
            &mut service,
        )?;
        assert!(output.starts_with("nothing to convert"));
        assert!(service.state().tasks.is_empty());
        Ok(())
    }

    #[test]
    fn decisions_print_created_tasks() -> Result<()> {
        let mut service = service();
        let id = new_meeting(&mut service, "[DECISION] Approve budget")?;

        let output = run_to_string(
            Command::Meeting {
                action: MeetingCommand::Decisions {
                    id,
                    owner: Some("CFO".into()),
                },
            },
            &mut service,
        )?;
        assert!(output.contains("(Approve budget) due 2025-03-24T16:00:00Z"));
        assert_eq!(service.state().tasks[0].owner, "CFO");
        Ok(())
    }

    #[test]
    fn ics_goes_to_stdout_or_file() -> Result<()> {
        let mut service = service();
        let id = new_meeting(&mut service, "")?;

        let output = run_to_string(
            Command::Meeting {
                action: MeetingCommand::Ics { id, out: None },
            },
            &mut service,
        )?;
        assert!(output.starts_with("BEGIN:VCALENDAR\r\n"));

        let dir = tempdir()?;
        let path = dir.path().join("invite.ics");
        let output = run_to_string(
            Command::Meeting {
                action: MeetingCommand::Ics {
                    id,
                    out: Some(path.clone()),
                },
            },
            &mut service,
        )?;
        assert!(output.starts_with("wrote invitation to"));
        assert!(fs::read_to_string(&path)?.contains("SUMMARY:Q1 board\r\n"));
        Ok(())
    }

    #[test]
    fn task_list_filters_by_status() -> Result<()> {
        let mut service = service();
        for title in ["Sign minutes", "Send agenda"] {
            service.create_task(NewTask {
                title: title.into(),
                owner: "Dana".into(),
                due: datetime!(2025-03-20 12:00 UTC),
                priority: Priority::Low,
                recurrence: None,
                cycles: None,
            })?;
        }
        let first = service.state().tasks[0].id;
        service.set_task_status(first, TaskStatus::Completed)?;

        let output = run_to_string(
            Command::Task {
                action: TaskCommand::Ls {
                    status: Some(TaskStatus::Completed),
                    owner: None,
                    format: ListFormat::Table,
                },
            },
            &mut service,
        )?;
        assert!(output.contains("Sign minutes"));
        assert!(!output.contains("Send agenda"));

        let output = run_to_string(
            Command::Task {
                action: TaskCommand::Ls {
                    status: Some(TaskStatus::Blocked),
                    owner: None,
                    format: ListFormat::Table,
                },
            },
            &mut service,
        )?;
        assert_eq!(output.trim(), "No tasks matched the provided filters");
        Ok(())
    }

    #[test]
    fn settings_set_parses_typed_values() -> Result<()> {
        let mut service = service();
        run_to_string(
            Command::Settings {
                action: SettingsCommand::Set {
                    key: SettingKey::IncludeAttendees,
                    value: "false".into(),
                },
            },
            &mut service,
        )?;
        assert!(!service.settings().include_attendees);

        let Err(err) = run_to_string(
            Command::Settings {
                action: SettingsCommand::Set {
                    key: SettingKey::DecisionSlaDays,
                    value: "two weeks".into(),
                },
            },
            &mut service,
        ) else {
            panic!("non-numeric SLA should fail");
        };
        assert!(err.to_string().contains("invalid day count"));
        assert_eq!(service.settings().decision_sla_days, 14);
        Ok(())
    }

    #[test]
    fn export_and_import_through_files() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bundle.json");
        let mut source = service();
        source.create_program(NewProgram {
            name: "Annual filings".into(),
            owner: String::new(),
            cadence: Cadence::Year,
            next_due: datetime!(2025-06-30 12:00 UTC),
            checklist: vec!["Registrar return".into()],
            notes: String::new(),
        })?;
        run_to_string(Command::Export { out: Some(path.clone()) }, &mut source)?;

        let mut target = service();
        let output = run_to_string(Command::Import { file: path }, &mut target)?;
        assert!(output.contains("replaced compliance"));
        assert_eq!(target.state().compliance, source.state().compliance);
        Ok(())
    }
}
