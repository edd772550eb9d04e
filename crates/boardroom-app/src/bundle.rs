//! Bulk export and import of every record in one JSON document.

use boardroom_core::{ComplianceProgram, Meeting, Participant, Settings, Task};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::store::RecordKey;

/// Backup document. Each present field replaces the matching collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    /// Contact directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<Participant>>,
    /// Meetings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meetings: Option<Vec<Meeting>>,
    /// Action items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    /// Compliance programs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<Vec<ComplianceProgram>>,
    /// Preferences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl ExportBundle {
    /// Snapshot every collection.
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self {
            participants: Some(state.participants.clone()),
            meetings: Some(state.meetings.clone()),
            tasks: Some(state.tasks.clone()),
            compliance: Some(state.compliance.clone()),
            settings: Some(state.settings.clone()),
        }
    }

    /// Snapshot of the single collection named by `key`.
    #[must_use]
    pub fn of(state: &AppState, key: RecordKey) -> Self {
        match key {
            RecordKey::Participants => Self {
                participants: Some(state.participants.clone()),
                ..Self::default()
            },
            RecordKey::Meetings => Self {
                meetings: Some(state.meetings.clone()),
                ..Self::default()
            },
            RecordKey::Tasks => Self {
                tasks: Some(state.tasks.clone()),
                ..Self::default()
            },
            RecordKey::Compliance => Self {
                compliance: Some(state.compliance.clone()),
                ..Self::default()
            },
            RecordKey::Settings => Self {
                settings: Some(state.settings.clone()),
                ..Self::default()
            },
        }
    }

    /// Replace the collections present in the bundle and report which ones changed.
    pub fn apply(self, state: &mut AppState) -> Vec<RecordKey> {
        let mut replaced = Vec::new();
        if let Some(participants) = self.participants {
            state.participants = participants;
            replaced.push(RecordKey::Participants);
        }
        if let Some(meetings) = self.meetings {
            state.meetings = meetings;
            replaced.push(RecordKey::Meetings);
        }
        if let Some(tasks) = self.tasks {
            state.tasks = tasks;
            replaced.push(RecordKey::Tasks);
        }
        if let Some(compliance) = self.compliance {
            state.compliance = compliance;
            replaced.push(RecordKey::Compliance);
        }
        if let Some(settings) = self.settings {
            state.settings = settings;
            replaced.push(RecordKey::Settings);
        }
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardroom_core::id::ParticipantId;

    #[test]
    fn partial_bundle_only_replaces_present_fields() {
        let mut state = AppState::default();
        state.participants.push(Participant {
            id: ParticipantId::new(),
            name: "Avi".into(),
            email: None,
            role: Some("Chair".into()),
        });

        let bundle: ExportBundle = serde_json::from_str(r#"{"tasks": []}"#)
            .unwrap_or_else(|err| panic!("parse bundle: {err}"));
        let replaced = bundle.apply(&mut state);

        assert_eq!(replaced, vec![RecordKey::Tasks]);
        assert_eq!(state.participants.len(), 1);
    }

    #[test]
    fn single_key_snapshot_restores_only_that_collection() {
        let mut state = AppState::default();
        state.settings.decision_sla_days = 30;
        let snapshot = ExportBundle::of(&state, RecordKey::Settings);
        assert!(snapshot.tasks.is_none());

        state.settings.decision_sla_days = 1;
        state.participants.push(Participant {
            id: ParticipantId::new(),
            name: "Avi".into(),
            email: None,
            role: None,
        });
        assert_eq!(snapshot.apply(&mut state), vec![RecordKey::Settings]);
        assert_eq!(state.settings.decision_sla_days, 30);
        assert_eq!(state.participants.len(), 1);
    }

    #[test]
    fn export_writes_all_five_fields() {
        let json = serde_json::to_value(ExportBundle::from_state(&AppState::default()))
            .unwrap_or_else(|err| panic!("serialize bundle: {err}"));
        for field in ["participants", "meetings", "tasks", "compliance", "settings"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
