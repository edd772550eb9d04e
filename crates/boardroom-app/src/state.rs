//! Root state container mirroring the persisted records.

use boardroom_core::{ComplianceProgram, Meeting, Participant, Settings, Task, refresh_overdue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{RecordKey, RecordStore};

/// Every collection plus the settings singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    /// Contact directory.
    pub participants: Vec<Participant>,
    /// Meetings.
    pub meetings: Vec<Meeting>,
    /// Action items.
    pub tasks: Vec<Task>,
    /// Compliance programs.
    pub compliance: Vec<ComplianceProgram>,
    /// Preferences.
    pub settings: Settings,
}

impl AppState {
    /// Load every record from `store`.
    ///
    /// Missing records start empty; missing settings start from `seed`. Tasks
    /// past their deadline at `now` are marked overdue, and the task record is
    /// written back when that changes anything.
    ///
    /// # Errors
    /// Returns an error when a record cannot be read or decoded.
    pub fn load<S: RecordStore>(store: &S, seed: &Settings, now: OffsetDateTime) -> ServiceResult<Self> {
        let mut state = Self {
            participants: decode(store, RecordKey::Participants)?.unwrap_or_default(),
            meetings: decode(store, RecordKey::Meetings)?.unwrap_or_default(),
            tasks: decode(store, RecordKey::Tasks)?.unwrap_or_default(),
            compliance: decode(store, RecordKey::Compliance)?.unwrap_or_default(),
            settings: decode(store, RecordKey::Settings)?.unwrap_or_else(|| seed.clone()),
        };
        debug!(
            participants = state.participants.len(),
            meetings = state.meetings.len(),
            tasks = state.tasks.len(),
            programs = state.compliance.len(),
            "state loaded"
        );

        let changed = refresh_overdue(&mut state.tasks, now);
        if changed > 0 {
            info!(changed, "marked tasks overdue");
            state.persist(store, RecordKey::Tasks)?;
        }
        Ok(state)
    }

    /// Write the record named by `key`.
    ///
    /// # Errors
    /// Returns an error when encoding or the store write fails.
    pub fn persist<S: RecordStore>(&self, store: &S, key: RecordKey) -> ServiceResult<()> {
        let encoded = match key {
            RecordKey::Participants => encode(key, &self.participants),
            RecordKey::Meetings => encode(key, &self.meetings),
            RecordKey::Tasks => encode(key, &self.tasks),
            RecordKey::Compliance => encode(key, &self.compliance),
            RecordKey::Settings => encode(key, &self.settings),
        }?;
        store.save(key, &encoded).map_err(ServiceError::store)
    }
}

fn decode<S: RecordStore, T: DeserializeOwned>(store: &S, key: RecordKey) -> ServiceResult<Option<T>> {
    let Some(raw) = store.load(key).map_err(ServiceError::store)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ServiceError::Decode { key, source })
}

fn encode<T: Serialize + ?Sized>(key: RecordKey, value: &T) -> ServiceResult<String> {
    serde_json::to_string_pretty(value).map_err(|source| ServiceError::Encode { key, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use boardroom_core::id::TaskId;
    use boardroom_core::{Priority, TaskStatus};
    use time::macros::datetime;

    fn task(due: OffsetDateTime, status: TaskStatus) -> Task {
        Task {
            id: TaskId::new(),
            title: "Sign minutes".into(),
            owner: String::new(),
            due,
            status,
            priority: Priority::Low,
            recurrence: None,
            source: None,
        }
    }

    #[test]
    fn empty_store_loads_seeded_settings() -> ServiceResult<()> {
        let seed = Settings {
            decision_sla_days: 21,
            ..Settings::default()
        };
        let state = AppState::load(&MemoryStore::new(), &seed, datetime!(2025-01-01 00:00 UTC))?;
        assert!(state.tasks.is_empty());
        assert_eq!(state.settings.decision_sla_days, 21);
        Ok(())
    }

    #[test]
    fn load_refreshes_and_persists_overdue_tasks() -> ServiceResult<()> {
        let store = MemoryStore::new();
        let mut seeded = AppState::default();
        seeded.tasks.push(task(datetime!(2025-01-01 00:00 UTC), TaskStatus::Open));
        seeded.tasks.push(task(datetime!(2025-01-01 00:00 UTC), TaskStatus::Completed));
        seeded.persist(&store, RecordKey::Tasks)?;

        let state = AppState::load(&store, &Settings::default(), datetime!(2025-02-01 00:00 UTC))?;
        assert_eq!(state.tasks[0].status, TaskStatus::Overdue);
        assert_eq!(state.tasks[1].status, TaskStatus::Completed);

        let stored = store.get(RecordKey::Tasks).unwrap_or_default();
        assert!(stored.contains("\"overdue\""));
        Ok(())
    }

    #[test]
    fn corrupt_record_is_reported_with_its_key() {
        let store = MemoryStore::new();
        store.save(RecordKey::Meetings, "{not json").unwrap_or_else(|never| match never {});
        let Err(err) = AppState::load(&store, &Settings::default(), datetime!(2025-01-01 00:00 UTC)) else {
            panic!("corrupt meetings must fail to load");
        };
        assert!(err.to_string().starts_with("failed to decode meetings record"));
    }
}
