use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Source of fresh identifiers for newly minted records.
///
/// Helpers that create records take an `IdSource` instead of reaching for
/// ambient randomness, so tests can supply a deterministic sequence.
pub trait IdSource {
    /// Produce the next identifier.
    fn next_uuid(&mut self) -> Uuid;

    /// Produce the next identifier wrapped in a typed newtype.
    fn next_id<T: From<Uuid>>(&mut self) -> T
    where
        Self: Sized,
    {
        T::from(self.next_uuid())
    }
}

/// Identifier source backed by time-ordered UUID v7 values.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIds;

impl IdSource for SystemIds {
    fn next_uuid(&mut self) -> Uuid {
        Uuid::now_v7()
    }
}

/// Deterministic identifier source counting up from a fixed start.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u128,
}

impl SequentialIds {
    /// Start the sequence at `first`.
    #[must_use]
    pub const fn starting_at(first: u128) -> Self {
        Self { next: first }
    }
}

impl IdSource for SequentialIds {
    fn next_uuid(&mut self) -> Uuid {
        let id = Uuid::from_u128(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh identifier (UUID v7).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                s.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(d: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(d)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

record_id!(
    /// Identifier of a directory participant.
    ParticipantId
);
record_id!(
    /// Identifier of a meeting.
    MeetingId
);
record_id!(
    /// Identifier of a task (action item).
    TaskId
);
record_id!(
    /// Identifier of a compliance program.
    ProgramId
);

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn new_ids_use_uuid_v7() {
        assert_eq!(TaskId::new().0.get_version_num(), 7);
        assert_eq!(MeetingId::new().0.get_version_num(), 7);
    }

    #[test]
    fn sequential_ids_are_distinct_and_ordered() {
        let mut ids = SequentialIds::starting_at(10);
        let first: TaskId = ids.next_id();
        let second: TaskId = ids.next_id();
        assert_eq!(first.0, Uuid::from_u128(10));
        assert_eq!(second.0, Uuid::from_u128(11));
        assert!(first < second);
    }

    #[test]
    fn system_ids_do_not_repeat() {
        let mut ids = SystemIds;
        let a = ids.next_uuid();
        let b = ids.next_uuid();
        assert_ne!(a, b);
    }

    #[test]
    fn meeting_id_roundtrip() {
        let uuid = Uuid::now_v7();
        let parsed: MeetingId = uuid.to_string().parse().expect("must parse meeting id");
        assert_eq!(parsed.0, uuid);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ProgramId(Uuid::from_u128(1));
        let json = serde_json::to_string(&id).expect("serialize id");
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000001\"");
        let back: ProgramId = serde_json::from_str(&json).expect("deserialize id");
        assert_eq!(back, id);
    }
}
