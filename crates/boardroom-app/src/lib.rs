//! Application layer for boardroom.
//!
//! This crate owns persistence, configuration and the service façade the CLI
//! drives. Pure record logic lives in `boardroom-core`.

pub mod bundle;
pub mod config;
pub mod error;
pub mod service;
pub mod state;
pub mod store;

// Re-exports for convenience
pub use bundle::ExportBundle;
pub use config::{DefaultsConfig, ProjectConfig, RecurrenceConfig};
pub use error::{ServiceError, ServiceResult};
pub use service::{NewMeeting, NewParticipant, NewProgram, NewTask, SecretaryService};
pub use state::AppState;
pub use store::{JsonDirStore, MemoryStore, RecordKey, RecordStore, StoreError};
