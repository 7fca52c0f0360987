pub mod commands;
pub mod config;
pub mod dates;
pub mod digest;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod matcher;
pub mod store;

pub use commands::{digest_triggers, Command, CommandRouter, DigestTriggers};
pub use dates::{long_date, resolve, DateError};
pub use digest::{deadline_digest, notification_digest, DigestEntry, Urgency};
pub use domain::deadline::{Deadline, DeadlineId, NotificationKind, ResponseDeadline, ResponseId};
pub use engine::{DeadlineEngine, EngineError};
pub use errors::ValidationError;
pub use matcher::MatchOutcome;
pub use store::{DeadlineStore, NotificationRow, StoreError, StoreSession};
