pub mod deadline;

pub use deadline::{Deadline, DeadlineId, NotificationKind, ResponseDeadline, ResponseId};
