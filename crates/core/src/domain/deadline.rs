use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeadlineId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseId(pub i64);

/// One tracked conference (or other dated item). `item` is the business key:
/// free text, matched case-insensitively by prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: DeadlineId,
    pub item: String,
    pub date: NaiveDate,
    /// Earlier sub-deadline for the abstract. Invariant: `abstract_date <= date`.
    pub abstract_date: Option<NaiveDate>,
    /// Previous `date` after a reschedule. One level of history, not a log.
    pub old_date: Option<NaiveDate>,
}

/// Notification dates for a tracked deadline. At most one row per deadline,
/// keyed by the deadline's id rather than its display text so renames cannot
/// sever the link.
///
/// Invariants: if both dates are set, `early_response_date < notification_date`;
/// each set date is strictly after the owning deadline's `date`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDeadline {
    pub id: ResponseId,
    pub deadline_id: DeadlineId,
    pub early_response_date: Option<NaiveDate>,
    pub notification_date: Option<NaiveDate>,
}

impl ResponseDeadline {
    pub fn date_for(&self, kind: NotificationKind) -> Option<NaiveDate> {
        match kind {
            NotificationKind::Early => self.early_response_date,
            NotificationKind::Final => self.notification_date,
        }
    }

    pub fn set_date_for(&mut self, kind: NotificationKind, date: NaiveDate) {
        match kind {
            NotificationKind::Early => self.early_response_date = Some(date),
            NotificationKind::Final => self.notification_date = Some(date),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Early,
    Final,
}

impl NotificationKind {
    /// Classify the marker words in front of "response/notification for ...".
    /// An empty marker, or one mentioning "final" or "acceptance", means the
    /// final decision; only an explicit early/first-round/reject marker means
    /// the early round.
    pub fn classify(marker: &str) -> Self {
        let marker = marker.trim().to_ascii_lowercase();
        if marker.is_empty() || marker.contains("final") || marker.contains("acceptance") {
            Self::Final
        } else {
            Self::Early
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Early => "early notification",
            Self::Final => "final acceptance notification",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Early => Self::Final,
            Self::Final => Self::Early,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NotificationKind;

    #[test]
    fn empty_marker_classifies_as_final() {
        assert_eq!(NotificationKind::classify(""), NotificationKind::Final);
        assert_eq!(NotificationKind::classify("   "), NotificationKind::Final);
    }

    #[test]
    fn final_and_acceptance_markers_classify_as_final() {
        assert_eq!(NotificationKind::classify("final "), NotificationKind::Final);
        assert_eq!(NotificationKind::classify("acceptance "), NotificationKind::Final);
        assert_eq!(NotificationKind::classify("final acceptance "), NotificationKind::Final);
    }

    #[test]
    fn early_and_first_round_markers_classify_as_early() {
        assert_eq!(NotificationKind::classify("early "), NotificationKind::Early);
        assert_eq!(NotificationKind::classify("early reject "), NotificationKind::Early);
        assert_eq!(NotificationKind::classify("first round "), NotificationKind::Early);
    }
}
