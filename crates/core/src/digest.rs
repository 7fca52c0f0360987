//! Digest building: time-relative, urgency-ordered summaries of upcoming
//! deadlines and notification dates.
//!
//! Entries carry Slack-style emphasis in the text itself plus an urgency
//! level the channel layer maps to a color. Expired dates are skipped here
//! only; nothing is ever deleted because a date passed.

use chrono::NaiveDate;

use crate::domain::deadline::Deadline;
use crate::store::NotificationRow;

pub const NO_DEADLINES: &str = "No deadlines!";
pub const NO_NOTIFICATION_DATES: &str = "No notification dates!";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    /// Due within the week.
    Warning,
    /// Due today.
    Critical,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestEntry {
    pub days: i64,
    pub text: String,
    pub urgency: Urgency,
}

fn urgency_for(days: i64) -> Urgency {
    if days == 0 {
        Urgency::Critical
    } else if days < 7 {
        Urgency::Warning
    } else {
        Urgency::Normal
    }
}

/// Render the deadline digest. `deadlines` must be date-ascending (the store
/// contract); `label` resolves an item name to its display form, typically a
/// CFP link when enrichment finds one.
pub fn deadline_digest<F>(deadlines: &[Deadline], today: NaiveDate, label: F) -> Vec<DigestEntry>
where
    F: Fn(&str) -> String,
{
    let mut entries = Vec::new();

    for deadline in deadlines {
        let days = (deadline.date - today).num_days();
        if days < 0 {
            continue;
        }

        let display = label(&deadline.item);
        let text = if days > 1 {
            format!("{days} days until {display}{}", abstract_annotation(deadline, today))
        } else if days == 1 {
            format!("*{display} tomorrow!*")
        } else {
            format!("*{display} TODAY!*")
        };

        entries.push(DigestEntry { days, text, urgency: urgency_for(days) });
    }

    entries
}

fn abstract_annotation(deadline: &Deadline, today: NaiveDate) -> String {
    let Some(abstract_date) = deadline.abstract_date else {
        return String::new();
    };

    let days = (abstract_date - today).num_days();
    if days < 0 {
        String::new()
    } else if days == 0 {
        " (*abstract due TODAY!*)".to_string()
    } else if days == 1 {
        " (abstract due tomorrow)".to_string()
    } else {
        format!(" (abstract due in {days} days)")
    }
}

/// Render the notification digest: early and final entries for every
/// response row, merged and sorted by ascending days remaining across all
/// conferences.
pub fn notification_digest<F>(
    rows: &[NotificationRow],
    today: NaiveDate,
    label: F,
) -> Vec<DigestEntry>
where
    F: Fn(&str) -> String,
{
    let mut entries = Vec::new();

    for row in rows {
        let display = label(&row.item);

        if let Some(early) = row.response.early_response_date {
            let days = (early - today).num_days();
            if days >= 0 {
                let text = if days == 0 {
                    format!("*Early notifications for {display} come back TODAY!*")
                } else if days == 1 {
                    format!("Early notifications for {display} come back tomorrow")
                } else {
                    format!("Early notifications for {display} come back in {days} days")
                };
                entries.push(DigestEntry { days, text, urgency: urgency_for(days) });
            }
        }

        if let Some(notification) = row.response.notification_date {
            let days = (notification - today).num_days();
            if days >= 0 {
                let text = if days > 1 {
                    format!("Final notifications for {display} come back in {days} days")
                } else if days == 1 {
                    format!("*Final notifications for {display} come back tomorrow!*")
                } else {
                    format!("*Final notifications for {display} come back TODAY!*")
                };
                entries.push(DigestEntry { days, text, urgency: urgency_for(days) });
            }
        }
    }

    entries.sort_by_key(|entry| entry.days);
    entries
}
