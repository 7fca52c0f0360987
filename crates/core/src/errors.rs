//! Expected validation outcomes, separated from infrastructure faults.
//!
//! A [`ValidationError`]'s `Display` text is the exact reply the bot sends;
//! these are fully absorbed at the action boundary and never propagate.
//! Store faults travel as [`crate::store::StoreError`] and do propagate
//! after the user has been told.

use chrono::NaiveDate;
use thiserror::Error;

use crate::dates::{long_date, DateError};
use crate::domain::deadline::NotificationKind;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Can't parse date {0}")]
    UnparseableDate(String),
    #[error("Deadline already passed")]
    DateAlreadyPassed,
    #[error("No matching deadlines")]
    NoMatch,
    #[error("No existing deadline for {0}")]
    NoDeadlineToReschedule(String),
    #[error("More than one matching deadline: {}", .candidates.join(", "))]
    AmbiguousMatch { candidates: Vec<String> },
    #[error("Deadline already exists! {item} is on {}", fmt_date(.date))]
    DuplicateItem { item: String, date: NaiveDate },
    #[error(
        "Abstract deadline can't be after conference deadline: {item} is on {}",
        fmt_date(.date)
    )]
    AbstractAfterDeadline { item: String, date: NaiveDate },
    #[error(
        "{} date can't be before conference deadline: {item} is on {}",
        capitalized(.kind),
        fmt_date(.date)
    )]
    NotificationBeforeDeadline { kind: NotificationKind, item: String, date: NaiveDate },
    #[error(
        "Early notification date can't be on or after final acceptance notification date! {} date is {}, but {} date provided is {}",
        capitalized(.other),
        fmt_date(.other_date),
        .kind.label(),
        fmt_date(.provided)
    )]
    EarlyAfterFinal {
        kind: NotificationKind,
        other: NotificationKind,
        other_date: NaiveDate,
        provided: NaiveDate,
    },
    #[error("No early notification date is set for {0}")]
    NothingToClear(String),
    #[error("I don't have any notification dates for {0}! Maybe you can provide them... ( ͡° ͜ʖ ͡°)")]
    NoNotificationData(String),
}

impl From<DateError> for ValidationError {
    fn from(value: DateError) -> Self {
        match value {
            DateError::Unparseable(text) => Self::UnparseableDate(text),
            DateError::AlreadyPassed => Self::DateAlreadyPassed,
        }
    }
}

fn fmt_date(date: &NaiveDate) -> String {
    long_date(*date)
}

fn capitalized(kind: &NotificationKind) -> String {
    capitalize(kind.label())
}

pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
