//! Free-text command routing.
//!
//! An explicit, ordered list of (pattern, extractor) rules. The first
//! pattern that matches structurally drives extraction into a typed
//! [`Command`]; extractors return structured fields, never positional
//! captures shared across rules. Rule order matters: the generic
//! "ITEM is on DATE" shape overlaps with several more specific sentences
//! and is therefore tried last, with explicit exclusions for abstract and
//! response/notification phrasing.

use std::sync::OnceLock;

use regex::{Captures, Regex, RegexBuilder};

use crate::domain::deadline::NotificationKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Rollback,
    ClearEarlyNotification { item: String },
    SetAbstract { item: String, date_phrase: String },
    SetNotification { kind: NotificationKind, item: String, date_phrase: String },
    GetNotification { item: String },
    Reschedule { item: String, date_phrase: String },
    Forget { item: String },
    SetDeadline { item: String, date_phrase: String },
}

type Extractor = fn(&Captures<'_>) -> Option<Command>;

struct Rule {
    pattern: Regex,
    extract: Extractor,
}

pub struct CommandRouter {
    rules: Vec<Rule>,
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        let rules = vec![
            rule(r"^help\??$", extract_help),
            rule(r"^rollback\??$", extract_rollback),
            rule(
                r"^clear\s+(early(?:\s+reject)?\s+|first\s+round\s+)(?:response|notification)\s+(?:date\s+)?for\s+(.+)$",
                extract_clear,
            ),
            rule(r"^abstract\s+for\s+(.+)\s+(?:on|by)\s+(.+)$", extract_abstract),
            rule(
                r"^(early(?:\s+reject)?\s+|first\s+round\s+|(?:final\s+)?(?:acceptance\s+)?)(?:response|notification)\s+for\s+(.+)\s+(?:on|by)\s+(.+)$",
                extract_notification,
            ),
            rule(r"^when\s+does\s+(.+)\s+come\s+back\??$", extract_get_notification),
            rule(r"^(.+)\s+moved\s+to\s+(.+)$", extract_reschedule),
            rule(r"^forget(?:\s+about)?\s+(.+)$", extract_forget),
            rule(r"^(.+)\s+(?:on|in)\s+(.+)$", extract_set_deadline),
        ];

        Self { rules }
    }

    /// Try rules in priority order; the first structural match that also
    /// extracts wins. Returns `None` for chatter that is not a command.
    pub fn route(&self, text: &str) -> Option<Command> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        for rule in &self.rules {
            if let Some(captures) = rule.pattern.captures(text) {
                if let Some(command) = (rule.extract)(&captures) {
                    return Some(command);
                }
            }
        }

        None
    }
}

fn rule(pattern: &str, extract: Extractor) -> Rule {
    Rule { pattern: compile(pattern), extract }
}

fn compile(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("command pattern compiles")
}

fn extract_help(_captures: &Captures<'_>) -> Option<Command> {
    Some(Command::Help)
}

fn extract_rollback(_captures: &Captures<'_>) -> Option<Command> {
    Some(Command::Rollback)
}

fn extract_clear(captures: &Captures<'_>) -> Option<Command> {
    Some(Command::ClearEarlyNotification { item: field(captures, 2) })
}

fn extract_abstract(captures: &Captures<'_>) -> Option<Command> {
    // Greedy item capture swallows the filler word in "abstract for X due by".
    let item = strip_trailing_word(&field(captures, 1), "due");
    Some(Command::SetAbstract { item, date_phrase: field(captures, 2) })
}

fn extract_notification(captures: &Captures<'_>) -> Option<Command> {
    let marker = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let item = strip_trailing_word(&field(captures, 2), "is");
    Some(Command::SetNotification {
        kind: NotificationKind::classify(marker),
        item,
        date_phrase: field(captures, 3),
    })
}

fn extract_get_notification(captures: &Captures<'_>) -> Option<Command> {
    Some(Command::GetNotification { item: field(captures, 1) })
}

fn extract_reschedule(captures: &Captures<'_>) -> Option<Command> {
    Some(Command::Reschedule { item: field(captures, 1), date_phrase: field(captures, 2) })
}

fn extract_forget(captures: &Captures<'_>) -> Option<Command> {
    Some(Command::Forget { item: field(captures, 1) })
}

/// The generic "ITEM is on DATE" shape. Abstract and response/notification
/// sentences must never fall through to it, so they are excluded explicitly
/// here rather than with lookaheads in the pattern.
fn extract_set_deadline(captures: &Captures<'_>) -> Option<Command> {
    let sentence = captures.get(0).map(|m| m.as_str()).unwrap_or_default().to_ascii_lowercase();
    if sentence.contains("abstract") {
        return None;
    }

    let item = strip_trailing_word(&field(captures, 1), "is");
    let lowered = item.to_ascii_lowercase();
    if lowered.contains("response") || lowered.contains("notification") {
        return None;
    }

    Some(Command::SetDeadline { item, date_phrase: field(captures, 2) })
}

fn field(captures: &Captures<'_>, index: usize) -> String {
    captures.get(index).map(|m| m.as_str().trim().to_string()).unwrap_or_default()
}

/// Drop a trailing filler word ("X is", "X due") that the greedy item
/// capture keeps.
fn strip_trailing_word(item: &str, word: &str) -> String {
    let lowered = item.to_ascii_lowercase();
    let suffix = format!(" {word}");
    if lowered.ends_with(&suffix) {
        item[..item.len() - suffix.len()].trim_end().to_string()
    } else {
        item.to_string()
    }
}

/// Standing digest triggers. These fire even when the bot is not addressed,
/// but only when no command rule matched the message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DigestTriggers {
    pub deadlines: bool,
    pub notifications: bool,
}

impl DigestTriggers {
    pub fn any(self) -> bool {
        self.deadlines || self.notifications
    }
}

pub fn digest_triggers(text: &str) -> DigestTriggers {
    DigestTriggers {
        deadlines: deadline_trigger().is_match(text),
        notifications: notification_trigger().is_match(text),
    }
}

fn deadline_trigger() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"\bdeadlines?\b"))
}

fn notification_trigger() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"\bnotification\s+dates?\b"))
}
