//! The deadline engine: per-action business rules on top of the date
//! resolver, the item matcher, and the store port.
//!
//! Every action is atomic. It opens one store session, resolves the item and
//! the date, validates, and either commits a single coherent change or rolls
//! back with no partial state. Validation failures become the reply and stop
//! there; store faults roll back, still produce a reply (carried on
//! [`EngineError`]), and then propagate for logging upstream.

use chrono::NaiveDate;
use thiserror::Error;

use crate::commands::Command;
use crate::dates::{long_date, resolve};
use crate::domain::deadline::{Deadline, NotificationKind};
use crate::errors::{capitalize, ValidationError};
use crate::matcher::{normalize_query, MatchOutcome};
use crate::store::{DeadlineStore, NotificationRow, StoreError, StoreSession};

pub const HELP_TEXT: &str = "\
I can only understand the following language:

- To track a conference: conference is on date
- To drop a conference: forget about conference
- To record an abstract deadline: abstract for conference due by date
- To record a deadline change: conference moved to date
- To record an early notification date: early notification for conference is on date
- To record a final notification date: notification for conference is on date
- To clear an early notification date: clear early notification date for conference
- To check notification dates for one conference: when does conference come back?
- To check current deadlines: deadlines?
- To check all notification dates: notification dates?

*Note*: I am always listening for \"deadlines\" and \"notification dates\", \
but you have to tag me for everything else.";

/// A store fault surfaced by an action. `reply` is the one-liner the user
/// already deserves to see; the source propagates for logging.
#[derive(Debug, Error)]
#[error("store failure while {context}: {source}")]
pub struct EngineError {
    pub context: &'static str,
    pub reply: String,
    #[source]
    pub source: StoreError,
}

enum ActionFailure {
    Validation(ValidationError),
    Store(StoreError),
}

impl From<ValidationError> for ActionFailure {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ActionFailure {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub struct DeadlineEngine<S> {
    store: S,
}

impl<S: DeadlineStore> DeadlineEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Handle one routed command and return the reply text.
    pub async fn dispatch(&self, command: &Command, today: NaiveDate) -> Result<String, EngineError> {
        match command {
            Command::Help => Ok(HELP_TEXT.to_string()),
            Command::Rollback => self.force_rollback().await,
            _ => self.transactional(command, today).await,
        }
    }

    async fn transactional(
        &self,
        command: &Command,
        today: NaiveDate,
    ) -> Result<String, EngineError> {
        let (context, reply) = failure_wording(command);
        let fail = |source: StoreError| EngineError { context, reply: reply.clone(), source };

        let mut session = self.store.begin().await.map_err(&fail)?;

        match self.run(&mut *session, command, today).await {
            Ok(text) => {
                session.commit().await.map_err(&fail)?;
                Ok(text)
            }
            Err(ActionFailure::Validation(validation)) => {
                session.rollback().await.map_err(&fail)?;
                Ok(validation.to_string())
            }
            Err(ActionFailure::Store(source)) => {
                // Best effort; the original fault is the one worth reporting.
                let _ = session.rollback().await;
                Err(fail(source))
            }
        }
    }

    async fn run(
        &self,
        session: &mut dyn StoreSession,
        command: &Command,
        today: NaiveDate,
    ) -> Result<String, ActionFailure> {
        match command {
            Command::SetDeadline { item, date_phrase } => {
                self.set_deadline(session, item, date_phrase, today).await
            }
            Command::SetAbstract { item, date_phrase } => {
                self.set_abstract(session, item, date_phrase, today).await
            }
            Command::SetNotification { kind, item, date_phrase } => {
                self.set_notification(session, *kind, item, date_phrase, today).await
            }
            Command::GetNotification { item } => self.get_notification(session, item).await,
            Command::ClearEarlyNotification { item } => self.clear_early(session, item).await,
            Command::Reschedule { item, date_phrase } => {
                self.reschedule(session, item, date_phrase, today).await
            }
            Command::Forget { item } => self.forget(session, item).await,
            // Dispatched before a session is opened.
            Command::Help | Command::Rollback => Ok(String::new()),
        }
    }

    async fn set_deadline(
        &self,
        session: &mut dyn StoreSession,
        item: &str,
        date_phrase: &str,
        today: NaiveDate,
    ) -> Result<String, ActionFailure> {
        let date = resolve(date_phrase, today, false).map_err(ValidationError::from)?;

        let existing = session.find_deadlines(&normalize_query(item)).await?;
        if let Some(first) = existing.first() {
            return Err(ValidationError::DuplicateItem {
                item: item.to_string(),
                date: first.date,
            }
            .into());
        }

        let created = session.insert_deadline(item, date).await?;
        Ok(format!("Set deadline: {} is on {}", created.item, long_date(date)))
    }

    async fn set_abstract(
        &self,
        session: &mut dyn StoreSession,
        item: &str,
        date_phrase: &str,
        today: NaiveDate,
    ) -> Result<String, ActionFailure> {
        let date = resolve(date_phrase, today, true).map_err(ValidationError::from)?;
        let mut deadline = resolve_single(session, item).await?;

        if date > deadline.date {
            return Err(ValidationError::AbstractAfterDeadline {
                item: deadline.item,
                date: deadline.date,
            }
            .into());
        }

        let updated = deadline.abstract_date.is_some();
        deadline.abstract_date = Some(date);
        session.update_deadline(&deadline).await?;

        let lead = if updated { "Abstract deadline updated: " } else { "Set abstract deadline: " };
        Ok(format!("{lead}abstract for {} is due on {}", deadline.item, long_date(date)))
    }

    async fn set_notification(
        &self,
        session: &mut dyn StoreSession,
        kind: NotificationKind,
        item: &str,
        date_phrase: &str,
        today: NaiveDate,
    ) -> Result<String, ActionFailure> {
        let date = resolve(date_phrase, today, true).map_err(ValidationError::from)?;
        let deadline = resolve_single(session, item).await?;

        if date <= deadline.date {
            return Err(ValidationError::NotificationBeforeDeadline {
                kind,
                item: deadline.item,
                date: deadline.date,
            }
            .into());
        }

        let mut response = match session.find_response(deadline.id).await? {
            Some(existing) => {
                let early = match kind {
                    NotificationKind::Early => Some(date),
                    NotificationKind::Final => existing.early_response_date,
                };
                let notification = match kind {
                    NotificationKind::Final => Some(date),
                    NotificationKind::Early => existing.notification_date,
                };
                if let (Some(early), Some(notification)) = (early, notification) {
                    if notification <= early {
                        // In the conflict case the other side's prospective
                        // value is whatever was already stored.
                        let other_date = match kind {
                            NotificationKind::Early => notification,
                            NotificationKind::Final => early,
                        };
                        return Err(ValidationError::EarlyAfterFinal {
                            kind,
                            other: kind.other(),
                            other_date,
                            provided: date,
                        }
                        .into());
                    }
                }
                existing
            }
            None => session.insert_response(deadline.id).await?,
        };

        let updated = response.date_for(kind).is_some();
        response.set_date_for(kind, date);
        session.update_response(&response).await?;

        let lead = if updated {
            format!("{} date updated: ", kind.label())
        } else {
            format!("Set {} date: ", kind.label())
        };
        Ok(format!(
            "{}{} for {} comes back by {}",
            capitalize(&lead),
            kind.label(),
            deadline.item,
            long_date(date)
        ))
    }

    async fn get_notification(
        &self,
        session: &mut dyn StoreSession,
        item: &str,
    ) -> Result<String, ActionFailure> {
        let deadline = resolve_single(session, item).await?;

        let response = session.find_response(deadline.id).await?;
        let Some(response) = response else {
            return Err(ValidationError::NoNotificationData(deadline.item).into());
        };
        if response.early_response_date.is_none() && response.notification_date.is_none() {
            return Err(ValidationError::NoNotificationData(deadline.item).into());
        }

        let mut text = String::new();
        if let Some(early) = response.early_response_date {
            text.push_str(&format!(
                "early notification for {} comes back by {}",
                deadline.item,
                long_date(early)
            ));
        }
        if let Some(notification) = response.notification_date {
            if text.is_empty() {
                text.push_str(&format!(
                    "final acceptance notification for {} comes by {}",
                    deadline.item,
                    long_date(notification)
                ));
            } else {
                text.push_str(&format!(
                    " and final acceptance notification comes by {}",
                    long_date(notification)
                ));
            }
        }

        Ok(format!("{}.", capitalize(&text)))
    }

    async fn clear_early(
        &self,
        session: &mut dyn StoreSession,
        item: &str,
    ) -> Result<String, ActionFailure> {
        let deadline = resolve_single(session, item).await?;

        match session.find_response(deadline.id).await? {
            Some(mut response) if response.early_response_date.is_some() => {
                response.early_response_date = None;
                session.update_response(&response).await?;
                Ok(format!("Cleared early notification date for {}", deadline.item))
            }
            _ => Err(ValidationError::NothingToClear(deadline.item).into()),
        }
    }

    async fn reschedule(
        &self,
        session: &mut dyn StoreSession,
        item: &str,
        date_phrase: &str,
        today: NaiveDate,
    ) -> Result<String, ActionFailure> {
        let date = resolve(date_phrase, today, false).map_err(ValidationError::from)?;

        let rows = session.find_deadlines(&normalize_query(item)).await?;
        match MatchOutcome::classify(rows) {
            MatchOutcome::None => {
                Err(ValidationError::NoDeadlineToReschedule(item.to_string()).into())
            }
            MatchOutcome::Many(rows) => Err(ambiguous(rows)),
            MatchOutcome::One(mut deadline) => {
                let again = deadline.old_date.is_some();
                deadline.old_date = Some(deadline.date);
                deadline.date = date;
                session.update_deadline(&deadline).await?;

                Ok(format!(
                    "Deadline updated{}: {} is now on {}",
                    if again { " again" } else { "" },
                    item,
                    long_date(date)
                ))
            }
        }
    }

    async fn forget(
        &self,
        session: &mut dyn StoreSession,
        item: &str,
    ) -> Result<String, ActionFailure> {
        let deadline = resolve_single(session, item).await?;
        session.delete_deadline(deadline.id).await?;
        Ok(format!("Deleted deadline {}", deadline.item))
    }

    /// Diagnostic command: force a rollback on a fresh session and confirm.
    pub async fn force_rollback(&self) -> Result<String, EngineError> {
        let fail = |source: StoreError| EngineError {
            context: "rolling back",
            reply: "Exception on query!".to_string(),
            source,
        };

        let session = self.store.begin().await.map_err(fail)?;
        session.rollback().await.map_err(fail)?;
        Ok("Session rolled back!".to_string())
    }

    /// All deadlines, date ascending, for the deadline digest.
    pub async fn upcoming_deadlines(&self) -> Result<Vec<Deadline>, EngineError> {
        let fail = |source: StoreError| EngineError {
            context: "listing deadlines",
            reply: "Exception on query!".to_string(),
            source,
        };

        let mut session = self.store.begin().await.map_err(fail)?;
        match session.list_deadlines().await {
            Ok(rows) => {
                session.commit().await.map_err(fail)?;
                Ok(rows)
            }
            Err(source) => {
                let _ = session.rollback().await;
                Err(fail(source))
            }
        }
    }

    /// All response rows joined with item names, for the notification digest.
    pub async fn notification_rows(&self) -> Result<Vec<NotificationRow>, EngineError> {
        let fail = |source: StoreError| EngineError {
            context: "listing notification dates",
            reply: "Exception on query!".to_string(),
            source,
        };

        let mut session = self.store.begin().await.map_err(fail)?;
        match session.list_responses().await {
            Ok(rows) => {
                session.commit().await.map_err(fail)?;
                Ok(rows)
            }
            Err(source) => {
                let _ = session.rollback().await;
                Err(fail(source))
            }
        }
    }
}

async fn resolve_single(
    session: &mut dyn StoreSession,
    query: &str,
) -> Result<Deadline, ActionFailure> {
    let rows = session.find_deadlines(&normalize_query(query)).await?;
    match MatchOutcome::classify(rows) {
        MatchOutcome::None => Err(ValidationError::NoMatch.into()),
        MatchOutcome::One(deadline) => Ok(deadline),
        MatchOutcome::Many(rows) => Err(ambiguous(rows)),
    }
}

fn ambiguous(rows: Vec<Deadline>) -> ActionFailure {
    ValidationError::AmbiguousMatch {
        candidates: rows.into_iter().map(|deadline| deadline.item).collect(),
    }
    .into()
}

fn failure_wording(command: &Command) -> (&'static str, String) {
    match command {
        Command::SetDeadline { .. } => {
            ("adding deadline", "Encountered error when adding deadline".to_string())
        }
        Command::SetAbstract { .. } => (
            "adding abstract deadline",
            "Encountered error when adding abstract deadline".to_string(),
        ),
        Command::SetNotification { kind, .. } => (
            "adding notification date",
            format!("Encountered error when adding {} date", kind.label()),
        ),
        Command::GetNotification { .. } => {
            ("querying notification dates", "Exception on query!".to_string())
        }
        Command::ClearEarlyNotification { .. } => (
            "clearing early notification date",
            "Encountered error when clearing early notification date".to_string(),
        ),
        Command::Reschedule { .. } => {
            ("changing deadline", "Encountered error when changing deadline".to_string())
        }
        Command::Forget { .. } => {
            ("deleting deadline", "Encountered error when deleting deadline".to_string())
        }
        Command::Help | Command::Rollback => ("handling command", "Exception on query!".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::commands::CommandRouter;
    use crate::digest::deadline_digest;
    use crate::store::{DeadlineStore, InMemoryDeadlineStore, StoreError, StoreSession};

    use super::DeadlineEngine;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2027, 3, 1).expect("valid date")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn engine() -> DeadlineEngine<InMemoryDeadlineStore> {
        DeadlineEngine::new(InMemoryDeadlineStore::new())
    }

    /// Route a sentence the way the bot would and dispatch it.
    async fn say(engine: &DeadlineEngine<InMemoryDeadlineStore>, text: &str) -> String {
        let command = CommandRouter::new().route(text).unwrap_or_else(|| {
            panic!("{text:?} should route to a command");
        });
        engine.dispatch(&command, today()).await.expect("dispatch succeeds")
    }

    #[tokio::test]
    async fn set_deadline_then_digest_shows_the_day_bucket() {
        let engine = engine();

        let reply = say(&engine, "NIPS is on March 11").await;
        assert_eq!(reply, "Set deadline: NIPS is on Mar 11, 2027");

        let deadlines = engine.upcoming_deadlines().await.expect("list");
        let entries = deadline_digest(&deadlines, today(), |item| item.to_string());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "10 days until NIPS");
    }

    #[tokio::test]
    async fn setting_the_same_item_twice_never_duplicates() {
        let engine = engine();

        say(&engine, "NIPS is on March 11").await;
        let reply = say(&engine, "NIPS is on June 1").await;
        assert_eq!(reply, "Deadline already exists! NIPS is on Mar 11, 2027");

        let deadlines = engine.upcoming_deadlines().await.expect("list");
        assert_eq!(deadlines.len(), 1);
        assert_eq!(deadlines[0].date, date(2027, 3, 11));
    }

    #[tokio::test]
    async fn unparseable_and_passed_dates_are_reported() {
        let engine = engine();

        assert_eq!(say(&engine, "NIPS is on banana").await, "Can't parse date banana");
        assert_eq!(say(&engine, "NIPS is on March 3, 2020").await, "Deadline already passed");

        let deadlines = engine.upcoming_deadlines().await.expect("list");
        assert!(deadlines.is_empty());
    }

    #[tokio::test]
    async fn abstract_after_main_deadline_is_rejected_without_mutation() {
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;

        let reply = say(&engine, "abstract for NIPS due by March 20").await;
        assert_eq!(
            reply,
            "Abstract deadline can't be after conference deadline: NIPS is on Mar 11, 2027"
        );

        let deadlines = engine.upcoming_deadlines().await.expect("list");
        assert_eq!(deadlines[0].abstract_date, None);
    }

    #[tokio::test]
    async fn abstract_wording_differs_between_first_set_and_update() {
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;

        let reply = say(&engine, "abstract for NIPS due by March 5").await;
        assert_eq!(reply, "Set abstract deadline: abstract for NIPS is due on Mar 05, 2027");

        let reply = say(&engine, "abstract for NIPS due by March 6").await;
        assert_eq!(reply, "Abstract deadline updated: abstract for NIPS is due on Mar 06, 2027");
    }

    #[tokio::test]
    async fn notification_on_or_before_the_deadline_is_rejected() {
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;

        let reply = say(&engine, "notification for NIPS is on March 10").await;
        assert_eq!(
            reply,
            "Final acceptance notification date can't be before conference deadline: NIPS is on Mar 11, 2027"
        );

        // Strict equality is also rejected; error names the early field when
        // the sentence classifies early.
        let reply = say(&engine, "early notification for NIPS is on March 11").await;
        assert_eq!(
            reply,
            "Early notification date can't be before conference deadline: NIPS is on Mar 11, 2027"
        );
    }

    #[tokio::test]
    async fn notification_wording_differs_between_first_set_and_update() {
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;

        let reply = say(&engine, "notification for NIPS is on June 1").await;
        assert_eq!(
            reply,
            "Set final acceptance notification date: final acceptance notification for NIPS comes back by Jun 01, 2027"
        );

        let reply = say(&engine, "final notification for NIPS is on June 2").await;
        assert_eq!(
            reply,
            "Final acceptance notification date updated: final acceptance notification for NIPS comes back by Jun 02, 2027"
        );
    }

    #[tokio::test]
    async fn early_and_final_ordering_holds_regardless_of_entry_order() {
        {
            let engine = engine();
            say(&engine, "NIPS is on March 11").await;

            // Final first, then an early date after it: rejected.
            say(&engine, "notification for NIPS is on June 1").await;
            let reply = say(&engine, "early notification for NIPS is on June 10").await;
            assert_eq!(
                reply,
                "Early notification date can't be on or after final acceptance notification date! \
                 Final acceptance notification date is Jun 01, 2027, but early notification date \
                 provided is Jun 10, 2027"
            );
        }

        // The other direction: a final date on/before the early one.
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;
        say(&engine, "early notification for NIPS is on June 1").await;
        let reply = say(&engine, "notification for NIPS is on June 1").await;
        assert_eq!(
            reply,
            "Early notification date can't be on or after final acceptance notification date! \
             Early notification date is Jun 01, 2027, but final acceptance notification date \
             provided is Jun 01, 2027"
        );

        // A consistent pair is accepted in either order.
        let reply = say(&engine, "notification for NIPS is on June 10").await;
        assert_eq!(
            reply,
            "Set final acceptance notification date: final acceptance notification for NIPS comes back by Jun 10, 2027"
        );
    }

    #[tokio::test]
    async fn get_notification_reports_known_dates_and_invites_missing_ones() {
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;

        let reply = say(&engine, "when does NIPS come back?").await;
        assert_eq!(
            reply,
            "I don't have any notification dates for NIPS! Maybe you can provide them... ( ͡° ͜ʖ ͡°)"
        );

        say(&engine, "early notification for NIPS is on June 1").await;
        let reply = say(&engine, "when does NIPS come back?").await;
        assert_eq!(reply, "Early notification for NIPS comes back by Jun 01, 2027.");

        say(&engine, "notification for NIPS is on June 10").await;
        let reply = say(&engine, "when does NIPS come back?").await;
        assert_eq!(
            reply,
            "Early notification for NIPS comes back by Jun 01, 2027 and final acceptance notification comes by Jun 10, 2027."
        );
    }

    #[tokio::test]
    async fn clear_early_notification_then_nothing_left_to_clear() {
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;
        say(&engine, "early notification for NIPS is on June 1").await;

        let reply = say(&engine, "clear early notification date for NIPS").await;
        assert_eq!(reply, "Cleared early notification date for NIPS");

        let reply = say(&engine, "clear early notification date for NIPS").await;
        assert_eq!(reply, "No early notification date is set for NIPS");
    }

    #[tokio::test]
    async fn forget_cascades_to_the_response_row() {
        let store = InMemoryDeadlineStore::new();
        let engine = DeadlineEngine::new(store.clone());

        say(&engine, "NIPS is on March 11").await;
        say(&engine, "notification for NIPS is on June 1").await;

        let reply = say(&engine, "forget about NIPS").await;
        assert_eq!(reply, "Deleted deadline NIPS");

        let (deadlines, responses) = store.snapshot();
        assert!(deadlines.is_empty());
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn forget_without_a_response_row_succeeds() {
        let engine = engine();
        say(&engine, "NIPS is on March 11").await;
        assert_eq!(say(&engine, "forget NIPS").await, "Deleted deadline NIPS");
    }

    #[tokio::test]
    async fn reschedule_keeps_one_level_of_history_and_marks_repeats() {
        let store = InMemoryDeadlineStore::new();
        let engine = DeadlineEngine::new(store.clone());
        say(&engine, "NIPS is on March 11").await;

        let reply = say(&engine, "NIPS moved to March 20").await;
        assert_eq!(reply, "Deadline updated: NIPS is now on Mar 20, 2027");
        let (deadlines, _) = store.snapshot();
        assert_eq!(deadlines[0].old_date, Some(date(2027, 3, 11)));

        let reply = say(&engine, "NIPS moved to March 25").await;
        assert_eq!(reply, "Deadline updated again: NIPS is now on Mar 25, 2027");
        let (deadlines, _) = store.snapshot();
        assert_eq!(deadlines[0].old_date, Some(date(2027, 3, 20)));
        assert_eq!(deadlines[0].date, date(2027, 3, 25));
    }

    #[tokio::test]
    async fn missing_items_get_the_no_match_replies() {
        let engine = engine();
        assert_eq!(say(&engine, "abstract for NIPS due by March 5").await, "No matching deadlines");
        assert_eq!(
            say(&engine, "NIPS moved to March 20").await,
            "No existing deadline for NIPS"
        );
    }

    #[tokio::test]
    async fn ambiguous_matches_always_list_every_candidate() {
        let engine = engine();
        say(&engine, "ABC is on March 11").await;
        say(&engine, "ABD is on March 12").await;

        let reply = say(&engine, "forget about AB").await;
        assert_eq!(reply, "More than one matching deadline: ABC, ABD");

        // Nothing was deleted.
        assert_eq!(engine.upcoming_deadlines().await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn rollback_command_confirms() {
        let engine = engine();
        assert_eq!(say(&engine, "rollback").await, "Session rolled back!");
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl DeadlineStore for FailingStore {
        async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
            Err(StoreError::Backend("database is gone".to_string()))
        }
    }

    #[tokio::test]
    async fn store_failures_carry_a_reply_and_still_propagate() {
        let engine = DeadlineEngine::new(FailingStore);
        let command = CommandRouter::new().route("NIPS is on March 11").expect("command");

        let error = engine.dispatch(&command, today()).await.expect_err("store failure");
        assert_eq!(error.reply, "Encountered error when adding deadline");
        assert_eq!(error.context, "adding deadline");
    }
}
