//! Inbound message handling: route @-mentions through the command rules and
//! the engine, and serve the standing digest triggers for everything else.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use deadliner_cfp::SubmissionLinkSource;
use deadliner_core::commands::{digest_triggers, Command, CommandRouter};
use deadliner_core::digest::{
    deadline_digest, notification_digest, NO_DEADLINES, NO_NOTIFICATION_DATES,
};
use deadliner_core::engine::{DeadlineEngine, EngineError};
use deadliner_core::store::DeadlineStore;

use crate::attachments::{self, Attachment};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    /// True when the message @-mentioned the bot (mention already stripped
    /// by the transport).
    pub addressed: bool,
    pub correlation_id: String,
}

impl MessageEvent {
    pub fn new(
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
        addressed: bool,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            addressed,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Attachments(Vec<Attachment>),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl HandlerError {
    /// The one-liner the user gets before the fault propagates to the logs.
    pub fn user_reply(&self) -> &str {
        match self {
            Self::Engine(error) => &error.reply,
        }
    }
}

pub struct DeadlineBot<S> {
    router: CommandRouter,
    engine: DeadlineEngine<S>,
    links: Arc<dyn SubmissionLinkSource>,
}

impl<S: DeadlineStore> DeadlineBot<S> {
    pub fn new(engine: DeadlineEngine<S>, links: Arc<dyn SubmissionLinkSource>) -> Self {
        Self { router: CommandRouter::new(), engine, links }
    }

    /// Handle one inbound message. Zero outbound messages means the bot has
    /// nothing to say (plain channel chatter).
    pub async fn handle(
        &self,
        event: &MessageEvent,
        today: NaiveDate,
    ) -> Result<Vec<OutboundMessage>, HandlerError> {
        if event.addressed {
            if let Some(command) = self.router.route(&event.text) {
                let message = match command {
                    Command::Help => {
                        OutboundMessage::Attachments(vec![attachments::help_attachment()])
                    }
                    command => {
                        OutboundMessage::Text(self.engine.dispatch(&command, today).await?)
                    }
                };
                return Ok(vec![message]);
            }
        }

        let triggers = digest_triggers(&event.text);
        let mut outbound = Vec::new();
        if triggers.deadlines {
            outbound.push(self.deadline_digest_message(today).await?);
        }
        if triggers.notifications {
            outbound.push(self.notification_digest_message(today).await?);
        }

        Ok(outbound)
    }

    async fn deadline_digest_message(
        &self,
        today: NaiveDate,
    ) -> Result<OutboundMessage, HandlerError> {
        let deadlines = self.engine.upcoming_deadlines().await?;
        let labels = self.labels_for(deadlines.iter().map(|d| d.item.as_str())).await;

        let entries = deadline_digest(&deadlines, today, |item| display_label(&labels, item));
        if entries.is_empty() {
            Ok(OutboundMessage::Text(NO_DEADLINES.to_string()))
        } else {
            Ok(OutboundMessage::Attachments(attachments::from_digest(&entries)))
        }
    }

    async fn notification_digest_message(
        &self,
        today: NaiveDate,
    ) -> Result<OutboundMessage, HandlerError> {
        let rows = self.engine.notification_rows().await?;
        let labels = self.labels_for(rows.iter().map(|row| row.item.as_str())).await;

        let entries = notification_digest(&rows, today, |item| display_label(&labels, item));
        if entries.is_empty() {
            Ok(OutboundMessage::Text(NO_NOTIFICATION_DATES.to_string()))
        } else {
            Ok(OutboundMessage::Attachments(attachments::from_digest(&entries)))
        }
    }

    /// Pre-resolve CFP links so the digest renderer stays synchronous.
    /// Misses degrade to the plain item name.
    async fn labels_for<'a>(
        &self,
        items: impl Iterator<Item = &'a str>,
    ) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        for item in items {
            if labels.contains_key(item) {
                continue;
            }
            let label = match self.links.lookup(item).await {
                Some(url) => format!("<{url}|{item}>"),
                None => item.to_string(),
            };
            labels.insert(item.to_string(), label);
        }
        labels
    }
}

fn display_label(labels: &HashMap<String, String>, item: &str) -> String {
    labels.get(item).cloned().unwrap_or_else(|| item.to_string())
}
