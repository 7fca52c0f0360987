//! Socket-mode transport scaffold: a pluggable transport feeding the bot and
//! a pluggable sink carrying its replies back, with reconnect/backoff around
//! the pump loop. A handler failure never kills the pump; the user gets the
//! action's one-line reply and the fault goes to the process log.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use deadliner_core::store::DeadlineStore;

use crate::attachments::Attachment;
use crate::events::{DeadlineBot, MessageEvent, OutboundMessage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEnvelope {
    pub envelope_id: String,
    pub event: MessageEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<InboundEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Outbound side of the channel contract: plain replies and attachment posts.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn reply(&self, channel_id: &str, text: &str) -> Result<(), TransportError>;
    async fn post_attachments(
        &self,
        channel_id: &str,
        attachments: &[Attachment],
    ) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<InboundEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopMessageSink;

#[async_trait]
impl MessageSink for NoopMessageSink {
    async fn reply(&self, _channel_id: &str, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn post_attachments(
        &self,
        _channel_id: &str,
        _attachments: &[Attachment],
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct SocketModeRunner<S> {
    transport: Arc<dyn SocketTransport>,
    sink: Arc<dyn MessageSink>,
    bot: DeadlineBot<S>,
    reconnect_policy: ReconnectPolicy,
}

impl<S: DeadlineStore> SocketModeRunner<S> {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        sink: Arc<dyn MessageSink>,
        bot: DeadlineBot<S>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, sink, bot, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.event.correlation_id,
                channel_id = %envelope.event.channel_id,
                addressed = envelope.event.addressed,
                "received slack envelope"
            );

            if let Err(ack_error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.event.correlation_id,
                    error = %ack_error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.event.correlation_id,
                    "acknowledged slack envelope"
                );
            }

            self.process(&envelope.event).await;
        }
    }

    async fn process(&self, event: &MessageEvent) {
        let today = chrono::Local::now().date_naive();

        match self.bot.handle(event, today).await {
            Ok(messages) => {
                for message in messages {
                    let sent = match &message {
                        OutboundMessage::Text(text) => {
                            self.sink.reply(&event.channel_id, text).await
                        }
                        OutboundMessage::Attachments(attachments) => {
                            self.sink.post_attachments(&event.channel_id, attachments).await
                        }
                    };
                    if let Err(send_error) = sent {
                        warn!(
                            correlation_id = %event.correlation_id,
                            channel_id = %event.channel_id,
                            error = %send_error,
                            "failed to deliver outbound message"
                        );
                    }
                }
            }
            Err(handler_error) => {
                // Reply first, then keep the fault visible upstream.
                let _ = self.sink.reply(&event.channel_id, handler_error.user_reply()).await;
                error!(
                    correlation_id = %event.correlation_id,
                    channel_id = %event.channel_id,
                    error = %handler_error,
                    "message handling failed; continuing socket loop"
                );
            }
        }
    }
}
