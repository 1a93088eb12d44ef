//! Per-message delivery: validate, attempt, back off, record the outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use herald_core::config::DeliveryConfig;
use herald_core::Message;
use herald_storage::{CacheSink, MessageStore};

use crate::client::{DeliveryClient, DeliveryOutcome, DeliveryRequest};

/// Attempt budget and exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the failed attempt with 0-based index `attempt`:
    /// `base_delay * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// How a single message's delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Accepted by the endpoint; recorded as sent.
    Sent,
    /// Every attempt failed; recorded as failed.
    Failed,
    /// Body over the length limit; never attempted, still pending.
    Skipped,
    /// Cancelled before reaching a terminal state; still pending.
    Abandoned,
}

/// Shared delivery context. One [`deliver`](Self::deliver) call runs one
/// message through its whole attempt sequence.
pub struct DeliveryUnit {
    store: Arc<dyn MessageStore>,
    cache: Arc<dyn CacheSink>,
    client: Arc<dyn DeliveryClient>,
    policy: RetryPolicy,
    max_message_length: usize,
    cache_key_prefix: String,
}

impl DeliveryUnit {
    pub fn new(
        store: Arc<dyn MessageStore>,
        cache: Arc<dyn CacheSink>,
        client: Arc<dyn DeliveryClient>,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            store,
            cache,
            client,
            policy: RetryPolicy::new(config.max_attempts, config.retry_base_delay),
            max_message_length: config.max_message_length,
            cache_key_prefix: config.cache_key_prefix.clone(),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn deliver(&self, message: Message, cancel: CancellationToken) -> UnitOutcome {
        if message.content_len() > self.max_message_length {
            warn!(
                message_id = message.id,
                length = message.content_len(),
                max = self.max_message_length,
                "message body too long, skipping"
            );
            return UnitOutcome::Skipped;
        }

        let request = DeliveryRequest::for_message(&message);
        let attempts = self.policy.max_attempts;

        for attempt in 0..attempts {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(message_id = message.id, attempt, "delivery cancelled in flight");
                    return UnitOutcome::Abandoned;
                }
                result = self.client.deliver(&request) => result,
            };

            match result {
                Ok(DeliveryOutcome::Accepted { message_id }) => {
                    info!(message_id = message.id, attempt, "message delivered");
                    self.record_sent(&message, message_id).await;
                    return UnitOutcome::Sent;
                }
                Ok(DeliveryOutcome::Rejected { status }) => {
                    warn!(message_id = message.id, attempt, status, "delivery rejected");
                }
                Err(e) => {
                    warn!(message_id = message.id, attempt, error = %e, "delivery attempt failed");
                }
            }

            if attempt + 1 == attempts {
                break;
            }

            let delay = self.policy.backoff(attempt);
            debug!(message_id = message.id, attempt, ?delay, "retrying after backoff");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(message_id = message.id, attempt, "retry cancelled during backoff");
                    return UnitOutcome::Abandoned;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        warn!(message_id = message.id, attempts, "all attempts failed, marking as failed");
        if let Err(e) = self.store.mark_failed(message.id, Utc::now()).await {
            warn!(message_id = message.id, error = %e, "failed to mark message as failed");
        }
        UnitOutcome::Failed
    }

    async fn record_sent(&self, message: &Message, correlation_id: Option<String>) {
        let sent_at = Utc::now();

        if let Err(e) = self.store.mark_sent(message.id, sent_at).await {
            warn!(message_id = message.id, error = %e, "failed to mark message as sent");
        }

        let Some(correlation_id) = correlation_id else {
            return;
        };
        let key = format!("{}:{}", self.cache_key_prefix, correlation_id);
        let value = sent_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        match self.cache.set(&key, &value, Duration::ZERO).await {
            Ok(()) => debug!(message_id = message.id, %key, sent_at = %value, "cached delivery receipt"),
            Err(e) => warn!(message_id = message.id, %key, error = %e, "failed to cache delivery receipt"),
        }
    }
}
