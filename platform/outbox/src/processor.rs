//! Background task that publishes outbox messages to the event bus
//!
//! The processor polls for pending messages, publishes each one
//! independently and records the outcome on the row. A failed message is
//! retried on later cycles until it reaches `max_retries`, after which it is
//! left unprocessed with an "exceeded max retries" error for operators.

use crate::config::OutboxProcessorConfig;
use crate::error::OutboxResult;
use crate::message::{PendingOutboxMessage, RETRIES_EXCEEDED};
use crate::repository::OutboxRepository;
use event_bus::EventBus;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome counts of one polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub published: usize,
    /// Failed, still below the retry ceiling
    pub retried: usize,
    /// Failed and reached the retry ceiling
    pub exhausted: usize,
    /// Outcome could not be recorded
    pub errored: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Published,
    Retried,
    Exhausted,
}

pub struct OutboxProcessor<R: OutboxRepository> {
    repository: Arc<R>,
    bus: Arc<dyn EventBus>,
    config: OutboxProcessorConfig,
}

impl<R: OutboxRepository> OutboxProcessor<R> {
    pub fn new(repository: Arc<R>, bus: Arc<dyn EventBus>, config: OutboxProcessorConfig) -> Self {
        Self {
            repository,
            bus,
            config,
        }
    }

    pub fn config(&self) -> &OutboxProcessorConfig {
        &self.config
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Errors from a cycle are logged and never end the loop.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Starting outbox processor"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Outbox processor stopped before first cycle");
                return;
            }
            _ = tokio::time::sleep(self.config.warmup_delay) => {}
        }

        let mut cycle: u64 = 0;

        loop {
            cycle += 1;

            match self.process_batch().await {
                Ok(report) if report.fetched > 0 => {
                    tracing::info!(
                        cycle,
                        fetched = report.fetched,
                        published = report.published,
                        retried = report.retried,
                        exhausted = report.exhausted,
                        errored = report.errored,
                        "Outbox batch processed"
                    );
                }
                Ok(_) => {
                    tracing::trace!(cycle, "No pending outbox messages");
                }
                Err(e) => {
                    tracing::error!(cycle, error = %e, "Outbox batch failed");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!(cycles = cycle, "Outbox processor stopped");
    }

    /// Publish one batch of retryable messages, oldest first
    ///
    /// Only the fetch can fail the batch. Every message is handled on its
    /// own; a failure to record an outcome is logged and counted.
    pub async fn process_batch(&self) -> OutboxResult<BatchReport> {
        let messages = self
            .repository
            .get_retryable(self.config.batch_size, self.config.max_retries)
            .await?;

        let mut report = BatchReport {
            fetched: messages.len(),
            ..BatchReport::default()
        };

        for message in &messages {
            match self.process_message(message).await {
                Ok(Outcome::Published) => report.published += 1,
                Ok(Outcome::Retried) => report.retried += 1,
                Ok(Outcome::Exhausted) => report.exhausted += 1,
                Err(e) => {
                    report.errored += 1;
                    tracing::error!(
                        message_id = %message.id,
                        event_type = %message.event_type,
                        error = %e,
                        "Failed to record outbox message outcome"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn process_message(&self, message: &PendingOutboxMessage) -> OutboxResult<Outcome> {
        match self
            .bus
            .publish(&message.event_type, message.content.as_bytes())
            .await
        {
            Ok(()) => {
                self.repository.mark_as_processed(message.id).await?;
                tracing::info!(
                    message_id = %message.id,
                    event_type = %message.event_type,
                    "Outbox message published"
                );
                Ok(Outcome::Published)
            }
            Err(e) => self.record_failure(message, &e.to_string()).await,
        }
    }

    async fn record_failure(
        &self,
        message: &PendingOutboxMessage,
        error: &str,
    ) -> OutboxResult<Outcome> {
        let max_retries = self.config.max_retries;
        let retry_count = message.retry_count.saturating_add(1);

        if retry_count >= max_retries {
            let annotated = format!("{RETRIES_EXCEEDED} ({max_retries}): {error}");
            self.repository
                .mark_as_failed(message.id, &annotated, retry_count)
                .await?;
            tracing::error!(
                message_id = %message.id,
                event_type = %message.event_type,
                retry_count,
                error = %error,
                "Outbox message exceeded max retries, giving up"
            );
            Ok(Outcome::Exhausted)
        } else {
            self.repository
                .mark_as_failed(message.id, error, retry_count)
                .await?;
            tracing::warn!(
                message_id = %message.id,
                event_type = %message.event_type,
                retry_count,
                max_retries,
                error = %error,
                "Failed to publish outbox message, will retry"
            );
            Ok(Outcome::Retried)
        }
    }
}
