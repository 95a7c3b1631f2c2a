//! In-memory implementation of the EventBus trait for testing and development

use crate::{BrokerConfig, BusError, BusMessage, BusResult, EventBus, MessageProperties};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// EventBus implementation that records every message in memory
///
/// This implementation is suitable for:
/// - Unit tests (no external dependencies)
/// - Local development without Docker
/// - Integration tests asserting on what the outbox processor sent
///
/// Publishing can be made to fail for specific event types, or for every
/// message, to exercise retry handling.
///
/// # Example
/// ```rust
/// use event_bus::{EventBus, InMemoryBus};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryBus::new();
/// bus.publish("orders.order_placed.v1", b"hello").await?;
///
/// let sent = bus.published();
/// assert_eq!(sent.len(), 1);
/// assert_eq!(sent[0].event_type(), Some("orders.order_placed.v1"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBus {
    state: Arc<Mutex<State>>,
    subject: String,
}

#[derive(Default)]
struct State {
    published: Vec<BusMessage>,
    failing_types: HashSet<String>,
    fail_all: bool,
    attempts: usize,
}

impl InMemoryBus {
    /// Create a new in-memory bus publishing to the default subject
    pub fn new() -> Self {
        Self::with_config(&BrokerConfig::default())
    }

    /// Create a bus that records messages under the configured subject
    pub fn with_config(config: &BrokerConfig) -> Self {
        Self {
            state: Arc::default(),
            subject: config.publish_subject(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded messages
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every successfully published message, in publish order
    pub fn published(&self) -> Vec<BusMessage> {
        self.lock().published.clone()
    }

    /// Number of publish calls, successful or not
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Make every publish of `event_type` fail until cleared
    pub fn fail_event_type(&self, event_type: &str) {
        self.lock().failing_types.insert(event_type.to_string());
    }

    /// Make every publish fail (`true`) or succeed (`false`)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().fail_all = unavailable;
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_types.clear();
        state.fail_all = false;
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, event_type: &str, payload: &[u8]) -> BusResult<()> {
        let mut state = self.lock();
        state.attempts += 1;

        if state.fail_all {
            return Err(BusError::ConnectionError("in-memory bus unavailable".to_string()));
        }
        if state.failing_types.contains(event_type) {
            return Err(BusError::PublishError(format!(
                "publishing {event_type} rejected by in-memory bus"
            )));
        }

        let properties = MessageProperties::for_event(event_type);
        let msg = BusMessage::new(self.subject.clone(), payload.to_vec())
            .with_header("Content-Type", properties.content_type)
            .with_header("type", properties.event_type);
        state.published.push(msg);

        Ok(())
    }
}
