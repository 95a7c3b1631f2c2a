//! # EventBus Abstraction
//!
//! Publishing side of the integration-event pipeline. The outbox processor
//! hands every pending outbox row to an [`EventBus`]; this crate decides how
//! the bytes reach the broker.
//!
//! ## Implementations
//!
//! - **NatsPublisher**: Production implementation using NATS JetStream, with a
//!   lazily (re)established connection guarded by [`ConnectionManager`]
//! - **InMemoryBus**: Test/dev implementation that records published messages
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_bus::{BrokerConfig, EventBus, InMemoryBus, NatsPublisher};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Production: NATS JetStream, connects on first publish
//! let config = BrokerConfig::from_env()?;
//! let bus: Arc<dyn EventBus> = Arc::new(NatsPublisher::nats(config));
//!
//! // Dev/Test: In-Memory
//! let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
//!
//! bus.publish("orders.order_placed.v1", br#"{"order_id":"123"}"#).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod envelope;
mod inmemory_bus;
mod nats_bus;

pub use config::BrokerConfig;
pub use connection::{BrokerChannel, BrokerConnector, ConnectionManager};
pub use envelope::{validate_envelope_fields, EventEnvelope};
pub use inmemory_bus::InMemoryBus;
pub use nats_bus::{NatsChannel, NatsConnector, NatsPublisher};

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// Content type carried by every integration event.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A message as handed to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Fully resolved subject the message was published to
    pub subject: String,
    /// Serialized integration event
    pub payload: Vec<u8>,
    /// Message properties (`Content-Type`, `type`)
    pub headers: HashMap<String, String>,
}

impl BusMessage {
    /// Create a new bus message without properties
    pub fn new(subject: String, payload: Vec<u8>) -> Self {
        Self {
            subject,
            payload,
            headers: HashMap::new(),
        }
    }

    /// Add a message property
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The integration event type carried in the `type` property
    pub fn event_type(&self) -> Option<&str> {
        self.headers.get("type").map(String::as_str)
    }
}

/// Properties attached to every published integration event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageProperties {
    pub content_type: String,
    pub event_type: String,
    /// Ask the broker to keep the message across its own restarts
    pub persistent: bool,
}

impl MessageProperties {
    pub fn for_event(event_type: &str) -> Self {
        Self {
            content_type: CONTENT_TYPE_JSON.to_string(),
            event_type: event_type.to_string(),
            persistent: true,
        }
    }
}

/// Errors that can occur when using the event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to publish message: {0}")]
    PublishError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("failed to declare exchange {exchange}: {reason}")]
    DeclareError { exchange: String, reason: String },

    #[error("invalid broker configuration: {0}")]
    ConfigError(String),
}

/// Result type for event bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Core publishing abstraction used by the outbox processor
///
/// Implementations must be safe to call concurrently; a failed call must
/// leave the bus usable for the next attempt.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one serialized integration event
    ///
    /// # Arguments
    /// * `event_type` - Integration event type, sent as the `type` property so
    ///   consumers can pick a deserializer
    /// * `payload` - The serialized message body (JSON)
    ///
    /// # Returns
    /// * `Ok(())` once the broker accepted the message
    /// * `Err(BusError)` on any connection or publish failure
    async fn publish(&self, event_type: &str, payload: &[u8]) -> BusResult<()>;
}

impl fmt::Debug for dyn EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}
