//! # Event Envelope
//!
//! Envelope wrapped around every integration event written to the outbox.
//!
//! ## Envelope Fields
//!
//! - `event_id`: Unique identifier, doubles as the consumer idempotency key
//! - `occurred_at`: When the originating business fact happened (not publish time)
//! - `source_module`: Module that produced the event
//! - `source_version`: Semantic version of the source module
//! - `aggregate_type` / `aggregate_id`: The aggregate that raised the domain event
//! - `correlation_id`: Links related events in a business transaction
//! - `causation_id`: Links this event to the command/event that caused it
//! - `payload`: Event-specific data (generic type parameter)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard integration event envelope
///
/// Delivery is at-least-once, so consumers are expected to deduplicate on
/// `event_id`.
///
/// # Examples
///
/// ```rust
/// use event_bus::EventEnvelope;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct OrderPlaced {
///     order_id: String,
///     total_cents: i64,
/// }
///
/// let envelope = EventEnvelope::new(
///     "orders".to_string(),
///     "order".to_string(),
///     "ord_123".to_string(),
///     OrderPlaced {
///         order_id: "ord_123".to_string(),
///         total_cents: 1000,
///     },
/// )
/// .with_correlation_id(Some("correlation-456".to_string()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    /// Unique event identifier (idempotency key)
    pub event_id: Uuid,

    /// ISO 8601 timestamp of the originating business fact
    pub occurred_at: DateTime<Utc>,

    /// Module that generated the event (e.g., "orders")
    pub source_module: String,

    /// Semantic version of the source module
    pub source_version: String,

    /// Aggregate type that raised the domain event
    pub aggregate_type: String,

    /// Aggregate instance that raised the domain event
    pub aggregate_id: String,

    /// Links related events in a business transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Links this event to the command/event that caused it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// Event-specific payload
    pub payload: T,
}

impl<T> EventEnvelope<T> {
    /// Create a new event envelope with a fresh event_id and `occurred_at = now`
    pub fn new(
        source_module: String,
        aggregate_type: String,
        aggregate_id: String,
        payload: T,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            source_module,
            source_version: "1.0.0".to_string(), // Default, should be overridden by caller
            aggregate_type,
            aggregate_id,
            correlation_id: None,
            causation_id: None,
            payload,
        }
    }

    /// Set the timestamp of the originating business fact
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Set the source version
    pub fn with_source_version(mut self, version: String) -> Self {
        self.source_version = version;
        self
    }

    /// Set the correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Set the causation ID
    pub fn with_causation_id(mut self, causation_id: Option<String>) -> Self {
        self.causation_id = causation_id;
        self
    }
}

/// Validate a serialized event envelope (generic payload)
///
/// # Validation Rules
///
/// - `event_id`: Must be a valid UUID
/// - `occurred_at`: Must be present
/// - `source_module`, `source_version`, `aggregate_type`, `aggregate_id`:
///   Must be non-empty strings
/// - `payload`: Must be present
///
/// # Errors
///
/// Returns a descriptive error string if validation fails
pub fn validate_envelope_fields(envelope: &serde_json::Value) -> Result<(), String> {
    envelope
        .get("event_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or("Missing or invalid event_id")?;

    envelope
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid occurred_at")?;

    for field in ["source_module", "source_version", "aggregate_type", "aggregate_id"] {
        let value = envelope
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| format!("Missing or invalid {field}"))?;

        if value.is_empty() {
            return Err(format!("{field} cannot be empty"));
        }
    }

    if envelope.get("payload").is_none() {
        return Err("Missing payload".to_string());
    }

    // correlation_id and causation_id are optional
    Ok(())
}
