use uuid::Uuid;

/// Errors raised anywhere in the outbox pipeline
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event bus error: {0}")]
    Bus(#[from] event_bus::BusError),

    #[error("handler for {event_type} failed: {message}")]
    Handler { event_type: String, message: String },

    #[error("failed to convert {event_type} into an integration event: {message}")]
    Conversion { event_type: String, message: String },

    /// Failure reported by a non-SQL store backend
    #[error("store error: {0}")]
    Store(String),

    #[error("outbox message {0} not found")]
    NotFound(Uuid),
}

impl OutboxError {
    pub fn handler(event_type: &str, message: impl Into<String>) -> Self {
        OutboxError::Handler {
            event_type: event_type.to_string(),
            message: message.into(),
        }
    }

    pub fn conversion(event_type: &str, message: impl Into<String>) -> Self {
        OutboxError::Conversion {
            event_type: event_type.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for outbox operations
pub type OutboxResult<T> = Result<T, OutboxError>;
