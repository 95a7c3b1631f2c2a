use outbox::OutboxError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("corrupt order record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Outbox(#[from] OutboxError),
}
