use crate::error::OutboxResult;
use async_trait::async_trait;

/// A storage backend that can group writes into one atomic session
///
/// Dropping a session without committing discards every write made through
/// it.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    type Session: Send;

    async fn begin(&self) -> OutboxResult<Self::Session>;

    async fn commit(&self, session: Self::Session) -> OutboxResult<()>;
}
