//! Lazily established broker connection shared by concurrent publishers
//!
//! [`ConnectionManager`] owns at most one live channel. Publishers take the
//! fast path (read lock, open check) when the channel is healthy; only when it
//! is missing or closed do they serialize on the reconnect mutex, re-check,
//! discard the stale channel, connect, and re-declare the exchange. A failed
//! publish also retires its channel, so the next attempt starts over.

use crate::{BusResult, EventBus, MessageProperties};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Opens new broker channels
#[async_trait]
pub trait BrokerConnector: Send + Sync + 'static {
    type Channel: BrokerChannel;

    /// Name of the exchange the channels publish to (for logs)
    fn exchange(&self) -> &str;

    /// Open a new connection and a channel on it
    async fn connect(&self) -> BusResult<Self::Channel>;
}

/// A connection/channel pair as seen by the manager
#[async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    /// Both the connection and the channel are usable
    fn is_open(&self) -> bool;

    /// Declare the target exchange as durable and non-auto-deleting.
    /// Must be idempotent.
    async fn declare_exchange(&self) -> BusResult<()>;

    /// Publish one message to the configured routing key
    async fn publish(&self, properties: &MessageProperties, payload: &[u8]) -> BusResult<()>;
}

/// Connection manager exposing only `ensure_connected` and `publish`
pub struct ConnectionManager<C: BrokerConnector> {
    connector: C,
    channel: RwLock<Option<Arc<C::Channel>>>,
    reconnect: Mutex<()>,
}

impl<C: BrokerConnector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            channel: RwLock::new(None),
            reconnect: Mutex::new(()),
        }
    }

    async fn open_channel(&self) -> Option<Arc<C::Channel>> {
        self.channel
            .read()
            .await
            .as_ref()
            .filter(|channel| channel.is_open())
            .cloned()
    }

    /// Return the live channel, establishing a new one if needed
    pub async fn ensure_connected(&self) -> BusResult<Arc<C::Channel>> {
        if let Some(channel) = self.open_channel().await {
            return Ok(channel);
        }

        let _guard = self.reconnect.lock().await;

        // Another publisher may have reconnected while we waited
        if let Some(channel) = self.open_channel().await {
            return Ok(channel);
        }

        if self.channel.write().await.take().is_some() {
            tracing::debug!(
                exchange = %self.connector.exchange(),
                "Discarding stale broker channel"
            );
        }

        let channel = Arc::new(self.connector.connect().await?);
        channel.declare_exchange().await?;

        *self.channel.write().await = Some(Arc::clone(&channel));

        tracing::info!(
            exchange = %self.connector.exchange(),
            "Broker channel established"
        );

        Ok(channel)
    }

    /// Publish with durable delivery and the event type as the `type` property
    pub async fn publish(&self, event_type: &str, payload: &[u8]) -> BusResult<()> {
        let channel = self.ensure_connected().await.map_err(|e| {
            tracing::error!(
                exchange = %self.connector.exchange(),
                event_type = %event_type,
                error = %e,
                "Failed to connect to broker"
            );
            e
        })?;

        let properties = MessageProperties::for_event(event_type);
        if let Err(e) = channel.publish(&properties, payload).await {
            tracing::error!(
                exchange = %self.connector.exchange(),
                event_type = %event_type,
                error = %e,
                "Failed to publish message"
            );
            self.discard(&channel).await;
            return Err(e);
        }

        Ok(())
    }

    /// Drop `channel` from the cache unless another publisher already replaced it
    async fn discard(&self, channel: &Arc<C::Channel>) {
        let mut cached = self.channel.write().await;
        if cached
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, channel))
        {
            *cached = None;
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[async_trait]
impl<C: BrokerConnector> EventBus for ConnectionManager<C> {
    async fn publish(&self, event_type: &str, payload: &[u8]) -> BusResult<()> {
        ConnectionManager::publish(self, event_type, payload).await
    }
}
