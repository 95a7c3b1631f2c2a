//! NATS JetStream backend for the connection manager
//!
//! The "exchange" is a file-backed JetStream stream capturing
//! `<exchange>.>`; every integration event goes to
//! `<exchange>.<routing_key>` and is acknowledged by the stream before the
//! publish counts as successful.

use crate::connection::{BrokerChannel, BrokerConnector, ConnectionManager};
use crate::{BrokerConfig, BusError, BusResult, MessageProperties};
use async_nats::connection::State;
use async_nats::jetstream::{self, stream};
use async_nats::{Client, ConnectOptions, HeaderMap};
use async_trait::async_trait;

/// Production publisher: a connection manager over NATS JetStream
pub type NatsPublisher = ConnectionManager<NatsConnector>;

impl NatsPublisher {
    /// Build a publisher that connects on first use
    ///
    /// # Example
    /// ```rust,no_run
    /// use event_bus::{BrokerConfig, NatsPublisher};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let publisher = NatsPublisher::nats(BrokerConfig::default());
    /// publisher.publish("orders.order_placed.v1", b"{}").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn nats(config: BrokerConfig) -> Self {
        ConnectionManager::new(NatsConnector::new(config))
    }
}

/// Opens NATS connections with the configured credentials
#[derive(Debug, Clone)]
pub struct NatsConnector {
    config: BrokerConfig,
}

impl NatsConnector {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

#[async_trait]
impl BrokerConnector for NatsConnector {
    type Channel = NatsChannel;

    fn exchange(&self) -> &str {
        &self.config.exchange
    }

    async fn connect(&self) -> BusResult<NatsChannel> {
        let options = match (&self.config.username, &self.config.password) {
            (Some(user), Some(password)) => {
                ConnectOptions::with_user_and_password(user.clone(), password.clone())
            }
            _ => ConnectOptions::new(),
        };

        let url = self.config.server_url();
        tracing::info!(url = %url, "Connecting to NATS");

        let client = options
            .name("outbox-publisher")
            .connect(url.as_str())
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;

        Ok(NatsChannel::new(client, self.config.clone()))
    }
}

/// A NATS client plus the JetStream context bound to it
#[derive(Clone)]
pub struct NatsChannel {
    client: Client,
    jetstream: jetstream::Context,
    config: BrokerConfig,
}

impl NatsChannel {
    pub fn new(client: Client, config: BrokerConfig) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self {
            client,
            jetstream,
            config,
        }
    }

    /// Get a reference to the underlying NATS client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl BrokerChannel for NatsChannel {
    fn is_open(&self) -> bool {
        matches!(self.client.connection_state(), State::Connected)
    }

    async fn declare_exchange(&self) -> BusResult<()> {
        let config = stream::Config {
            name: self.config.exchange.clone(),
            subjects: vec![self.config.exchange_subjects()],
            storage: stream::StorageType::File,
            retention: stream::RetentionPolicy::Limits,
            ..Default::default()
        };

        self.jetstream
            .get_or_create_stream(config)
            .await
            .map_err(|e| BusError::DeclareError {
                exchange: self.config.exchange.clone(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn publish(&self, properties: &MessageProperties, payload: &[u8]) -> BusResult<()> {
        let subject = self.config.publish_subject();

        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", properties.content_type.as_str());
        headers.insert("type", properties.event_type.as_str());

        if properties.persistent {
            let ack = self
                .jetstream
                .publish_with_headers(subject, headers, payload.to_vec().into())
                .await
                .map_err(|e| BusError::PublishError(e.to_string()))?;

            // Stored by the stream only once acknowledged
            ack.await
                .map_err(|e| BusError::PublishError(e.to_string()))?;
        } else {
            self.client
                .publish_with_headers(subject, headers, payload.to_vec().into())
                .await
                .map_err(|e| BusError::PublishError(e.to_string()))?;
        }

        Ok(())
    }
}
