use std::env;

/// Broker connection settings parsed from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `/` means no namespace; anything else prefixes every subject
    pub virtual_host: String,
    pub exchange: String,
    pub routing_key: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4222,
            username: None,
            password: None,
            virtual_host: "/".to_string(),
            exchange: "integration_events".to_string(),
            routing_key: "integration".to_string(),
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let host = env::var("BROKER_HOST").unwrap_or(defaults.host);

        let port: u16 = match env::var("BROKER_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| "BROKER_PORT must be a valid u16".to_string())?,
            Err(_) => defaults.port,
        };

        let config = Self {
            host,
            port,
            username: env::var("BROKER_USERNAME").ok(),
            password: env::var("BROKER_PASSWORD").ok(),
            virtual_host: env::var("BROKER_VHOST").unwrap_or(defaults.virtual_host),
            exchange: env::var("BROKER_EXCHANGE").unwrap_or(defaults.exchange),
            routing_key: env::var("BROKER_ROUTING_KEY").unwrap_or(defaults.routing_key),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("BROKER_HOST cannot be empty".to_string());
        }
        if self.username.is_some() != self.password.is_some() {
            return Err("BROKER_USERNAME and BROKER_PASSWORD must be set together".to_string());
        }
        // JetStream stream names cannot contain subject tokens or whitespace
        if self.exchange.is_empty()
            || self
                .exchange
                .chars()
                .any(|c| matches!(c, '.' | '*' | '>') || c.is_whitespace())
        {
            return Err(format!("invalid exchange name: {:?}", self.exchange));
        }
        // Published to as a literal subject: no wildcards, no empty tokens
        if self.routing_key.split('.').any(|token| {
            token.is_empty()
                || token
                    .chars()
                    .any(|c| matches!(c, '*' | '>') || c.is_whitespace())
        }) {
            return Err(format!("invalid routing key: {:?}", self.routing_key));
        }
        Ok(())
    }

    /// Server address in NATS URL form
    pub fn server_url(&self) -> String {
        format!("nats://{}:{}", self.host, self.port)
    }

    fn subject_prefix(&self) -> String {
        match self.virtual_host.trim_matches('/') {
            "" => String::new(),
            vhost => format!("{}.", vhost.replace('/', ".")),
        }
    }

    /// Subject every integration event is published to
    pub fn publish_subject(&self) -> String {
        format!("{}{}.{}", self.subject_prefix(), self.exchange, self.routing_key)
    }

    /// Subject filter captured by the exchange's stream
    pub fn exchange_subjects(&self) -> String {
        format!("{}{}.>", self.subject_prefix(), self.exchange)
    }
}
