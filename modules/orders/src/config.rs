use event_bus::BrokerConfig;
use outbox::OutboxProcessorConfig;
use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    InMemory,
    Nats,
}

impl FromStr for BusType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inmemory" => Ok(BusType::InMemory),
            "nats" => Ok(BusType::Nats),
            other => Err(format!(
                "Invalid BUS_TYPE: {other}. Must be 'inmemory' or 'nats'"
            )),
        }
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusType::InMemory => f.write_str("inmemory"),
            BusType::Nats => f.write_str("nats"),
        }
    }
}

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bus_type: BusType,
    pub broker: BrokerConfig,
    pub outbox: OutboxProcessorConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let bus_type = env::var("BUS_TYPE")
            .unwrap_or_else(|_| "inmemory".to_string())
            .parse()?;

        Ok(Config {
            database_url,
            bus_type,
            broker: BrokerConfig::from_env()?,
            outbox: OutboxProcessorConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_bus_type_parsing() {
        assert_eq!("NATS".parse::<BusType>().unwrap(), BusType::Nats);
        assert_eq!("inmemory".parse::<BusType>().unwrap(), BusType::InMemory);
        assert!("kafka".parse::<BusType>().is_err());
    }

    #[test]
    #[serial]
    fn test_database_url_is_required() {
        let saved = env::var("DATABASE_URL").ok();
        env::remove_var("DATABASE_URL");

        let err = Config::from_env().unwrap_err();

        if let Some(url) = saved {
            env::set_var("DATABASE_URL", url);
        }
        assert!(err.contains("DATABASE_URL"));
    }

    #[test]
    #[serial]
    fn test_defaults_with_database_url() {
        let saved = env::var("DATABASE_URL").ok();
        env::set_var("DATABASE_URL", "postgres://localhost/orders");
        env::remove_var("BUS_TYPE");

        let config = Config::from_env();

        match saved {
            Some(url) => env::set_var("DATABASE_URL", url),
            None => env::remove_var("DATABASE_URL"),
        }
        let config = config.unwrap();
        assert_eq!(config.bus_type, BusType::InMemory);
        assert_eq!(config.broker.exchange, "integration_events");
        assert_eq!(config.outbox.batch_size, 20);
    }
}
