use std::env;
use std::time::Duration;

/// Polling and retry settings of the outbox processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxProcessorConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// Failed publish attempts after which a message stops being retried
    pub max_retries: i32,
    /// Delay before the first cycle, so the host can finish starting
    pub warmup_delay: Duration,
}

impl Default for OutboxProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            batch_size: 20,
            max_retries: 3,
            warmup_delay: Duration::from_secs(10),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{name} must be a valid number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl OutboxProcessorConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let config = Self {
            poll_interval: Duration::from_secs(parse_var(
                "OUTBOX_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )?),
            batch_size: parse_var("OUTBOX_BATCH_SIZE", defaults.batch_size)?,
            max_retries: parse_var("OUTBOX_MAX_RETRIES", defaults.max_retries)?,
            warmup_delay: Duration::from_secs(parse_var(
                "OUTBOX_WARMUP_DELAY_SECS",
                defaults.warmup_delay.as_secs(),
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size <= 0 {
            return Err("OUTBOX_BATCH_SIZE must be greater than 0".to_string());
        }
        if self.max_retries <= 0 {
            return Err("OUTBOX_MAX_RETRIES must be greater than 0".to_string());
        }
        if self.poll_interval.is_zero() {
            return Err("OUTBOX_POLL_INTERVAL_SECS must be greater than 0".to_string());
        }
        Ok(())
    }
}
