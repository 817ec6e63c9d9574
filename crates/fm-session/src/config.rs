use fm_contract::ConfigError;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_FUNDERS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Receipt polling cadence while a transaction is in flight.
    pub poll_interval: Duration,
    /// `None` waits for confirmation indefinitely.
    pub confirmation_timeout: Option<Duration>,
    /// Upper bound on `getFunders` reads when listing funders.
    pub max_funders: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: None,
            max_funders: DEFAULT_MAX_FUNDERS,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("FUNDME_POLL_INTERVAL_MS") {
            let millis = parse_positive("FUNDME_POLL_INTERVAL_MS", &raw)?;
            config.poll_interval = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup("FUNDME_CONFIRMATION_TIMEOUT_SECS") {
            if !raw.trim().is_empty() {
                let secs = parse_positive("FUNDME_CONFIRMATION_TIMEOUT_SECS", &raw)?;
                config.confirmation_timeout = Some(Duration::from_secs(secs));
            }
        }
        if let Some(raw) = lookup("FUNDME_MAX_FUNDERS") {
            let max = parse_positive("FUNDME_MAX_FUNDERS", &raw)?;
            config.max_funders =
                u32::try_from(max).map_err(|_| ConfigError::invalid("FUNDME_MAX_FUNDERS", &raw, "too large"))?;
        }

        Ok(config)
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(var, raw, "must be greater than zero")),
        Ok(value) => Ok(value),
        Err(err) => Err(ConfigError::invalid(var, raw, err.to_string())),
    }
}
