use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

pub const CLIENT_ID_VAR: &str = "DISCORD_CLIENT_ID";

/// Runtime settings, read from the process environment
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Presence service application id
    pub client_id: String,
    /// Exact process name of the media application, also the scripted app name
    pub process_name: String,
    /// Storefront country used by the artwork search
    pub storefront: String,
    /// Pixel size substituted into the artwork template
    pub artwork_size: u32,
    pub small_image_key: String,
    pub poll_interval: Duration,
    /// Wait between checks while the application is not running
    pub idle_interval: Duration,
    pub command_timeout: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Build from `std::env`. Call `dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = lookup(CLIENT_ID_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", CLIENT_ID_VAR)))?;

        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            client_id,
            process_name: text("AMP_PROCESS_NAME", "Music"),
            storefront: text("AMP_STOREFRONT", "US"),
            artwork_size: parse_var(&lookup, "AMP_ARTWORK_SIZE", 128)?,
            small_image_key: text("AMP_SMALL_IMAGE_KEY", "image_small"),
            poll_interval: millis(&lookup, "AMP_POLL_INTERVAL_MS", 1000)?,
            idle_interval: millis(&lookup, "AMP_IDLE_INTERVAL_MS", 5000)?,
            command_timeout: millis(&lookup, "AMP_COMMAND_TIMEOUT_MS", 5000)?,
            http_timeout: millis(&lookup, "AMP_HTTP_TIMEOUT_MS", 5000)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value '{}'", key, raw.trim()))),
        _ => Ok(default),
    }
}

fn millis<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_var(lookup, key, default).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DISCORD_CLIENT_ID", " 1234567890 ")]).unwrap();

        assert_eq!(config.client_id, "1234567890");
        assert_eq!(config.process_name, "Music");
        assert_eq!(config.storefront, "US");
        assert_eq!(config.artwork_size, 128);
        assert_eq!(config.small_image_key, "image_small");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.idle_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_client_id() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(config_from(&[("DISCORD_CLIENT_ID", "   ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DISCORD_CLIENT_ID", "1"),
            ("AMP_PROCESS_NAME", "iTunes"),
            ("AMP_ARTWORK_SIZE", "512"),
            ("AMP_POLL_INTERVAL_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.process_name, "iTunes");
        assert_eq!(config.artwork_size, 512);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("DISCORD_CLIENT_ID", "1"), ("AMP_IDLE_INTERVAL_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("AMP_IDLE_INTERVAL_MS"));
    }
}
