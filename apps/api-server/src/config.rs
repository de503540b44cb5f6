//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use ratewise_core::{ConfigError, Quota};
#[cfg(feature = "redis")]
use ratewise_infra::RedisConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitSettings,
    /// `None` when `REDIS_URL` is unset: local counting only.
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
}

/// Rate limiting settings.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub quota: Quota,
    /// Key clients by the first `X-Forwarded-For` entry instead of the peer
    /// address. Only enable behind a proxy that sets the header.
    pub trust_forwarded: bool,
    /// How often expired local counters are swept.
    pub sweep_interval: Duration,
}

impl RateLimitSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let limit = parse_var(&var, "RATE_LIMIT_REQUESTS", 100)?;
        let window_seconds = parse_var(&var, "RATE_LIMIT_WINDOW_SECONDS", 60)?;
        let sweep_secs: u64 = parse_var(&var, "RATE_LIMIT_SWEEP_INTERVAL_SECS", 60)?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "RATE_LIMIT_SWEEP_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            quota: Quota::new(limit, window_seconds)?,
            trust_forwarded: parse_flag(&var, "RATE_LIMIT_TRUST_FORWARDED", false)?,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables take their defaults. A variable that is set but does
    /// not parse, or an out-of-range limit or window, fails startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| env::var(name).ok();
        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&var, "PORT", 8080)?,
            rate_limit: RateLimitSettings::from_env()?,
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
        })
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    let Some(raw) = var(name) else {
        return Ok(default);
    };
    match raw.trim().parse() {
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigError::InvalidValue {
            var: name.to_string(),
            value: raw,
        }),
    }
}

fn parse_flag(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = var(name) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: name.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn invalid(var: &str, value: &str) -> ConfigError {
        ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_unset_variables_use_defaults() {
        let settings = RateLimitSettings::from_lookup(vars(&[])).unwrap();

        assert_eq!(settings.quota.limit(), 100);
        assert_eq!(settings.quota.window().window_seconds(), 60);
        assert!(!settings.trust_forwarded);
        assert_eq!(settings.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_set_variables_override_defaults() {
        let settings = RateLimitSettings::from_lookup(vars(&[
            ("RATE_LIMIT_REQUESTS", "5"),
            ("RATE_LIMIT_WINDOW_SECONDS", " 30 "),
            ("RATE_LIMIT_TRUST_FORWARDED", "TRUE"),
            ("RATE_LIMIT_SWEEP_INTERVAL_SECS", "10"),
        ]))
        .unwrap();

        assert_eq!(settings.quota.limit(), 5);
        assert_eq!(settings.quota.window().window_seconds(), 30);
        assert!(settings.trust_forwarded);
        assert_eq!(settings.sweep_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_negative_window_fails() {
        let err = RateLimitSettings::from_lookup(vars(&[("RATE_LIMIT_WINDOW_SECONDS", "-5")]))
            .unwrap_err();
        assert_eq!(err, invalid("RATE_LIMIT_WINDOW_SECONDS", "-5"));
    }

    #[test]
    fn test_unparseable_limit_fails() {
        let err =
            RateLimitSettings::from_lookup(vars(&[("RATE_LIMIT_REQUESTS", "abc")])).unwrap_err();
        assert_eq!(err, invalid("RATE_LIMIT_REQUESTS", "abc"));
    }

    #[test]
    fn test_zero_limit_and_window_fail() {
        let err =
            RateLimitSettings::from_lookup(vars(&[("RATE_LIMIT_WINDOW_SECONDS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidWindow(0));

        let err = RateLimitSettings::from_lookup(vars(&[("RATE_LIMIT_REQUESTS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidLimit(0));
    }

    #[test]
    fn test_zero_sweep_interval_fails() {
        let err = RateLimitSettings::from_lookup(vars(&[("RATE_LIMIT_SWEEP_INTERVAL_SECS", "0")]))
            .unwrap_err();
        assert_eq!(err, invalid("RATE_LIMIT_SWEEP_INTERVAL_SECS", "0"));
    }

    #[test]
    fn test_malformed_flag_fails() {
        let err = RateLimitSettings::from_lookup(vars(&[("RATE_LIMIT_TRUST_FORWARDED", "yes")]))
            .unwrap_err();
        assert_eq!(err, invalid("RATE_LIMIT_TRUST_FORWARDED", "yes"));
    }
}
