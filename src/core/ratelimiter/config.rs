use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Permits restored at every cycle boundary.
    pub limit_for_period: u64,
    /// Cycle length. Permits refresh when a cycle starts.
    pub limit_refresh_period: Duration,
    /// Default bound on how long [`acquire_permission`] waits for a permit.
    ///
    /// [`acquire_permission`]: super::AtomicRateLimiter::acquire_permission
    pub timeout_duration: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        RateLimiterConfig {
            limit_for_period: 50,
            limit_refresh_period: Duration::from_nanos(500),
            timeout_duration: Duration::from_secs(5),
        }
    }
}

impl RateLimiterConfig {
    pub fn is_valid(&self) -> Result<()> {
        if self.limit_for_period < 1 {
            return Err(Error::msg("limit_for_period must be >= 1"));
        }
        if self.limit_refresh_period < Duration::from_nanos(1) {
            return Err(Error::msg("limit_refresh_period must be >= 1 ns"));
        }
        Ok(())
    }
}

impl fmt::Display for RateLimiterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn documented_defaults() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.limit_for_period, 50);
        assert_eq!(config.limit_refresh_period, Duration::from_nanos(500));
        assert_eq!(config.timeout_duration, Duration::from_secs(5));
        assert!(config.is_valid().is_ok());
    }

    #[test]
    fn round_trip() {
        let config = RateLimiterConfig {
            limit_for_period: 3,
            limit_refresh_period: Duration::from_millis(100),
            timeout_duration: Duration::ZERO,
        };
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: RateLimiterConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(config, decoded);
    }

    #[test]
    #[should_panic(expected = "limit_for_period must be >= 1")]
    fn zero_limit_rejected() {
        let config = RateLimiterConfig {
            limit_for_period: 0,
            ..Default::default()
        };
        config.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "limit_refresh_period must be >= 1 ns")]
    fn zero_refresh_period_rejected() {
        let config = RateLimiterConfig {
            limit_refresh_period: Duration::ZERO,
            ..Default::default()
        };
        config.is_valid().unwrap();
    }
}
