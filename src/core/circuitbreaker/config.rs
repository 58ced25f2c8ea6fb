use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Classifies a reported error: `true` means the error counts towards the
/// failure rate, `false` means it is ignored (emitted as `IgnoredError`,
/// metrics untouched).
pub type FailurePredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

fn record_every_failure() -> FailurePredicate {
    Arc::new(|_| true)
}

/// Circuit breaker configuration.
///
/// The failure predicate is not serializable; a deserialized configuration
/// falls back to recording every error. All scalar fields round-trip.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failure-rate threshold in percent, in (0, 100]. Reaching it with a
    /// full window opens the circuit.
    pub failure_rate_threshold: f64,
    /// How long the breaker stays open before a probe is allowed.
    pub wait_duration_in_open_state: Duration,
    /// Window size while closed.
    pub ring_buffer_size_in_closed_state: usize,
    /// Window size and probe budget while half-open.
    pub ring_buffer_size_in_half_open_state: usize,
    #[serde(skip, default = "record_every_failure")]
    pub record_failure: FailurePredicate,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_rate_threshold: 50.0,
            wait_duration_in_open_state: Duration::from_secs(60),
            ring_buffer_size_in_closed_state: 100,
            ring_buffer_size_in_half_open_state: 10,
            record_failure: record_every_failure(),
        }
    }
}

impl BreakerConfig {
    pub fn is_valid(&self) -> Result<()> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return Err(Error::msg(
                "invalid failure_rate_threshold (valid range: (0, 100])",
            ));
        }
        if self.wait_duration_in_open_state < Duration::from_millis(1) {
            return Err(Error::msg("wait_duration_in_open_state must be >= 1 ms"));
        }
        if self.ring_buffer_size_in_closed_state < 1 {
            return Err(Error::msg("ring_buffer_size_in_closed_state must be >= 1"));
        }
        if self.ring_buffer_size_in_half_open_state < 1 {
            return Err(Error::msg(
                "ring_buffer_size_in_half_open_state must be >= 1",
            ));
        }
        Ok(())
    }

    /// Replaces the failure predicate.
    pub fn with_record_failure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.record_failure = Arc::new(predicate);
        self
    }
}

impl fmt::Debug for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field(
                "wait_duration_in_open_state",
                &self.wait_duration_in_open_state,
            )
            .field(
                "ring_buffer_size_in_closed_state",
                &self.ring_buffer_size_in_closed_state,
            )
            .field(
                "ring_buffer_size_in_half_open_state",
                &self.ring_buffer_size_in_half_open_state,
            )
            .finish()
    }
}

impl PartialEq for BreakerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.failure_rate_threshold == other.failure_rate_threshold
            && self.wait_duration_in_open_state == other.wait_duration_in_open_state
            && self.ring_buffer_size_in_closed_state == other.ring_buffer_size_in_closed_state
            && self.ring_buffer_size_in_half_open_state
                == other.ring_buffer_size_in_half_open_state
    }
}

impl fmt::Display for BreakerConfig {
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
        let config = BreakerConfig::default();
        assert_eq!(config.failure_rate_threshold, 50.0);
        assert_eq!(config.wait_duration_in_open_state, Duration::from_secs(60));
        assert_eq!(config.ring_buffer_size_in_closed_state, 100);
        assert_eq!(config.ring_buffer_size_in_half_open_state, 10);
        assert!((config.record_failure)(&Error::msg("anything")));
        assert!(config.is_valid().is_ok());
    }

    #[test]
    fn round_trip() {
        let config = BreakerConfig {
            failure_rate_threshold: 25.0,
            wait_duration_in_open_state: Duration::from_millis(1500),
            ring_buffer_size_in_closed_state: 8,
            ring_buffer_size_in_half_open_state: 2,
            ..Default::default()
        };
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: BreakerConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(config, decoded);
        // the predicate does not survive the wire; the default takes over
        assert!((decoded.record_failure)(&Error::msg("boom")));
    }

    #[test]
    #[should_panic(expected = "invalid failure_rate_threshold")]
    fn threshold_zero_rejected() {
        let config = BreakerConfig {
            failure_rate_threshold: 0.0,
            ..Default::default()
        };
        config.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "invalid failure_rate_threshold")]
    fn threshold_above_hundred_rejected() {
        let config = BreakerConfig {
            failure_rate_threshold: 100.5,
            ..Default::default()
        };
        config.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "wait_duration_in_open_state must be >= 1 ms")]
    fn sub_millisecond_wait_rejected() {
        let config = BreakerConfig {
            wait_duration_in_open_state: Duration::from_micros(999),
            ..Default::default()
        };
        config.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "ring_buffer_size_in_closed_state must be >= 1")]
    fn empty_closed_window_rejected() {
        let config = BreakerConfig {
            ring_buffer_size_in_closed_state: 0,
            ..Default::default()
        };
        config.is_valid().unwrap();
    }

    #[test]
    fn predicate_classifies() {
        let config = BreakerConfig::default()
            .with_record_failure(|err| !err.to_string().contains("ignorable"));
        assert!((config.record_failure)(&Error::msg("fatal")));
        assert!(!(config.record_failure)(&Error::msg("ignorable glitch")));
    }
}
