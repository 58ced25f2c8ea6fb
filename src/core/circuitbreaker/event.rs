use super::State;
use crate::base::EventBus;
use crate::utils;
use std::fmt;
use std::time::Duration;

/// Something a circuit breaker did or observed, stamped with the breaker
/// name and the wall-clock time of emission.
#[derive(Debug, Clone)]
pub struct BreakerEvent {
    pub breaker_name: String,
    pub timestamp_ms: u64,
    pub kind: BreakerEventKind,
}

#[derive(Debug, Clone)]
pub enum BreakerEventKind {
    StateTransition { from: State, to: State },
    Success { elapsed: Duration },
    Error { elapsed: Duration, cause: String },
    IgnoredError { cause: String },
    Reset,
}

impl BreakerEvent {
    pub(crate) fn now(breaker_name: &str, kind: BreakerEventKind) -> Self {
        BreakerEvent {
            breaker_name: breaker_name.into(),
            timestamp_ms: utils::curr_time_millis(),
            kind,
        }
    }
}

impl fmt::Display for BreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = utils::format_time_millis(self.timestamp_ms);
        match &self.kind {
            BreakerEventKind::StateTransition { from, to } => {
                write!(
                    f,
                    "{}|{}|state changed from {:?} to {:?}",
                    at, self.breaker_name, from, to
                )
            }
            BreakerEventKind::Success { elapsed } => {
                write!(f, "{}|{}|success after {:?}", at, self.breaker_name, elapsed)
            }
            BreakerEventKind::Error { elapsed, cause } => {
                write!(
                    f,
                    "{}|{}|error '{}' after {:?}",
                    at, self.breaker_name, cause, elapsed
                )
            }
            BreakerEventKind::IgnoredError { cause } => {
                write!(f, "{}|{}|ignored error '{}'", at, self.breaker_name, cause)
            }
            BreakerEventKind::Reset => write!(f, "{}|{}|reset", at, self.breaker_name),
        }
    }
}

pub type BreakerEventBus = EventBus<BreakerEvent>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_names_the_breaker() {
        let event = BreakerEvent::now(
            "backend",
            BreakerEventKind::StateTransition {
                from: State::Closed,
                to: State::Open,
            },
        );
        let line = event.to_string();
        assert!(line.contains("backend"));
        assert!(line.contains("state changed from Closed to Open"));
    }
}
