use crate::base::EventBus;
use crate::utils;
use std::fmt;

/// A permit decision, stamped with the limiter name and the wall-clock
/// time of emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterEvent {
    pub limiter_name: String,
    pub timestamp_ms: u64,
    pub kind: LimiterEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterEventKind {
    Permitted,
    Rejected,
}

impl LimiterEvent {
    pub(crate) fn now(limiter_name: &str, kind: LimiterEventKind) -> Self {
        LimiterEvent {
            limiter_name: limiter_name.into(),
            timestamp_ms: utils::curr_time_millis(),
            kind,
        }
    }
}

impl fmt::Display for LimiterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.kind {
            LimiterEventKind::Permitted => "permitted",
            LimiterEventKind::Rejected => "rejected",
        };
        write!(
            f,
            "{}|{}|call {}",
            utils::format_time_millis(self.timestamp_ms),
            self.limiter_name,
            verdict
        )
    }
}

pub type LimiterEventBus = EventBus<LimiterEvent>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_names_the_limiter() {
        let event = LimiterEvent::now("ingress", LimiterEventKind::Rejected);
        let line = event.to_string();
        assert!(line.contains("ingress"));
        assert!(line.contains("call rejected"));
    }
}
