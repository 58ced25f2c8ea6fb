//!  Circuit Breaker State Machine:
//!
//! ```text
//!                          failure rate >= threshold (full window)
//!
//!             +-----------------------------------------------------------------------+
//!             |                                                                       |
//!             |                                                                       v
//!     +----------------+                   +----------------+    wait elapsed  +----------------+
//!     |                |                   |                |<-----------------|                |
//!     |                |  probes succeed   |                |                  |                |
//!     |     Closed     |<------------------|    HalfOpen    |                  |      Open      |
//!     |                |                   |                |   probes fail    |                |
//!     |                |                   |                +----------------->|                |
//!     +----------------+                   +----------------+                  +----------------+
//! ```
//!
//! `Disabled` (admit everything, record nothing) and `ForcedOpen` (reject
//! everything) sit outside the loop; only administrative calls move a
//! breaker in or out of them.

pub mod config;
pub mod event;
pub mod machine;
pub mod registry;
pub mod stat;

pub use config::*;
pub use event::*;
pub use machine::*;
pub use registry::*;
pub use stat::*;

use crate::base::EventSubscriber;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// States of the circuit breaker state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
    Disabled,
    ForcedOpen,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A named circuit breaker: the admission/report contract over the state
/// machine, its metrics window and its event bus. Pure composition, no
/// logic of its own.
#[derive(Debug)]
pub struct CircuitBreaker {
    machine: BreakerStateMachine,
}

impl CircuitBreaker {
    /// Validates `config` and builds a breaker starting in `Closed`.
    pub fn new<S: Into<String>>(name: S, config: BreakerConfig) -> Result<Self> {
        Ok(CircuitBreaker {
            machine: BreakerStateMachine::new(name, config)?,
        })
    }

    pub fn name(&self) -> &str {
        self.machine.name()
    }

    pub fn config(&self) -> &BreakerConfig {
        self.machine.config()
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn metrics(&self) -> Arc<BreakerMetrics> {
        self.machine.metrics()
    }

    pub fn is_call_permitted(&self) -> bool {
        self.machine.is_call_permitted()
    }

    pub fn on_success(&self, elapsed: Duration) {
        self.machine.on_success(elapsed)
    }

    pub fn on_error(&self, elapsed: Duration, err: &Error) {
        self.machine.on_error(elapsed, err)
    }

    pub fn transition_to_disabled(&self) {
        self.machine.transition_to_disabled()
    }

    pub fn transition_to_forced_open(&self) {
        self.machine.transition_to_forced_open()
    }

    pub fn reset(&self) {
        self.machine.reset()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber<BreakerEvent>>) {
        self.machine.event_bus().subscribe(subscriber)
    }

    pub fn unsubscribe(&self, subscriber: &Arc<dyn EventSubscriber<BreakerEvent>>) -> bool {
        self.machine.event_bus().unsubscribe(subscriber)
    }

    pub fn event_bus(&self) -> &BreakerEventBus {
        self.machine.event_bus()
    }
}
