use super::config::BreakerConfig;
use super::event::{BreakerEvent, BreakerEventBus, BreakerEventKind};
use super::stat::BreakerMetrics;
use super::State;
use crate::Error;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Each state carries exactly the data it needs; the buffer is replaced on
/// every state entry, so late reporters from a previous state record into a
/// buffer the machine no longer consults for transitions.
enum InnerState {
    Closed {
        metrics: Arc<BreakerMetrics>,
    },
    Open {
        opened_at: Instant,
        metrics: Arc<BreakerMetrics>,
    },
    HalfOpen {
        // acquire-only probe budget; drained admissions are never returned,
        // the half-open window fills exactly when all probes have reported
        probe_permits: AtomicI64,
        metrics: Arc<BreakerMetrics>,
    },
    Disabled,
    ForcedOpen,
}

impl InnerState {
    fn state(&self) -> State {
        match self {
            InnerState::Closed { .. } => State::Closed,
            InnerState::Open { .. } => State::Open,
            InnerState::HalfOpen { .. } => State::HalfOpen,
            InnerState::Disabled => State::Disabled,
            InnerState::ForcedOpen => State::ForcedOpen,
        }
    }

    fn metrics(&self) -> Option<&Arc<BreakerMetrics>> {
        match self {
            InnerState::Closed { metrics }
            | InnerState::Open { metrics, .. }
            | InnerState::HalfOpen { metrics, .. } => Some(metrics),
            InnerState::Disabled | InnerState::ForcedOpen => None,
        }
    }
}

/// The circuit breaker state machine.
///
/// Admission checks, outcome recording and administrative transitions all
/// take one short mutex on the state; events are assembled under the lock
/// and dispatched after it is released.
pub struct BreakerStateMachine {
    name: String,
    config: BreakerConfig,
    state: Mutex<InnerState>,
    event_bus: BreakerEventBus,
}

impl BreakerStateMachine {
    pub fn new<S: Into<String>>(name: S, config: BreakerConfig) -> crate::Result<Self> {
        config.is_valid()?;
        let metrics = Arc::new(BreakerMetrics::new(config.ring_buffer_size_in_closed_state));
        Ok(BreakerStateMachine {
            name: name.into(),
            config,
            state: Mutex::new(InnerState::Closed { metrics }),
            event_bus: BreakerEventBus::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &BreakerEventBus {
        &self.event_bus
    }

    pub fn state(&self) -> State {
        self.state.lock().unwrap().state()
    }

    /// The buffer outcomes are currently recorded into. Empty placeholder
    /// metrics are reported while disabled or forced open.
    pub fn metrics(&self) -> Arc<BreakerMetrics> {
        let state = self.state.lock().unwrap();
        match state.metrics() {
            Some(metrics) => Arc::clone(metrics),
            None => Arc::new(BreakerMetrics::new(
                self.config.ring_buffer_size_in_closed_state,
            )),
        }
    }

    /// Admission check.
    ///
    /// In `Open`, the first caller past the wait duration drives the lazy
    /// transition to `HalfOpen` and is admitted as its first probe; losers
    /// of that race observe the new state. In `HalfOpen`, callers beyond
    /// the probe budget are rejected without being counted as failures.
    pub fn is_call_permitted(&self) -> bool {
        let mut transition = None;
        let permitted = {
            let mut state = self.state.lock().unwrap();
            match &*state {
                InnerState::Closed { .. } | InnerState::Disabled => true,
                InnerState::ForcedOpen => false,
                InnerState::Open { opened_at, .. } => {
                    if opened_at.elapsed() >= self.config.wait_duration_in_open_state {
                        let (next, event) = self.half_open_state(State::Open);
                        *state = next;
                        if let InnerState::HalfOpen { probe_permits, .. } = &*state {
                            probe_permits.fetch_sub(1, Ordering::SeqCst);
                        }
                        transition = Some(event);
                        true
                    } else {
                        false
                    }
                }
                InnerState::HalfOpen { probe_permits, .. } => probe_permits
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |p| {
                        if p > 0 {
                            Some(p - 1)
                        } else {
                            None
                        }
                    })
                    .is_ok(),
            }
        };
        if let Some(event) = transition {
            self.event_bus.publish(&event);
        }
        permitted
    }

    /// Records a successful call.
    pub fn on_success(&self, elapsed: Duration) {
        let Some(metrics) = self.record_target() else {
            return;
        };
        let rate = metrics.on_success();
        self.event_bus.publish(&BreakerEvent::now(
            &self.name,
            BreakerEventKind::Success { elapsed },
        ));
        self.evaluate_rate(rate, &metrics);
    }

    /// Records a failed call. The configured predicate classifies `err`; an
    /// ignored error leaves metrics and state untouched.
    pub fn on_error(&self, elapsed: Duration, err: &Error) {
        if !(self.config.record_failure)(err) {
            self.event_bus.publish(&BreakerEvent::now(
                &self.name,
                BreakerEventKind::IgnoredError {
                    cause: err.to_string(),
                },
            ));
            return;
        }
        let Some(metrics) = self.record_target() else {
            return;
        };
        let rate = metrics.on_error();
        self.event_bus.publish(&BreakerEvent::now(
            &self.name,
            BreakerEventKind::Error {
                elapsed,
                cause: err.to_string(),
            },
        ));
        self.evaluate_rate(rate, &metrics);
    }

    pub fn transition_to_disabled(&self) {
        self.administrative_transition(State::Disabled);
    }

    pub fn transition_to_forced_open(&self) {
        self.administrative_transition(State::ForcedOpen);
    }

    /// Returns to `Closed` with fresh metrics from any state.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock().unwrap();
            let metrics = Arc::new(BreakerMetrics::new(
                self.config.ring_buffer_size_in_closed_state,
            ));
            *state = InnerState::Closed { metrics };
        }
        self.event_bus
            .publish(&BreakerEvent::now(&self.name, BreakerEventKind::Reset));
    }

    /// Outcomes are attributed to the buffer owned by the state current at
    /// report time; disabled and forced-open states record nothing.
    fn record_target(&self) -> Option<Arc<BreakerMetrics>> {
        self.state.lock().unwrap().metrics().map(Arc::clone)
    }

    /// Evaluates a post-write failure rate against the threshold. The
    /// transition fires only if the current state still owns the buffer the
    /// outcome was recorded into.
    fn evaluate_rate(&self, rate: f64, recorded_in: &Arc<BreakerMetrics>) {
        if rate < 0.0 {
            return;
        }
        let mut transition = None;
        {
            let mut state = self.state.lock().unwrap();
            match &*state {
                InnerState::Closed { metrics } if Arc::ptr_eq(metrics, recorded_in) => {
                    if rate >= self.config.failure_rate_threshold {
                        let (next, event) = self.open_state(State::Closed);
                        *state = next;
                        transition = Some(event);
                    }
                }
                InnerState::HalfOpen { metrics, .. } if Arc::ptr_eq(metrics, recorded_in) => {
                    let (next, event) = if rate >= self.config.failure_rate_threshold {
                        self.open_state(State::HalfOpen)
                    } else {
                        self.closed_state(State::HalfOpen)
                    };
                    *state = next;
                    transition = Some(event);
                }
                _ => {}
            }
        }
        if let Some(event) = transition {
            self.event_bus.publish(&event);
        }
    }

    fn administrative_transition(&self, to: State) {
        let mut transition = None;
        {
            let mut state = self.state.lock().unwrap();
            let from = state.state();
            if from == to {
                return;
            }
            *state = match to {
                State::Disabled => InnerState::Disabled,
                State::ForcedOpen => InnerState::ForcedOpen,
                _ => unreachable!("administrative transitions only target Disabled/ForcedOpen"),
            };
            transition = Some(BreakerEvent::now(
                &self.name,
                BreakerEventKind::StateTransition { from, to },
            ));
        }
        if let Some(event) = transition {
            self.event_bus.publish(&event);
        }
    }

    fn open_state(&self, from: State) -> (InnerState, BreakerEvent) {
        let next = InnerState::Open {
            opened_at: Instant::now(),
            metrics: Arc::new(BreakerMetrics::new(
                self.config.ring_buffer_size_in_half_open_state,
            )),
        };
        let event = BreakerEvent::now(
            &self.name,
            BreakerEventKind::StateTransition {
                from,
                to: State::Open,
            },
        );
        (next, event)
    }

    fn half_open_state(&self, from: State) -> (InnerState, BreakerEvent) {
        let size = self.config.ring_buffer_size_in_half_open_state;
        let next = InnerState::HalfOpen {
            probe_permits: AtomicI64::new(size as i64),
            metrics: Arc::new(BreakerMetrics::new(size)),
        };
        let event = BreakerEvent::now(
            &self.name,
            BreakerEventKind::StateTransition {
                from,
                to: State::HalfOpen,
            },
        );
        (next, event)
    }

    fn closed_state(&self, from: State) -> (InnerState, BreakerEvent) {
        let next = InnerState::Closed {
            metrics: Arc::new(BreakerMetrics::new(
                self.config.ring_buffer_size_in_closed_state,
            )),
        };
        let event = BreakerEvent::now(
            &self.name,
            BreakerEventKind::StateTransition {
                from,
                to: State::Closed,
            },
        );
        (next, event)
    }
}

impl std::fmt::Debug for BreakerStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerStateMachine")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}
