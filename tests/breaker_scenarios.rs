//! End-to-end circuit breaker scenarios driven through the public API.

use bulwark_core::api;
use bulwark_core::base::{CircuitBreakerOpenError, CircularEventConsumer, EventSubscriber};
use bulwark_core::circuitbreaker::{
    BreakerConfig, BreakerEvent, BreakerEventKind, CircuitBreaker, State,
};
use bulwark_core::utils;
use bulwark_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

fn tripping_config() -> BreakerConfig {
    BreakerConfig {
        failure_rate_threshold: 50.0,
        wait_duration_in_open_state: Duration::from_secs(1),
        ring_buffer_size_in_closed_state: 4,
        ring_buffer_size_in_half_open_state: 2,
        ..Default::default()
    }
}

fn fail(breaker: &CircuitBreaker) {
    let result = api::call_with_breaker(breaker, || -> Result<()> {
        Err(Error::msg("backend down"))
    });
    assert!(result.is_err());
}

fn succeed(breaker: &CircuitBreaker) {
    api::call_with_breaker(breaker, || Ok(())).unwrap();
}

#[test]
fn threshold_trip() {
    let breaker = CircuitBreaker::new("trip", tripping_config()).unwrap();

    fail(&breaker);
    succeed(&breaker);
    fail(&breaker);
    assert_eq!(breaker.state(), State::Closed);
    succeed(&breaker);

    // window full at exactly the threshold
    assert_eq!(breaker.state(), State::Open);
    let err = api::call_with_breaker(&breaker, || Ok(())).unwrap_err();
    assert!(err.downcast_ref::<CircuitBreakerOpenError>().is_some());
}

#[test]
fn half_open_recovery() {
    let breaker = CircuitBreaker::new("recovery", tripping_config()).unwrap();
    for _ in 0..4 {
        fail(&breaker);
    }
    assert_eq!(breaker.state(), State::Open);

    utils::sleep_for_ms(1050);
    assert!(breaker.is_call_permitted());
    assert_eq!(breaker.state(), State::HalfOpen);
    breaker.on_success(Duration::from_millis(5));
    assert!(breaker.is_call_permitted());
    breaker.on_success(Duration::from_millis(5));

    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.metrics().number_of_buffered_calls(), 0);
}

#[test]
fn half_open_relapse() {
    let breaker = CircuitBreaker::new("relapse", tripping_config()).unwrap();
    for _ in 0..4 {
        fail(&breaker);
    }

    utils::sleep_for_ms(1050);
    assert!(breaker.is_call_permitted());
    assert!(breaker.is_call_permitted());
    breaker.on_error(Duration::from_millis(5), &Error::msg("still down"));
    breaker.on_error(Duration::from_millis(5), &Error::msg("still down"));

    assert_eq!(breaker.state(), State::Open);
    // the open timer restarted with the relapse
    assert!(!breaker.is_call_permitted());
}

#[test]
fn ignored_errors_leave_the_breaker_alone() {
    let config = tripping_config()
        .with_record_failure(|err| !err.to_string().contains("transient"));
    let breaker = CircuitBreaker::new("lenient", config).unwrap();

    let consumer = Arc::new(CircularEventConsumer::<BreakerEvent>::new(32));
    breaker.subscribe(Arc::clone(&consumer) as Arc<dyn EventSubscriber<BreakerEvent>>);

    for _ in 0..10 {
        let result = api::call_with_breaker(&breaker, || -> Result<()> {
            Err(Error::msg("transient wobble"))
        });
        assert!(result.is_err());
    }

    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.metrics().number_of_buffered_calls(), 0);
    let ignored = consumer
        .snapshot()
        .iter()
        .filter(|e| matches!(e.kind, BreakerEventKind::IgnoredError { .. }))
        .count();
    assert_eq!(ignored, 10);
}

#[test]
fn transition_events_reach_subscribers_in_order() {
    let breaker = CircuitBreaker::new("observed", tripping_config()).unwrap();
    let consumer = Arc::new(CircularEventConsumer::<BreakerEvent>::new(64));
    breaker.subscribe(Arc::clone(&consumer) as Arc<dyn EventSubscriber<BreakerEvent>>);

    for _ in 0..4 {
        fail(&breaker);
    }
    utils::sleep_for_ms(1050);
    assert!(breaker.is_call_permitted());
    breaker.on_success(Duration::ZERO);
    assert!(breaker.is_call_permitted());
    breaker.on_success(Duration::ZERO);

    let transitions: Vec<(State, State)> = consumer
        .snapshot()
        .iter()
        .filter_map(|e| match e.kind {
            BreakerEventKind::StateTransition { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (State::Closed, State::Open),
            (State::Open, State::HalfOpen),
            (State::HalfOpen, State::Closed),
        ]
    );
}

#[test]
fn administrative_overrides() {
    let breaker = CircuitBreaker::new("admin", tripping_config()).unwrap();

    breaker.transition_to_forced_open();
    assert_eq!(breaker.state(), State::ForcedOpen);
    assert!(!breaker.is_call_permitted());

    breaker.transition_to_disabled();
    assert_eq!(breaker.state(), State::Disabled);
    for _ in 0..20 {
        assert!(breaker.is_call_permitted());
        breaker.on_error(Duration::ZERO, &Error::msg("not recorded"));
    }
    assert_eq!(breaker.state(), State::Disabled);

    breaker.reset();
    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.metrics().number_of_buffered_calls(), 0);
}
