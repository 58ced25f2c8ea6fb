//! Thin generic wrappers guarding an arbitrary callable with a policy.
//!
//! A decorated call follows one shape: acquire permission (rejection
//! surfaces a boundary error without invoking the callable), run the
//! callable, report the timed outcome, and hand the result back unchanged.

use crate::base::{CircuitBreakerOpenError, RequestNotPermittedError};
use crate::circuitbreaker::CircuitBreaker;
use crate::ratelimiter::AtomicRateLimiter;
use crate::Result;
use std::time::Instant;

/// Runs `f` under `breaker`.
///
/// A rejected call returns [`CircuitBreakerOpenError`] without invoking
/// `f`; admission failures are never recorded as call failures. A user
/// error is reported with its elapsed duration and rethrown unchanged.
pub fn call_with_breaker<F, R>(breaker: &CircuitBreaker, f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    if !breaker.is_call_permitted() {
        return Err(CircuitBreakerOpenError::new(breaker.name()).into());
    }
    let started = Instant::now();
    match f() {
        Ok(value) => {
            breaker.on_success(started.elapsed());
            Ok(value)
        }
        Err(err) => {
            breaker.on_error(started.elapsed(), &err);
            Err(err)
        }
    }
}

/// Runs `f` under `limiter`, waiting up to the configured timeout for a
/// permit. A rejected call returns [`RequestNotPermittedError`] without
/// invoking `f`.
pub fn call_with_limiter<F, R>(limiter: &AtomicRateLimiter, f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    if !limiter.acquire_permission() {
        return Err(RequestNotPermittedError::new(limiter.name()).into());
    }
    f()
}
