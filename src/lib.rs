#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Bulwark
//!
//! Bulwark is a fault-tolerance core for hot call paths. It decorates
//! arbitrary callable units with two independent, process-local policies:
//!
//! - a **circuit breaker** that short-circuits calls to a failing
//!   collaborator based on a moving failure-rate window, and
//! - an **atomic rate limiter** that admits a bounded number of callers per
//!   refresh period with a single compare-and-swap per decision.
//!
//! Policy instances are cheap to share between threads, are identified by
//! name, and publish their decisions (state transitions, successes,
//! failures, permits, rejections) on a per-instance event bus.
//!
//! ## Guarding a call
//!
//! ```rust
//! use bulwark_core::circuitbreaker::{BreakerConfig, CircuitBreaker};
//! use bulwark_core::api;
//!
//! let breaker = CircuitBreaker::new("backend", BreakerConfig::default()).unwrap();
//! let answer = api::call_with_breaker(&breaker, || Ok(41 + 1));
//! assert_eq!(answer.unwrap(), 42);
//! ```
//!
//! ## Rate limiting
//!
//! ```rust
//! use bulwark_core::ratelimiter::{AtomicRateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! let config = RateLimiterConfig {
//!     limit_for_period: 10,
//!     limit_refresh_period: Duration::from_millis(100),
//!     timeout_duration: Duration::ZERO,
//! };
//! let limiter = AtomicRateLimiter::new("ingress", config).unwrap();
//! assert!(limiter.acquire_permission());
//! ```
//!
//! ## Registries
//!
//! `CircuitBreakerRegistry` and `RateLimiterRegistry` map policy names to
//! shared instances; the first caller for a name creates the instance, later
//! callers receive the same one. Process-wide default registries are
//! available via [`circuitbreaker::default_registry`] and
//! [`ratelimiter::default_registry`].

/// Core implementations: the ring-bit-buffer statistics, the breaker state
/// machine, the atomic rate limiter and the per-instance event buses.
pub mod core;
/// Thin generic wrappers that guard an arbitrary callable with a policy.
pub mod api;
/// Adapters for the `log` facade.
pub mod logging;
// Time helpers shared by the policies and their tests.
pub mod utils;

// re-export preludes
pub use crate::core::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
