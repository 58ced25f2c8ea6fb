use std::fmt;

/// Admission failure raised when a circuit breaker rejects a call.
///
/// Carried through `anyhow::Error`; callers distinguish it from user errors
/// with `err.downcast_ref::<CircuitBreakerOpenError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerOpenError {
    name: String,
}

impl CircuitBreakerOpenError {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn breaker_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CircuitBreakerOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "circuit breaker '{}' is open", self.name)
    }
}

impl std::error::Error for CircuitBreakerOpenError {}

/// Admission failure raised when a rate limiter rejects a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestNotPermittedError {
    name: String,
}

impl RequestNotPermittedError {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn limiter_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RequestNotPermittedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate limiter '{}' does not permit further calls", self.name)
    }
}

impl std::error::Error for RequestNotPermittedError {}
