//! Atomic rate limiting: a bounded number of callers admitted per refresh
//! cycle, decided by a single compare-and-swap per call.

pub mod config;
pub mod event;
pub mod limiter;
pub mod registry;

pub use config::*;
pub use event::*;
pub use limiter::*;
pub use registry::*;
