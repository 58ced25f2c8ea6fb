//! Lock-free permit decisions.
//!
//! Monotonic time since limiter start is partitioned into cycles of
//! `limit_refresh_period`; every new cycle restores `limit_for_period`
//! permits. A caller reserves its permit with one compare-and-swap on the
//! packed `(active_cycle, active_permissions)` word. A negative permit
//! count is a queue of reservations: each unit below zero is one caller
//! already scheduled to be admitted at a future cycle.

use super::config::RateLimiterConfig;
use super::event::{LimiterEvent, LimiterEventBus, LimiterEventKind};
use crate::Result;
use portable_atomic::AtomicU128;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// The immutable value published by each successful CAS, plus the wait the
/// deciding caller was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterState {
    pub active_cycle: u64,
    pub active_permissions: i64,
    pub nanos_to_wait: i64,
}

/// Point-in-time view of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterMetrics {
    /// Permits left in the active cycle; negative counts are reservations.
    pub available_permissions: i64,
    /// Callers currently parked waiting for a reserved cycle.
    pub number_of_waiting_threads: usize,
    /// Wait handed out by the most recent decision.
    pub nanos_to_wait: i64,
}

#[inline]
fn pack(cycle: u64, permissions: i64) -> u128 {
    ((cycle as u128) << 64) | (permissions as u64 as u128)
}

#[inline]
fn unpack(word: u128) -> (u64, i64) {
    ((word >> 64) as u64, word as u64 as i64)
}

/// A named rate limiter whose permit path is a single CAS.
pub struct AtomicRateLimiter {
    name: String,
    started_at: Instant,
    // cycle length is fixed for the lifetime of the limiter
    refresh_period_nanos: u64,
    limit_for_period: AtomicU64,
    timeout_nanos: AtomicU64,
    // packed (active_cycle, active_permissions)
    state: AtomicU128,
    latest_nanos_to_wait: AtomicI64,
    waiting_threads: AtomicUsize,
    event_bus: LimiterEventBus,
}

impl AtomicRateLimiter {
    pub fn new<S: Into<String>>(name: S, config: RateLimiterConfig) -> Result<Self> {
        config.is_valid()?;
        let refresh_period_nanos =
            u64::try_from(config.limit_refresh_period.as_nanos()).unwrap_or(u64::MAX);
        let timeout_nanos =
            u64::try_from(config.timeout_duration.as_nanos()).unwrap_or(u64::MAX);
        Ok(AtomicRateLimiter {
            name: name.into(),
            started_at: Instant::now(),
            refresh_period_nanos,
            limit_for_period: AtomicU64::new(config.limit_for_period),
            timeout_nanos: AtomicU64::new(timeout_nanos),
            state: AtomicU128::new(pack(0, config.limit_for_period as i64)),
            latest_nanos_to_wait: AtomicI64::new(0),
            waiting_threads: AtomicUsize::new(0),
            event_bus: LimiterEventBus::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            limit_for_period: self.limit_for_period.load(Ordering::SeqCst),
            limit_refresh_period: Duration::from_nanos(self.refresh_period_nanos),
            timeout_duration: Duration::from_nanos(self.timeout_nanos.load(Ordering::SeqCst)),
        }
    }

    pub fn event_bus(&self) -> &LimiterEventBus {
        &self.event_bus
    }

    /// Acquires a permit, waiting up to the configured timeout duration.
    pub fn acquire_permission(&self) -> bool {
        self.get_permission(Duration::from_nanos(self.timeout_nanos.load(Ordering::SeqCst)))
    }

    /// Acquires a permit, waiting up to `timeout`.
    ///
    /// Admission is decided by one successful CAS. A caller whose reserved
    /// cycle lies within `timeout` parks until that cycle opens; a caller
    /// whose wait would exceed `timeout` fails fast, publishing the cycle
    /// refresh but no decrement.
    pub fn get_permission(&self, timeout: Duration) -> bool {
        let timeout_nanos = i64::try_from(timeout.as_nanos()).unwrap_or(i64::MAX);
        let (published, admitted) = self.update_state(timeout_nanos);
        if admitted && published.nanos_to_wait > 0 {
            self.wait_for_permission(published.nanos_to_wait);
        }
        let kind = if admitted {
            LimiterEventKind::Permitted
        } else {
            LimiterEventKind::Rejected
        };
        self.event_bus.publish(&LimiterEvent::now(&self.name, kind));
        admitted
    }

    /// Permits left in the active cycle, refreshed virtually if a cycle
    /// boundary has passed since the last publication.
    pub fn available_permissions(&self) -> i64 {
        let (cycle, permissions) = unpack(self.state.load(Ordering::SeqCst));
        let current_cycle = self.elapsed_nanos() / self.refresh_period_nanos;
        if current_cycle > cycle {
            self.limit_for_period.load(Ordering::SeqCst) as i64
        } else {
            permissions
        }
    }

    pub fn number_of_waiting_threads(&self) -> usize {
        self.waiting_threads.load(Ordering::SeqCst)
    }

    /// Wait handed out by the most recent decision.
    pub fn nanos_to_wait(&self) -> i64 {
        self.latest_nanos_to_wait.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> LimiterMetrics {
        LimiterMetrics {
            available_permissions: self.available_permissions(),
            number_of_waiting_threads: self.number_of_waiting_threads(),
            nanos_to_wait: self.nanos_to_wait(),
        }
    }

    /// Updates the permit budget restored at each cycle boundary.
    /// Outstanding reservations keep their schedule.
    pub fn change_limit_for_period(&self, limit_for_period: u64) -> Result<()> {
        if limit_for_period < 1 {
            return Err(crate::Error::msg("limit_for_period must be >= 1"));
        }
        self.limit_for_period
            .store(limit_for_period, Ordering::SeqCst);
        Ok(())
    }

    /// Updates the default wait bound used by [`acquire_permission`](Self::acquire_permission).
    pub fn change_timeout_duration(&self, timeout_duration: Duration) {
        let timeout_nanos = u64::try_from(timeout_duration.as_nanos()).unwrap_or(u64::MAX);
        self.timeout_nanos.store(timeout_nanos, Ordering::SeqCst);
    }

    /// The CAS loop. Returns the state this caller published and whether it
    /// was admitted.
    fn update_state(&self, timeout_nanos: i64) -> (RateLimiterState, bool) {
        loop {
            let observed = self.state.load(Ordering::SeqCst);
            let (active_cycle, active_permissions) = unpack(observed);
            let now = self.elapsed_nanos();
            let limit = self.limit_for_period.load(Ordering::SeqCst) as i64;
            let current_cycle = now / self.refresh_period_nanos;

            let mut next_cycle = active_cycle;
            let mut next_permissions = active_permissions;
            if current_cycle > active_cycle {
                // rollover: leftover reservations are discarded, the callers
                // they denote wake on their own schedule
                next_cycle = current_cycle;
                next_permissions = limit;
            }

            let nanos_to_wait = self.nanos_to_wait_for_permission(next_permissions, limit, now);
            let admitted = nanos_to_wait <= timeout_nanos;
            if admitted {
                next_permissions -= 1;
            }

            if self
                .state
                .compare_exchange(
                    observed,
                    pack(next_cycle, next_permissions),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                self.latest_nanos_to_wait
                    .store(nanos_to_wait, Ordering::SeqCst);
                let published = RateLimiterState {
                    active_cycle: next_cycle,
                    active_permissions: next_permissions,
                    nanos_to_wait,
                };
                return (published, admitted);
            }
            std::hint::spin_loop();
        }
    }

    /// Time until the cycle in which a caller taking one permit out of
    /// `available` (already refreshed for the current cycle) gets its slot.
    fn nanos_to_wait_for_permission(&self, available: i64, limit: i64, now: u64) -> i64 {
        if available > 0 {
            return 0;
        }
        let period = self.refresh_period_nanos as i64;
        // reservation depth after this caller takes its permit
        let depth = 1 - available;
        let cycles_to_wait = (depth + limit - 1) / limit;
        let nanos_to_next_cycle = period - (now % self.refresh_period_nanos) as i64;
        (cycles_to_wait - 1) * period + nanos_to_next_cycle
    }

    /// Parks the caller for exactly `nanos`, re-arming on spurious wakeups.
    fn wait_for_permission(&self, nanos: i64) {
        self.waiting_threads.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_nanos(nanos as u64);
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::park_timeout(deadline - now);
        }
        self.waiting_threads.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Debug for AtomicRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (cycle, permissions) = unpack(self.state.load(Ordering::SeqCst));
        f.debug_struct("AtomicRateLimiter")
            .field("name", &self.name)
            .field("active_cycle", &cycle)
            .field("active_permissions", &permissions)
            .field("config", &self.config())
            .finish()
    }
}
