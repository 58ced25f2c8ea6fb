//! Outcome window of the circuit breaker: a bit-packed ring of call
//! results (set bit = failure) with an O(1) cached population count.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

const WORD_BITS: usize = u64::BITS as usize;

/// Returned by the failure-rate accessors while the window has not been
/// filled once; no transition is ever driven off an unknown rate.
pub const RATE_UNKNOWN: f64 = -1.0;

/// Fixed-capacity ring of single-bit outcomes.
///
/// Writes take one fine lock on the cursor; storage words and the cached
/// cardinality are atomics, so readers never lock. Reads may trail an
/// in-flight write, which is fine: transition decisions are driven off the
/// post-write return values, not off reader snapshots.
#[derive(Debug)]
pub struct RingBitBuffer {
    capacity: usize,
    words: Vec<AtomicU64>,
    // count of set bits, kept in step with the storage on every write
    cardinality: AtomicUsize,
    // grows until it saturates at capacity
    length: AtomicUsize,
    cursor: Mutex<usize>,
}

impl RingBitBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ring bit buffer capacity must be >= 1");
        let word_count = capacity.div_ceil(WORD_BITS);
        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            words.push(AtomicU64::new(0));
        }
        RingBitBuffer {
            capacity,
            words,
            cardinality: AtomicUsize::new(0),
            length: AtomicUsize::new(0),
            cursor: Mutex::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Logical number of recorded outcomes, at most `capacity`.
    pub fn length(&self) -> usize {
        self.length.load(Ordering::SeqCst)
    }

    /// Number of set bits (failures) currently stored.
    pub fn cardinality(&self) -> usize {
        self.cardinality.load(Ordering::SeqCst)
    }

    /// Appends `bit` at the cursor, overwriting the oldest outcome once the
    /// buffer is saturated, and returns the cardinality after the write.
    pub fn set_next_bit(&self, bit: bool) -> usize {
        let mut cursor = self.cursor.lock().unwrap();
        let index = *cursor;
        let word = index / WORD_BITS;
        let mask = 1u64 << (index % WORD_BITS);

        let old_word = if bit {
            self.words[word].fetch_or(mask, Ordering::SeqCst)
        } else {
            self.words[word].fetch_and(!mask, Ordering::SeqCst)
        };
        let old_bit = old_word & mask != 0;

        if self.length.load(Ordering::SeqCst) < self.capacity {
            self.length.fetch_add(1, Ordering::SeqCst);
        }
        // card += new - old
        let cardinality = match (old_bit, bit) {
            (false, true) => self.cardinality.fetch_add(1, Ordering::SeqCst) + 1,
            (true, false) => self.cardinality.fetch_sub(1, Ordering::SeqCst) - 1,
            _ => self.cardinality.load(Ordering::SeqCst),
        };

        *cursor = (index + 1) % self.capacity;
        cardinality
    }

    pub fn clear(&self) {
        let mut cursor = self.cursor.lock().unwrap();
        for word in &self.words {
            word.store(0, Ordering::SeqCst);
        }
        self.cardinality.store(0, Ordering::SeqCst);
        self.length.store(0, Ordering::SeqCst);
        *cursor = 0;
    }

    #[cfg(test)]
    fn stored_cardinality(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::SeqCst).count_ones() as usize)
            .sum()
    }
}

/// Failure-rate view over a [`RingBitBuffer`].
///
/// The rate is defined only once the window has filled; until then the
/// recording operations and [`BreakerMetrics::failure_rate`] report
/// [`RATE_UNKNOWN`].
#[derive(Debug)]
pub struct BreakerMetrics {
    ring: RingBitBuffer,
}

impl BreakerMetrics {
    pub fn new(ring_buffer_size: usize) -> Self {
        BreakerMetrics {
            ring: RingBitBuffer::new(ring_buffer_size),
        }
    }

    /// Records a failed call and returns the failure rate after the write.
    pub fn on_error(&self) -> f64 {
        let failed = self.ring.set_next_bit(true);
        self.rate_of(failed)
    }

    /// Records a successful call and returns the failure rate after the write.
    pub fn on_success(&self) -> f64 {
        let failed = self.ring.set_next_bit(false);
        self.rate_of(failed)
    }

    pub fn failure_rate(&self) -> f64 {
        self.rate_of(self.ring.cardinality())
    }

    pub fn number_of_buffered_calls(&self) -> usize {
        self.ring.length()
    }

    pub fn number_of_failed_calls(&self) -> usize {
        self.ring.cardinality()
    }

    pub fn number_of_successful_calls(&self) -> usize {
        self.ring.length() - self.ring.cardinality()
    }

    pub fn max_number_of_buffered_calls(&self) -> usize {
        self.ring.capacity()
    }

    fn rate_of(&self, failed: usize) -> f64 {
        if self.ring.length() == self.ring.capacity() {
            failed as f64 * 100.0 / self.ring.capacity() as f64
        } else {
            RATE_UNKNOWN
        }
    }
}
