//! VOC algorithm baseline persistence
//!
//! The VOC index algorithm needs hours to learn its baseline, persisting its
//! internal state lets a restarted device skip most of that learning.
//! Writes are limited to genuine drift to bound storage wear.
//!
//! Copyright 2019 Ryan Kurte

/// Minimum accumulated update time between baseline stores, 3 hours
pub const BASELINE_STORE_INTERVAL_MS: u64 = 3 * 60 * 60 * 1000;

/// Change in either state half required before the baseline is stored again
pub const BASELINE_MAXIMUM_DIFF: i64 = 50;

/// VOC algorithm state, two signed 32-bit values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Baseline {
    pub state0: i32,
    pub state1: i32,
}

impl Baseline {
    pub fn from_words(w: [u16; 4]) -> Self {
        Baseline {
            state0: ((w[0] as u32) << 16 | w[1] as u32) as i32,
            state1: ((w[2] as u32) << 16 | w[3] as u32) as i32,
        }
    }

    pub fn words(&self) -> [u16; 4] {
        let s0 = self.state0 as u32;
        let s1 = self.state1 as u32;
        [(s0 >> 16) as u16, s0 as u16, (s1 >> 16) as u16, s1 as u16]
    }

    /// A stored state is only meaningful when both halves are non-zero
    pub fn is_set(&self) -> bool {
        self.state0 != 0 && self.state1 != 0
    }

    /// Whether either half differs from `other` by more than `threshold`
    pub fn drifted_from(&self, other: &Baseline, threshold: i64) -> bool {
        let d0 = (self.state0 as i64 - other.state0 as i64).abs();
        let d1 = (self.state1 as i64 - other.state1 as i64).abs();
        d0 > threshold || d1 > threshold
    }
}

/// Tracks elapsed update time and the last persisted baseline
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineTracker {
    stored: Baseline,
    elapsed_ms: u64,
}

impl BaselineTracker {
    pub fn new(stored: Baseline) -> Self {
        BaselineTracker{ stored, elapsed_ms: 0 }
    }

    /// Add elapsed time, returns whether the device state should be read
    pub fn accumulate(&mut self, elapsed_ms: u64) -> bool {
        self.elapsed_ms = self.elapsed_ms.saturating_add(elapsed_ms);
        self.elapsed_ms > BASELINE_STORE_INTERVAL_MS
    }

    /// Compare a freshly read state against the stored one
    /// Returns `true` if it should be persisted, in which case it becomes the stored
    /// state and the elapsed time is reset
    pub fn observe(&mut self, state: Baseline) -> bool {
        if !state.drifted_from(&self.stored, BASELINE_MAXIMUM_DIFF) {
            return false;
        }

        self.stored = state;
        self.elapsed_ms = 0;
        true
    }

    pub fn stored(&self) -> &Baseline {
        &self.stored
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}
