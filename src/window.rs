//! Fixed-capacity rolling record of boolean trial outcomes.

use std::collections::VecDeque;

use crate::{Error, Result};

/// Rate reported by an empty window: "no information", so untried arms do not
/// look like the worst arm.
pub const PRIOR_RATE: f64 = 0.5;

/// Sliding window of the most recent outcomes for one arm.
///
/// Oldest outcomes are evicted first once `cap` is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeWindow {
    cap: usize,
    buf: VecDeque<bool>,
    successes: usize,
}

impl OutcomeWindow {
    /// Create an empty window holding at most `cap` outcomes.
    ///
    /// A zero capacity is a configuration error.
    pub fn new(cap: usize) -> Result<Self> {
        if cap == 0 {
            return Err(Error::config("window capacity", "must be > 0"));
        }
        Ok(Self {
            cap,
            buf: VecDeque::with_capacity(cap),
            successes: 0,
        })
    }

    /// Maximum number of outcomes retained.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of outcomes currently retained (never above `cap`).
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of `true` outcomes currently retained.
    pub fn successes(&self) -> usize {
        self.successes
    }

    /// Iterate over retained outcomes, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.buf.iter().copied()
    }

    /// Push a new outcome, evicting the oldest if at capacity.
    pub fn push(&mut self, outcome: bool) {
        if self.buf.len() == self.cap {
            if let Some(evicted) = self.buf.pop_front() {
                self.successes -= evicted as usize;
            }
        }
        self.buf.push_back(outcome);
        self.successes += outcome as usize;
    }

    /// Empirical success rate, or [`PRIOR_RATE`] when empty.
    pub fn rate(&self) -> f64 {
        if self.buf.is_empty() {
            PRIOR_RATE
        } else {
            self.successes as f64 / self.buf.len() as f64
        }
    }

    /// Drop every retained outcome; capacity is unchanged.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.successes = 0;
    }
}
