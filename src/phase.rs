//! Coarse regime labels for an arm's very recent performance.
//!
//! The detector is a plain threshold classifier over the short window, re-run on
//! every decision. It keeps no memory of the previous label, so the label can
//! jitter while the short-window rate sits near the threshold.

use std::fmt;

use crate::{Error, Result};

/// Regime label for one arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Not enough recent samples to say anything.
    #[default]
    Unknown,
    /// Short-window rate at or above the threshold.
    High,
    /// Short-window rate below the threshold.
    Low,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Unknown => write!(f, "UNKNOWN"),
            Phase::High => write!(f, "HIGH"),
            Phase::Low => write!(f, "LOW"),
        }
    }
}

/// Threshold classifier with a minimum-sample confidence floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseDetector {
    threshold: f64,
    min_samples: usize,
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            min_samples: 5,
        }
    }
}

impl PhaseDetector {
    /// `threshold` must be a finite value in `[0, 1]`.
    pub fn new(threshold: f64, min_samples: usize) -> Result<Self> {
        if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
            return Err(Error::config(
                "phase_threshold",
                format!("must be in [0, 1], got {threshold}"),
            ));
        }
        Ok(Self {
            threshold,
            min_samples,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Label a short-window rate backed by `samples` observations.
    pub fn classify(&self, short_rate: f64, samples: usize) -> Phase {
        if samples < self.min_samples {
            Phase::Unknown
        } else if short_rate >= self.threshold {
            Phase::High
        } else {
            Phase::Low
        }
    }
}
