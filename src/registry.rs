//! Per-arm statistics shared by every selection policy.
//!
//! The registry owns, for each arm:
//! - a long [`OutcomeWindow`] (the rate estimate used for exploitation),
//! - a short window when the arm takes part in phase detection,
//! - a lifetime attempt counter,
//! - the current [`Phase`] label.
//!
//! Outcomes only enter through [`ArmRegistry::record`]. An out-of-range arm
//! index is always a caller bug and surfaces as [`Error::ArmOutOfRange`].

use crate::{ArmSummary, Error, OutcomeWindow, Phase, Result};

#[derive(Debug, Clone)]
struct ArmStats {
    long: OutcomeWindow,
    short: Option<OutcomeWindow>,
    attempts: u64,
    successes: u64,
    phase: Phase,
}

impl ArmStats {
    fn reset(&mut self) {
        self.long.clear();
        if let Some(short) = self.short.as_mut() {
            short.clear();
        }
        self.attempts = 0;
        self.successes = 0;
        self.phase = Phase::Unknown;
    }
}

/// Statistics for a fixed set of `K` arms, indexed `0..K`.
#[derive(Debug, Clone)]
pub struct ArmRegistry {
    arms: Vec<ArmStats>,
}

impl ArmRegistry {
    /// Registry with long windows only (no phase tracking).
    pub fn new(arms: usize, long_cap: usize) -> Result<Self> {
        Self::build(arms, long_cap, None)
    }

    /// Registry where the arms listed in `phase_eligible` also keep a short
    /// window of capacity `short_cap` (`short_cap <= long_cap`).
    pub fn with_phase_tracking(
        arms: usize,
        long_cap: usize,
        short_cap: usize,
        phase_eligible: &[usize],
    ) -> Result<Self> {
        if short_cap > long_cap {
            return Err(Error::config(
                "short_window_size",
                format!("must not exceed window_size ({short_cap} > {long_cap})"),
            ));
        }
        Self::build(arms, long_cap, Some((short_cap, phase_eligible)))
    }

    fn build(arms: usize, long_cap: usize, short: Option<(usize, &[usize])>) -> Result<Self> {
        if arms == 0 {
            return Err(Error::config("arms", "need at least one arm"));
        }
        let long = OutcomeWindow::new(long_cap)?;
        let mut stats: Vec<ArmStats> = (0..arms)
            .map(|_| ArmStats {
                long: long.clone(),
                short: None,
                attempts: 0,
                successes: 0,
                phase: Phase::Unknown,
            })
            .collect();
        if let Some((short_cap, eligible)) = short {
            let short = OutcomeWindow::new(short_cap)?;
            for &arm in eligible {
                let slot = stats.get_mut(arm).ok_or(Error::ArmOutOfRange { arm, arms })?;
                slot.short = Some(short.clone());
            }
        }
        Ok(Self { arms: stats })
    }

    fn get(&self, arm: usize) -> Result<&ArmStats> {
        let arms = self.arms.len();
        self.arms.get(arm).ok_or(Error::ArmOutOfRange { arm, arms })
    }

    fn get_mut(&mut self, arm: usize) -> Result<&mut ArmStats> {
        let arms = self.arms.len();
        self.arms.get_mut(arm).ok_or(Error::ArmOutOfRange { arm, arms })
    }

    /// Number of arms `K`.
    pub fn len(&self) -> usize {
        self.arms.len()
    }

    /// Always false: construction requires at least one arm.
    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    /// Record one known outcome for `arm`.
    pub fn record(&mut self, arm: usize, outcome: bool) -> Result<()> {
        let s = self.get_mut(arm)?;
        s.long.push(outcome);
        if let Some(short) = s.short.as_mut() {
            short.push(outcome);
        }
        s.attempts += 1;
        s.successes += outcome as u64;
        Ok(())
    }

    /// Long-window rate (0.5 when the arm has no data).
    pub fn rate(&self, arm: usize) -> Result<f64> {
        Ok(self.get(arm)?.long.rate())
    }

    /// Short-window rate and its sample count, or `None` when the arm does not
    /// take part in phase detection.
    pub fn short_rate(&self, arm: usize) -> Result<Option<(f64, usize)>> {
        Ok(self.get(arm)?.short.as_ref().map(|w| (w.rate(), w.len())))
    }

    /// Lifetime number of outcomes recorded for `arm`.
    pub fn attempts(&self, arm: usize) -> Result<u64> {
        Ok(self.get(arm)?.attempts)
    }

    /// Current phase label for `arm`.
    pub fn phase(&self, arm: usize) -> Result<Phase> {
        Ok(self.get(arm)?.phase)
    }

    /// Whether `arm` keeps a short window (participates in phase detection).
    pub fn is_phase_eligible(&self, arm: usize) -> Result<bool> {
        Ok(self.get(arm)?.short.is_some())
    }

    /// Overwrite the phase label. Returns the previous label.
    pub fn set_phase(&mut self, arm: usize, phase: Phase) -> Result<Phase> {
        let s = self.get_mut(arm)?;
        Ok(std::mem::replace(&mut s.phase, phase))
    }

    /// Long-window rates for every arm, in index order.
    pub fn rates(&self) -> Vec<f64> {
        self.arms.iter().map(|s| s.long.rate()).collect()
    }

    /// Phase labels for every arm, in index order.
    pub fn phases(&self) -> Vec<Phase> {
        self.arms.iter().map(|s| s.phase).collect()
    }

    /// Lifetime attempts for every arm, in index order.
    pub fn all_attempts(&self) -> Vec<u64> {
        self.arms.iter().map(|s| s.attempts).collect()
    }

    /// Sum of attempts over all arms.
    pub fn total_attempts(&self) -> u64 {
        self.arms.iter().map(|s| s.attempts).sum()
    }

    /// Lowest-indexed arm with fewer than `quota` attempts, if any.
    pub fn first_under(&self, quota: u64) -> Option<usize> {
        self.arms.iter().position(|s| s.attempts < quota)
    }

    /// Per-arm snapshot for logs and progress reports.
    pub fn summaries(&self) -> Vec<ArmSummary> {
        self.arms
            .iter()
            .enumerate()
            .map(|(arm, s)| ArmSummary {
                arm,
                attempts: s.attempts,
                successes: s.successes,
                window_rate: s.long.rate(),
                window_len: s.long.len(),
                short_rate: s.short.as_ref().map(OutcomeWindow::rate),
                phase: s.phase,
            })
            .collect()
    }

    /// Forget every outcome (windows, counters and phase labels).
    pub fn reset(&mut self) {
        for s in &mut self.arms {
            s.reset();
        }
    }
}
