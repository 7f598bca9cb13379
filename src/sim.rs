//! In-process trial executor with seeded, regime-switching arms.
//!
//! Each arm follows an [`ArmProcess`] that maps the episode's step counter to a
//! success probability. The clock is global: every trial advances it, whichever
//! arm was chosen, so an oscillating arm keeps flipping while it is ignored.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::validate_units;
use crate::{BudgetStatus, Error, Result, SimConfig, TrialExecutor, TrialReport};

/// Success probability of one arm as a function of the step counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArmProcess {
    /// Constant probability.
    Stationary { p: f64 },
    /// `high` for `period` steps, then `low` for `period` steps, repeating.
    Oscillating { high: f64, low: f64, period: u64 },
    /// Piecewise constant: `(length, p)` segments, repeating.
    Cycle { segments: Vec<(u64, f64)> },
}

fn check_prob(field: &'static str, p: f64) -> Result<()> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::config(field, format!("must be in [0, 1], got {p}")))
    }
}

impl ArmProcess {
    pub fn validate(&self) -> Result<()> {
        match self {
            ArmProcess::Stationary { p } => check_prob("p", *p),
            ArmProcess::Oscillating { high, low, period } => {
                check_prob("high", *high)?;
                check_prob("low", *low)?;
                if *period == 0 {
                    return Err(Error::config("period", "must be > 0"));
                }
                Ok(())
            }
            ArmProcess::Cycle { segments } => {
                if segments.is_empty() {
                    return Err(Error::config("segments", "must not be empty"));
                }
                for &(len, p) in segments {
                    if len == 0 {
                        return Err(Error::config("segments", "segment length must be > 0"));
                    }
                    check_prob("segments", p)?;
                }
                Ok(())
            }
        }
    }

    /// Success probability at `step` (0-based).
    pub fn success_prob(&self, step: u64) -> f64 {
        match self {
            ArmProcess::Stationary { p } => *p,
            ArmProcess::Oscillating { high, low, period } => {
                if (step / (*period).max(1)) % 2 == 0 {
                    *high
                } else {
                    *low
                }
            }
            ArmProcess::Cycle { segments } => {
                let total: u64 = segments.iter().map(|&(len, _)| len).sum();
                if total == 0 {
                    return 0.0;
                }
                let mut pos = step % total;
                for &(len, p) in segments {
                    if pos < len {
                        return p;
                    }
                    pos -= len;
                }
                0.0
            }
        }
    }
}

/// Seeded stand-in for the remote episode API.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    processes: Vec<ArmProcess>,
    budget: u64,
    rng: StdRng,
    saved: u64,
    lost: u64,
    steps: u64,
    started: bool,
}

impl SimulatedExecutor {
    pub fn new(processes: Vec<ArmProcess>, budget: u64, seed: u64) -> Result<Self> {
        let cfg = SimConfig { budget, processes };
        cfg.validate(cfg.processes.len().max(1))?;
        Ok(Self {
            processes: cfg.processes,
            budget,
            rng: StdRng::seed_from_u64(seed),
            saved: 0,
            lost: 0,
            steps: 0,
            started: false,
        })
    }

    pub fn from_config(cfg: &SimConfig, arms: usize, seed: u64) -> Result<Self> {
        cfg.validate(arms)?;
        Self::new(cfg.processes.clone(), cfg.budget, seed)
    }

    /// Every arm succeeds with the same constant probability.
    pub fn stationary(probs: &[f64], budget: u64, seed: u64) -> Result<Self> {
        let processes = probs.iter().map(|&p| ArmProcess::Stationary { p }).collect();
        Self::new(processes, budget, seed)
    }

    pub fn arms(&self) -> usize {
        self.processes.len()
    }

    fn status(&self) -> BudgetStatus {
        BudgetStatus {
            saved: self.saved,
            lost: self.lost,
            remaining: self.budget - self.saved - self.lost,
            steps: self.steps,
        }
    }
}

impl TrialExecutor for SimulatedExecutor {
    fn start_episode(&mut self) -> Result<BudgetStatus> {
        self.saved = 0;
        self.lost = 0;
        self.steps = 0;
        self.started = true;
        debug!(budget = self.budget, arms = self.arms(), "simulated episode started");
        Ok(self.status())
    }

    fn execute_trial(&mut self, arm: usize, units: u32) -> Result<TrialReport> {
        if !self.started {
            return Err(Error::Executor {
                op: "execute_trial",
                detail: "no episode in progress".to_string(),
            });
        }
        let arms = self.arms();
        let process = self
            .processes
            .get(arm)
            .ok_or(Error::ArmOutOfRange { arm, arms })?;
        validate_units(units)?;
        let remaining = self.status().remaining;
        if u64::from(units) > remaining {
            return Err(Error::Executor {
                op: "execute_trial",
                detail: format!("{units} unit(s) requested with {remaining} remaining"),
            });
        }
        let p = process.success_prob(self.steps);
        let succeeded = self.rng.random::<f64>() < p;
        if succeeded {
            self.saved += u64::from(units);
        } else {
            self.lost += u64::from(units);
        }
        self.steps += 1;
        let s = self.status();
        Ok(TrialReport {
            units_sent: units,
            succeeded,
            saved_total: s.saved,
            lost_total: s.lost,
            remaining: s.remaining,
        })
    }

    fn budget_status(&mut self) -> Result<BudgetStatus> {
        Ok(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillating_flips_every_period() {
        let p = ArmProcess::Oscillating {
            high: 0.9,
            low: 0.1,
            period: 3,
        };
        let probs: Vec<f64> = (0..7).map(|s| p.success_prob(s)).collect();
        assert_eq!(probs, vec![0.9, 0.9, 0.9, 0.1, 0.1, 0.1, 0.9]);
    }

    #[test]
    fn cycle_repeats_segments() {
        let p = ArmProcess::Cycle {
            segments: vec![(2, 0.7), (1, 0.3)],
        };
        let probs: Vec<f64> = (0..6).map(|s| p.success_prob(s)).collect();
        assert_eq!(probs, vec![0.7, 0.7, 0.3, 0.7, 0.7, 0.3]);
    }

    #[test]
    fn invalid_processes_are_config_errors() {
        for bad in [
            ArmProcess::Stationary { p: 1.2 },
            ArmProcess::Oscillating {
                high: 0.9,
                low: 0.1,
                period: 0,
            },
            ArmProcess::Cycle {
                segments: Vec::new(),
            },
            ArmProcess::Cycle {
                segments: vec![(0, 0.5)],
            },
        ] {
            assert!(bad.validate().unwrap_err().is_config(), "{bad:?}");
        }
    }

    #[test]
    fn certain_arms_move_budget_deterministically() {
        let mut ex = SimulatedExecutor::stationary(&[1.0, 0.0], 10, 0).unwrap();
        assert!(ex.execute_trial(0, 1).is_err());
        let s = ex.start_episode().unwrap();
        assert_eq!(s.total(), 10);

        let r = ex.execute_trial(0, 3).unwrap();
        assert!(r.succeeded);
        assert_eq!((r.saved_total, r.lost_total, r.remaining), (3, 0, 7));
        let r = ex.execute_trial(1, 2).unwrap();
        assert!(!r.succeeded);
        assert_eq!((r.saved_total, r.lost_total, r.remaining), (3, 2, 5));
        assert_eq!(ex.budget_status().unwrap().steps, 2);
    }

    #[test]
    fn over_budget_and_bad_arm_are_rejected_without_side_effects() {
        let mut ex = SimulatedExecutor::stationary(&[0.5], 2, 0).unwrap();
        ex.start_episode().unwrap();
        assert!(matches!(
            ex.execute_trial(0, 3),
            Err(Error::Executor { .. })
        ));
        assert!(matches!(
            ex.execute_trial(1, 1),
            Err(Error::ArmOutOfRange { arm: 1, arms: 1 })
        ));
        assert_eq!(ex.budget_status().unwrap().remaining, 2);
    }

    #[test]
    fn same_seed_same_outcomes() {
        let run = || {
            let mut ex = SimulatedExecutor::from_config(&SimConfig::default(), 3, 42).unwrap();
            ex.start_episode().unwrap();
            (0..100)
                .map(|i| ex.execute_trial(i % 3, 1).unwrap().succeeded)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
