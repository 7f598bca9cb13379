//! Regime-exploiting extension of epsilon-greedy.
//!
//! Some arms alternate between a favourable and an unfavourable success regime
//! faster than a long window can follow. Arms listed in
//! [`PhaseAwareConfig::phase_eligible`] keep a short window, and every decision
//! relabels them with the [`PhaseDetector`]:
//!
//! 1. Forced initial exploration (smaller quota than plain epsilon-greedy).
//! 2. Relabel every eligible arm from its short window.
//! 3. An eligible arm in HIGH phase that has cleared its initial quota is
//!    forced (the one with the best short-window rate when several qualify).
//! 4. Eligible arms in LOW phase are excluded. Among the rest, the
//!    lowest-indexed arm is the default; the best other arm replaces it when
//!    its long-window rate is strictly higher, or when the default is not above
//!    `floor_rate`.
//! 5. Otherwise (all UNKNOWN, or nothing eligible) fall back to epsilon-greedy
//!    with the configured, smaller exploration rate.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::epsilon::{argmax_rate, epsilon_greedy_step};
use crate::{
    ArmRegistry, Choice, ChoiceReason, Phase, PhaseAwareConfig, PhaseDetector, PolicyKind,
    Result, SelectionPolicy,
};

/// Seedable phase-aware policy.
#[derive(Debug, Clone)]
pub struct PhaseAware<R = StdRng> {
    cfg: PhaseAwareConfig,
    detector: PhaseDetector,
    registry: ArmRegistry,
    rng: R,
    adaptive: bool,
}

impl PhaseAware<StdRng> {
    /// Deterministic by default: seed 0.
    pub fn new(arms: usize, cfg: PhaseAwareConfig) -> Result<Self> {
        Self::with_seed(arms, cfg, 0)
    }

    pub fn with_seed(arms: usize, cfg: PhaseAwareConfig, seed: u64) -> Result<Self> {
        Self::with_rng(arms, cfg, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PhaseAware<R> {
    /// Build with a caller-supplied random source. Fails on invalid config.
    pub fn with_rng(arms: usize, cfg: PhaseAwareConfig, rng: R) -> Result<Self> {
        cfg.validate(arms)?;
        let detector = PhaseDetector::new(cfg.phase_threshold, cfg.phase_confidence_floor)?;
        let registry = ArmRegistry::with_phase_tracking(
            arms,
            cfg.window_size,
            cfg.short_window_size,
            &cfg.phase_eligible,
        )?;
        Ok(Self {
            cfg,
            detector,
            registry,
            rng,
            adaptive: false,
        })
    }

    pub fn config(&self) -> &PhaseAwareConfig {
        &self.cfg
    }

    pub fn detector(&self) -> &PhaseDetector {
        &self.detector
    }

    /// Current label of `arm` (UNKNOWN for arms outside the eligible set).
    pub fn phase(&self, arm: usize) -> Result<Phase> {
        self.registry.phase(arm)
    }

    fn refresh_phases(&mut self) {
        for &arm in &self.cfg.phase_eligible {
            let Ok(Some((rate, samples))) = self.registry.short_rate(arm) else {
                continue;
            };
            let next = self.detector.classify(rate, samples);
            if let Ok(prev) = self.registry.set_phase(arm, next) {
                if prev != next {
                    debug!(arm, from = %prev, to = %next, short_rate = rate, "phase change");
                }
            }
        }
    }

    /// Step 3: the eligible HIGH arm to ride, if any.
    fn high_phase_arm(&self, phases: &[Phase], attempts: &[u64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &arm in &self.cfg.phase_eligible {
            if phases[arm] != Phase::High || attempts[arm] <= self.cfg.initial_exploration_count {
                continue;
            }
            let rate = match self.registry.short_rate(arm) {
                Ok(Some((rate, _))) => rate,
                _ => continue,
            };
            match best {
                Some((b_arm, b)) if rate < b || (rate == b && b_arm < arm) => {}
                _ => best = Some((arm, rate)),
            }
        }
        best.map(|(arm, _)| arm)
    }

    /// Step 4: choose among arms that are not in a LOW phase.
    fn avoid_low(&self, excluded: Vec<usize>) -> Option<(usize, ChoiceReason)> {
        let remaining: Vec<usize> = (0..self.registry.len())
            .filter(|a| !excluded.contains(a))
            .collect();
        let (&default, others) = remaining.split_first()?;
        let Some(challenger) = argmax_rate(&self.registry, others.iter().copied()) else {
            return Some((default, ChoiceReason::AvoidLowPhase { excluded }));
        };
        let rates = self.registry.rates();
        let choice = if rates[challenger] > rates[default] {
            (challenger, ChoiceReason::AvoidLowPhase { excluded })
        } else if rates[default] > self.cfg.floor_rate {
            (default, ChoiceReason::AvoidLowPhase { excluded })
        } else {
            let floor = self.cfg.floor_rate;
            (challenger, ChoiceReason::FloorFallback { floor, excluded })
        };
        Some(choice)
    }
}

impl<R: Rng> SelectionPolicy for PhaseAware<R> {
    fn kind(&self) -> PolicyKind {
        PolicyKind::PhaseAware
    }

    fn decide(&mut self) -> Choice {
        self.refresh_phases();

        if let Some(arm) = self.registry.first_under(self.cfg.initial_exploration_count) {
            return Choice::new(self.kind(), arm, ChoiceReason::InitialExploration);
        }
        if !self.adaptive {
            self.adaptive = true;
            info!(
                per_arm = self.cfg.initial_exploration_count,
                eligible = ?self.cfg.phase_eligible,
                "initial exploration complete, phase detection active"
            );
        }

        let phases = self.registry.phases();
        let attempts = self.registry.all_attempts();
        if let Some(arm) = self.high_phase_arm(&phases, &attempts) {
            return Choice::new(self.kind(), arm, ChoiceReason::RideHighPhase);
        }

        let low: Vec<usize> = self
            .cfg
            .phase_eligible
            .iter()
            .copied()
            .filter(|&a| phases[a] == Phase::Low)
            .collect();
        if !low.is_empty() {
            if let Some((arm, reason)) = self.avoid_low(low) {
                return Choice::new(self.kind(), arm, reason);
            }
        }

        let (arm, reason) = epsilon_greedy_step(
            &self.registry,
            self.cfg.exploration_rate,
            self.cfg.explore_slack,
            &mut self.rng,
        );
        Choice::new(self.kind(), arm, reason)
    }

    fn record_outcome(&mut self, arm: usize, outcome: bool) -> Result<()> {
        self.registry.record(arm, outcome)
    }

    fn registry(&self) -> &ArmRegistry {
        &self.registry
    }

    fn begin_episode(&mut self) {
        if !self.cfg.warm_start {
            self.registry.reset();
            self.adaptive = false;
        }
    }
}
