//! Windowed epsilon-greedy selection.
//!
//! Policy:
//! 1. Forced initial exploration: while some arm has fewer than
//!    `initial_exploration_count` attempts, return the lowest-indexed such arm.
//! 2. With probability `exploration_rate`, explore: pick uniformly among arms whose
//!    lifetime attempts are within `explore_slack` of the least-sampled arm.
//! 3. Otherwise exploit: highest long-window rate, ties to the lowest index.
//!
//! Randomness comes from an injected generator (`StdRng` seeded by default), so a
//! fixed seed plus a fixed outcome sequence replays the same choices.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::{
    ArmRegistry, Choice, ChoiceReason, EpsilonGreedyConfig, PolicyKind, Result, SelectionPolicy,
};

/// Epsilon used for floating-point tie-breaking between window rates.
const TIEBREAK_EPS: f64 = 1e-12;

/// Highest long-window rate among `arms` (ascending indices), ties to the first.
pub(crate) fn argmax_rate(
    registry: &ArmRegistry,
    arms: impl IntoIterator<Item = usize>,
) -> Option<usize> {
    let rates = registry.rates();
    let mut best: Option<(usize, f64)> = None;
    for arm in arms {
        let r = rates[arm];
        match best {
            Some((_, b)) if r <= b + TIEBREAK_EPS => {}
            _ => best = Some((arm, r)),
        }
    }
    best.map(|(arm, _)| arm)
}

/// Arms eligible for the exploration branch.
pub(crate) fn explore_candidates(registry: &ArmRegistry, slack: Option<u64>) -> Vec<usize> {
    let attempts = registry.all_attempts();
    match slack {
        None => (0..attempts.len()).collect(),
        Some(slack) => {
            let min = attempts.iter().copied().min().unwrap_or(0);
            let limit = min.saturating_add(slack);
            (0..attempts.len()).filter(|&i| attempts[i] <= limit).collect()
        }
    }
}

/// One epsilon-greedy step over every arm (after forced exploration).
pub(crate) fn epsilon_greedy_step<R: Rng>(
    registry: &ArmRegistry,
    exploration_rate: f64,
    slack: Option<u64>,
    rng: &mut R,
) -> (usize, ChoiceReason) {
    if rng.random::<f64>() < exploration_rate {
        let candidates = explore_candidates(registry, slack);
        let arm = candidates[rng.random_range(0..candidates.len())];
        return (arm, ChoiceReason::Explore { candidates });
    }
    let arm = argmax_rate(registry, 0..registry.len()).unwrap_or(0);
    (arm, ChoiceReason::Exploit)
}

/// Seedable windowed epsilon-greedy policy.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<R = StdRng> {
    cfg: EpsilonGreedyConfig,
    registry: ArmRegistry,
    rng: R,
    adaptive: bool,
}

impl EpsilonGreedy<StdRng> {
    /// Deterministic by default: seed 0.
    pub fn new(arms: usize, cfg: EpsilonGreedyConfig) -> Result<Self> {
        Self::with_seed(arms, cfg, 0)
    }

    pub fn with_seed(arms: usize, cfg: EpsilonGreedyConfig, seed: u64) -> Result<Self> {
        Self::with_rng(arms, cfg, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> EpsilonGreedy<R> {
    /// Build with a caller-supplied random source. Fails on invalid config.
    pub fn with_rng(arms: usize, cfg: EpsilonGreedyConfig, rng: R) -> Result<Self> {
        cfg.validate(arms)?;
        let registry = ArmRegistry::new(arms, cfg.window_size)?;
        Ok(Self {
            cfg,
            registry,
            rng,
            adaptive: false,
        })
    }

    pub fn config(&self) -> &EpsilonGreedyConfig {
        &self.cfg
    }
}

impl<R: Rng> SelectionPolicy for EpsilonGreedy<R> {
    fn kind(&self) -> PolicyKind {
        PolicyKind::EpsilonGreedy
    }

    fn decide(&mut self) -> Choice {
        if let Some(arm) = self.registry.first_under(self.cfg.initial_exploration_count) {
            return Choice::new(self.kind(), arm, ChoiceReason::InitialExploration);
        }
        if !self.adaptive {
            self.adaptive = true;
            info!(
                per_arm = self.cfg.initial_exploration_count,
                "initial exploration complete, switching to adaptive selection"
            );
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

#[cfg(test)]
mod tests {
    use super::*;

    fn greedy(arms: usize, n0: u64) -> EpsilonGreedy {
        let cfg = EpsilonGreedyConfig {
            exploration_rate: 0.0,
            initial_exploration_count: n0,
            ..EpsilonGreedyConfig::default()
        };
        EpsilonGreedy::with_seed(arms, cfg, 7).unwrap()
    }

    #[test]
    fn forced_exploration_visits_each_arm_in_index_order() {
        let mut p = greedy(3, 10);
        let mut seen = Vec::new();
        for _ in 0..30 {
            let c = p.decide();
            assert_eq!(c.reason, ChoiceReason::InitialExploration);
            seen.push(c.arm);
            p.record_outcome(c.arm, false).unwrap();
        }
        let expected: Vec<usize> = (0..3).flat_map(|a| std::iter::repeat(a).take(10)).collect();
        assert_eq!(seen, expected);
        assert_eq!(p.registry().all_attempts(), vec![10, 10, 10]);
    }

    #[test]
    fn zero_epsilon_exploits_best_rate() {
        let mut p = greedy(3, 0);
        // Rates 0.4, 0.7, 0.5 over ten outcomes each.
        for (arm, wins) in [(0, 4), (1, 7), (2, 5)] {
            for i in 0..10 {
                p.record_outcome(arm, i < wins).unwrap();
            }
        }
        for _ in 0..50 {
            let c = p.decide();
            assert_eq!(c.arm, 1);
            assert_eq!(c.reason, ChoiceReason::Exploit);
        }
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let mut p = greedy(3, 0);
        assert_eq!(p.choose_arm(), 0);
        p.record_outcome(1, true).unwrap();
        p.record_outcome(2, true).unwrap();
        assert_eq!(p.choose_arm(), 1);
    }

    #[test]
    fn exploration_prefers_under_sampled_arms() {
        let cfg = EpsilonGreedyConfig {
            exploration_rate: 1.0,
            initial_exploration_count: 0,
            explore_slack: Some(10),
            ..EpsilonGreedyConfig::default()
        };
        let mut p = EpsilonGreedy::with_seed(3, cfg, 11).unwrap();
        for _ in 0..30 {
            p.record_outcome(0, true).unwrap();
        }
        for _ in 0..5 {
            p.record_outcome(1, true).unwrap();
        }
        // min attempts = 0 (arm 2), so only arms with <= 10 attempts qualify.
        for _ in 0..100 {
            let c = p.decide();
            assert_ne!(c.arm, 0);
            assert_eq!(
                c.reason,
                ChoiceReason::Explore {
                    candidates: vec![1, 2]
                }
            );
        }
    }

    #[test]
    fn uniform_exploration_covers_all_arms() {
        let cfg = EpsilonGreedyConfig {
            exploration_rate: 1.0,
            initial_exploration_count: 0,
            explore_slack: None,
            ..EpsilonGreedyConfig::default()
        };
        let mut p = EpsilonGreedy::with_seed(4, cfg, 5).unwrap();
        let mut hit = [false; 4];
        for _ in 0..400 {
            hit[p.choose_arm()] = true;
        }
        assert!(hit.iter().all(|&h| h));
    }

    #[test]
    fn same_seed_replays_same_choices() {
        let cfg = EpsilonGreedyConfig {
            exploration_rate: 0.5,
            initial_exploration_count: 2,
            ..EpsilonGreedyConfig::default()
        };
        let run = |seed| {
            let mut p = EpsilonGreedy::with_seed(3, cfg.clone(), seed).unwrap();
            (0..200)
                .map(|i| {
                    let a = p.choose_arm();
                    p.record_outcome(a, (i * 7 + a) % 3 == 0).unwrap();
                    a
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn invalid_config_fails_before_any_trial() {
        let cfg = EpsilonGreedyConfig {
            exploration_rate: 1.5,
            ..EpsilonGreedyConfig::default()
        };
        assert!(EpsilonGreedy::new(3, cfg).unwrap_err().is_config());
        assert!(EpsilonGreedy::new(0, EpsilonGreedyConfig::default())
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn out_of_range_record_is_rejected() {
        let mut p = greedy(2, 0);
        assert!(p.record_outcome(5, true).is_err());
        assert_eq!(p.registry().total_attempts(), 0);
    }
}
