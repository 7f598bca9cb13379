//! Fixed repeating arm pattern.
//!
//! Not adaptive: the pattern is walked in order and wraps around. It still
//! records outcomes so per-arm summaries stay meaningful, and it is the one
//! policy that accepts [`SelectionPolicy::set_pattern`] between trials.

use tracing::info;

use crate::{
    ArmRegistry, Choice, ChoiceReason, Error, PolicyKind, Result, ScheduleConfig, SelectionPolicy,
};

#[derive(Debug, Clone)]
pub struct Schedule {
    cfg: ScheduleConfig,
    registry: ArmRegistry,
    position: usize,
}

impl Schedule {
    pub fn new(arms: usize, cfg: ScheduleConfig) -> Result<Self> {
        cfg.validate(arms)?;
        let registry = ArmRegistry::new(arms, cfg.window_size)?;
        Ok(Self {
            cfg,
            registry,
            position: 0,
        })
    }

    pub fn pattern(&self) -> &[usize] {
        &self.cfg.pattern
    }

    /// Index into the pattern of the next decision.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl SelectionPolicy for Schedule {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Schedule
    }

    fn decide(&mut self) -> Choice {
        let position = self.position;
        let arm = self.cfg.pattern[position];
        self.position = (position + 1) % self.cfg.pattern.len();
        Choice::new(self.kind(), arm, ChoiceReason::Scheduled { position })
    }

    fn record_outcome(&mut self, arm: usize, outcome: bool) -> Result<()> {
        self.registry.record(arm, outcome)
    }

    fn registry(&self) -> &ArmRegistry {
        &self.registry
    }

    fn begin_episode(&mut self) {
        self.position = 0;
        if !self.cfg.warm_start {
            self.registry.reset();
        }
    }

    fn set_pattern(&mut self, pattern: Vec<usize>) -> Result<()> {
        if pattern.is_empty() {
            return Err(Error::config("pattern", "must name at least one arm"));
        }
        let arms = self.registry.len();
        if let Some(&arm) = pattern.iter().find(|&&a| a >= arms) {
            return Err(Error::ArmOutOfRange { arm, arms });
        }
        info!(?pattern, "pattern updated");
        self.position %= pattern.len();
        self.cfg.pattern = pattern;
        Ok(())
    }
}
