//! Configuration objects.
//!
//! Every tunable lives in an explicit struct passed to a constructor; there is no
//! process-wide mutable state. All structs deserialize from TOML with per-field
//! defaults, so a config file only needs the keys it changes:
//!
//! ```toml
//! arms = 3
//! seed = 7
//!
//! [phase]
//! short_window_size = 8
//! phase_eligible = [1, 2]
//!
//! [episode]
//! units_per_trial = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ArmProcess, Error, Result};

/// Largest batch the remote API accepts for one trial.
pub const MAX_UNITS_PER_TRIAL: u32 = 3;

fn check_rate(field: &'static str, x: f64) -> Result<()> {
    if x.is_finite() && (0.0..=1.0).contains(&x) {
        Ok(())
    } else {
        Err(Error::config(field, format!("must be in [0, 1], got {x}")))
    }
}

fn check_positive(field: &'static str, x: usize) -> Result<()> {
    if x == 0 {
        Err(Error::config(field, "must be > 0"))
    } else {
        Ok(())
    }
}

fn check_arms(field: &'static str, arms: usize, indices: &[usize]) -> Result<()> {
    if arms == 0 {
        return Err(Error::config("arms", "need at least one arm"));
    }
    match indices.iter().find(|&&i| i >= arms) {
        Some(i) => Err(Error::config(
            field,
            format!("arm {i} out of range for {arms} arm(s)"),
        )),
        None => Ok(()),
    }
}

/// Windowed epsilon-greedy policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpsilonGreedyConfig {
    /// Long-window capacity per arm.
    pub window_size: usize,
    /// Probability of taking the exploration branch, in `[0, 1]`.
    pub exploration_rate: f64,
    /// Forced attempts per arm before adaptive selection starts.
    pub initial_exploration_count: u64,
    /// Exploration candidates are arms with `attempts <= min_attempts + slack`.
    /// `None` explores uniformly over all arms.
    pub explore_slack: Option<u64>,
    /// Keep statistics across episodes instead of resetting at episode start.
    pub warm_start: bool,
}

impl Default for EpsilonGreedyConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            exploration_rate: 0.15,
            initial_exploration_count: 10,
            explore_slack: Some(10),
            warm_start: false,
        }
    }
}

impl EpsilonGreedyConfig {
    pub fn validate(&self, arms: usize) -> Result<()> {
        check_arms("arms", arms, &[])?;
        check_positive("window_size", self.window_size)?;
        check_rate("exploration_rate", self.exploration_rate)
    }
}

/// Phase-aware policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseAwareConfig {
    pub window_size: usize,
    /// Short-window capacity for phase-eligible arms (`<= window_size`).
    pub short_window_size: usize,
    /// Exploration rate of the epsilon-greedy fallback.
    pub exploration_rate: f64,
    pub initial_exploration_count: u64,
    /// Short-window rate at or above which an arm is labelled HIGH.
    pub phase_threshold: f64,
    /// Minimum short-window samples before any label other than UNKNOWN.
    pub phase_confidence_floor: usize,
    /// When a LOW arm is excluded, the lowest-indexed remaining arm is kept
    /// only if its rate exceeds this floor.
    pub floor_rate: f64,
    /// Arms that take part in regime exploitation.
    pub phase_eligible: Vec<usize>,
    /// See [`EpsilonGreedyConfig::explore_slack`].
    pub explore_slack: Option<u64>,
    pub warm_start: bool,
}

impl Default for PhaseAwareConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            short_window_size: 10,
            exploration_rate: 0.10,
            initial_exploration_count: 5,
            phase_threshold: 0.6,
            phase_confidence_floor: 5,
            floor_rate: 0.3,
            phase_eligible: vec![1],
            explore_slack: None,
            warm_start: false,
        }
    }
}

impl PhaseAwareConfig {
    pub fn validate(&self, arms: usize) -> Result<()> {
        check_arms("phase_eligible", arms, &self.phase_eligible)?;
        check_positive("window_size", self.window_size)?;
        check_positive("short_window_size", self.short_window_size)?;
        if self.short_window_size > self.window_size {
            return Err(Error::config(
                "short_window_size",
                format!(
                    "must not exceed window_size ({} > {})",
                    self.short_window_size, self.window_size
                ),
            ));
        }
        check_rate("exploration_rate", self.exploration_rate)?;
        check_rate("phase_threshold", self.phase_threshold)?;
        check_rate("floor_rate", self.floor_rate)
    }
}

/// Fixed repeating pattern policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Arms visited in order, then repeated.
    pub pattern: Vec<usize>,
    /// Window used for the per-arm summaries this policy reports.
    pub window_size: usize,
    pub warm_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            pattern: vec![2, 1, 0],
            window_size: 30,
            warm_start: false,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self, arms: usize) -> Result<()> {
        if self.pattern.is_empty() {
            return Err(Error::config("pattern", "must name at least one arm"));
        }
        check_arms("pattern", arms, &self.pattern)?;
        check_positive("window_size", self.window_size)
    }
}

/// Decision-loop knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Units committed per trial, in `1..=3`; capped by the remaining budget.
    pub units_per_trial: u32,
    /// Emit a progress event every N trials (0 disables).
    pub progress_every: u64,
    /// Retries for a trial whose execution failed without touching the budget.
    pub max_retries: u32,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            units_per_trial: 3,
            progress_every: 10,
            max_retries: 2,
        }
    }
}

impl EpisodeConfig {
    pub fn validate(&self) -> Result<()> {
        validate_units(self.units_per_trial)
    }
}

pub(crate) fn validate_units(units: u32) -> Result<()> {
    if (1..=MAX_UNITS_PER_TRIAL).contains(&units) {
        Ok(())
    } else {
        Err(Error::config(
            "units_per_trial",
            format!("must be in 1..={MAX_UNITS_PER_TRIAL}, got {units}"),
        ))
    }
}

/// Remote episode API settings. The bearer token is not stored here; it is
/// read from the environment at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    /// Minimum spacing between requests, in milliseconds.
    pub min_interval_ms: u64,
    /// Per-request timeout, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://challenge.sphinxhq.com".to_string(),
            min_interval_ms: 100,
            timeout_ms: 10_000,
        }
    }
}

/// In-process simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub budget: u64,
    /// One success process per arm; its length must equal `arms`.
    pub processes: Vec<ArmProcess>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            budget: 1000,
            processes: vec![
                ArmProcess::Stationary { p: 0.49 },
                ArmProcess::Oscillating {
                    high: 0.85,
                    low: 0.25,
                    period: 20,
                },
                ArmProcess::Cycle {
                    segments: vec![(80, 0.7), (100, 0.3)],
                },
            ],
        }
    }
}

impl SimConfig {
    pub fn validate(&self, arms: usize) -> Result<()> {
        if self.budget == 0 {
            return Err(Error::config("budget", "must be > 0"));
        }
        if self.processes.len() != arms {
            return Err(Error::config(
                "processes",
                format!("expected {arms} process(es), got {}", self.processes.len()),
            ));
        }
        self.processes.iter().try_for_each(ArmProcess::validate)
    }
}

/// Everything a run needs, loadable from one TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of arms `K`.
    pub arms: usize,
    /// Seed for the policy's random source.
    pub seed: u64,
    pub epsilon: EpsilonGreedyConfig,
    pub phase: PhaseAwareConfig,
    pub schedule: ScheduleConfig,
    pub episode: EpisodeConfig,
    pub http: HttpConfig,
    pub sim: SimConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arms: 3,
            seed: 0,
            epsilon: EpsilonGreedyConfig::default(),
            phase: PhaseAwareConfig::default(),
            schedule: ScheduleConfig::default(),
            episode: EpisodeConfig::default(),
            http: HttpConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Parse from TOML text; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = Config::default();
        c.epsilon.validate(c.arms).unwrap();
        c.phase.validate(c.arms).unwrap();
        c.schedule.validate(c.arms).unwrap();
        c.episode.validate().unwrap();
        c.sim.validate(c.arms).unwrap();
    }

    #[test]
    fn exploration_rate_outside_unit_interval_is_rejected() {
        let cfg = EpsilonGreedyConfig {
            exploration_rate: 1.5,
            ..EpsilonGreedyConfig::default()
        };
        let err = cfg.validate(3).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfig {
                field: "exploration_rate",
                ..
            }
        ));
        let nan = EpsilonGreedyConfig {
            exploration_rate: f64::NAN,
            ..EpsilonGreedyConfig::default()
        };
        assert!(nan.validate(3).is_err());
    }

    #[test]
    fn zero_window_is_rejected() {
        let cfg = EpsilonGreedyConfig {
            window_size: 0,
            ..EpsilonGreedyConfig::default()
        };
        assert!(cfg.validate(3).unwrap_err().is_config());
    }

    #[test]
    fn phase_config_checks_shapes() {
        let too_long = PhaseAwareConfig {
            short_window_size: 40,
            ..PhaseAwareConfig::default()
        };
        assert!(too_long.validate(3).is_err());

        let bad_arm = PhaseAwareConfig {
            phase_eligible: vec![3],
            ..PhaseAwareConfig::default()
        };
        assert!(bad_arm.validate(3).is_err());

        let no_eligible = PhaseAwareConfig {
            phase_eligible: Vec::new(),
            ..PhaseAwareConfig::default()
        };
        no_eligible.validate(3).unwrap();
    }

    #[test]
    fn units_must_be_between_one_and_three() {
        for bad in [0, 4] {
            let cfg = EpisodeConfig {
                units_per_trial: bad,
                ..EpisodeConfig::default()
            };
            assert!(cfg.validate().is_err());
        }
        for good in 1..=3 {
            validate_units(good).unwrap();
        }
    }

    #[test]
    fn toml_overrides_only_named_keys() {
        let c = Config::from_toml_str(
            r#"
            seed = 9

            [phase]
            short_window_size = 8
            phase_eligible = [1, 2]

            [episode]
            units_per_trial = 1
            "#,
        )
        .unwrap();
        assert_eq!(c.seed, 9);
        assert_eq!(c.arms, 3);
        assert_eq!(c.phase.short_window_size, 8);
        assert_eq!(c.phase.phase_eligible, vec![1, 2]);
        assert_eq!(c.phase.phase_threshold, 0.6);
        assert_eq!(c.episode.units_per_trial, 1);
        assert_eq!(c.epsilon, EpsilonGreedyConfig::default());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("arms = \"three\""),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn sim_processes_must_match_arm_count() {
        let c = SimConfig::default();
        assert!(c.validate(2).is_err());
    }
}
