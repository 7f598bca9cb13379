//! The `SelectionPolicy` trait shared by every policy.
//!
//! [`EpsilonGreedy`][crate::EpsilonGreedy], [`PhaseAware`][crate::PhaseAware] and
//! [`Schedule`][crate::Schedule] all expose the same two-step interface:
//! `decide() -> Choice` before a trial and `record_outcome(arm, bool)` after it.
//! The decision loop is written against this trait, so policies can be swapped
//! (or boxed) without changing the loop.
//!
//! Policies know nothing about the budget: they see one outcome at a time and
//! can be queried indefinitely.

use crate::{ArmRegistry, Choice, Error, PolicyKind, Result};

/// Common interface for arm-selection policies.
///
/// # Example
///
/// ```rust
/// use portal_bandit::{EpsilonGreedy, EpsilonGreedyConfig, SelectionPolicy};
///
/// fn one_round<P: SelectionPolicy + ?Sized>(policy: &mut P, outcome: bool) {
///     let arm = policy.choose_arm();
///     // ... run the trial ...
///     policy.record_outcome(arm, outcome).unwrap();
/// }
///
/// let mut p = EpsilonGreedy::with_seed(3, EpsilonGreedyConfig::default(), 42).unwrap();
/// one_round(&mut p, true);
/// assert_eq!(p.registry().total_attempts(), 1);
/// ```
pub trait SelectionPolicy {
    /// Which policy this is (for logs).
    fn kind(&self) -> PolicyKind;

    /// Pick the next arm. Always returns an index in `[0, arms)`.
    fn decide(&mut self) -> Choice;

    /// Shorthand for `decide().arm`.
    fn choose_arm(&mut self) -> usize {
        self.decide().arm
    }

    /// Feed back the known outcome of a trial on `arm`.
    ///
    /// Only call this for trials whose outcome is certain.
    fn record_outcome(&mut self, arm: usize, outcome: bool) -> Result<()>;

    /// Per-arm statistics backing this policy.
    fn registry(&self) -> &ArmRegistry;

    /// Number of arms `K`.
    fn arms(&self) -> usize {
        self.registry().len()
    }

    /// Called by the decision loop before the first trial of an episode.
    /// Clears statistics unless the policy was configured to warm-start.
    fn begin_episode(&mut self);

    /// Replace the arm pattern between trials. Only pattern-driven policies
    /// support this.
    fn set_pattern(&mut self, _pattern: Vec<usize>) -> Result<()> {
        Err(Error::Unsupported {
            what: "pattern override",
        })
    }
}

impl<P: SelectionPolicy + ?Sized> SelectionPolicy for &mut P {
    fn kind(&self) -> PolicyKind {
        (**self).kind()
    }
    fn decide(&mut self) -> Choice {
        (**self).decide()
    }
    fn record_outcome(&mut self, arm: usize, outcome: bool) -> Result<()> {
        (**self).record_outcome(arm, outcome)
    }
    fn registry(&self) -> &ArmRegistry {
        (**self).registry()
    }
    fn begin_episode(&mut self) {
        (**self).begin_episode()
    }
    fn set_pattern(&mut self, pattern: Vec<usize>) -> Result<()> {
        (**self).set_pattern(pattern)
    }
}

impl<P: SelectionPolicy + ?Sized> SelectionPolicy for Box<P> {
    fn kind(&self) -> PolicyKind {
        (**self).kind()
    }
    fn decide(&mut self) -> Choice {
        (**self).decide()
    }
    fn choose_arm(&mut self) -> usize {
        (**self).choose_arm()
    }
    fn record_outcome(&mut self, arm: usize, outcome: bool) -> Result<()> {
        (**self).record_outcome(arm, outcome)
    }
    fn registry(&self) -> &ArmRegistry {
        (**self).registry()
    }
    fn arms(&self) -> usize {
        (**self).arms()
    }
    fn begin_episode(&mut self) {
        (**self).begin_episode()
    }
    fn set_pattern(&mut self, pattern: Vec<usize>) -> Result<()> {
        (**self).set_pattern(pattern)
    }
}
