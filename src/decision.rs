//! Decision envelope for policy outputs.
//!
//! Every `decide` call returns a [`Choice`]: the arm plus a typed reason that can
//! be logged per trial and replayed offline. Prefer adding new reason variants
//! over changing the meaning of existing ones.

use std::fmt;

/// Which policy produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    EpsilonGreedy,
    PhaseAware,
    Schedule,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::EpsilonGreedy => write!(f, "epsilon_greedy"),
            PolicyKind::PhaseAware => write!(f, "phase_aware"),
            PolicyKind::Schedule => write!(f, "schedule"),
        }
    }
}

/// Why an arm was chosen.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChoiceReason {
    /// Forced sampling: the arm is still under its initial quota.
    InitialExploration,
    /// Random pick among `candidates` (the exploration branch).
    Explore { candidates: Vec<usize> },
    /// Highest long-window rate, ties to the lowest index.
    Exploit,
    /// A phase-eligible arm is in its HIGH regime and was forced.
    RideHighPhase,
    /// Arms in their LOW regime were excluded; the best remaining arm won.
    AvoidLowPhase { excluded: Vec<usize> },
    /// The default remaining arm was not above `floor`, so the other one was used.
    FloorFallback { floor: f64, excluded: Vec<usize> },
    /// Position `position` of a fixed repeating pattern.
    Scheduled { position: usize },
}

/// A single policy decision.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Choice {
    /// The policy that produced this decision.
    pub policy: PolicyKind,
    /// Selected arm index.
    pub arm: usize,
    pub reason: ChoiceReason,
}

impl Choice {
    pub(crate) fn new(policy: PolicyKind, arm: usize, reason: ChoiceReason) -> Self {
        Self {
            policy,
            arm,
            reason,
        }
    }
}
