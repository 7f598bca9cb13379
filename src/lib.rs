//! `portal_bandit`: deterministic, regime-aware routing of a depletable budget.
//!
//! The problem: a fixed budget of units must be sent, a few at a time, through
//! one of `K` arms whose success probabilities are unknown and drift between
//! favourable and unfavourable regimes. Every trial commits `1..=3` units to a
//! single arm and reveals one boolean outcome shared by all of them. The goal is
//! to maximise the number of units that succeed before the budget runs out.
//!
//! **Goals:**
//! - **Deterministic by default**: policies draw randomness from an injected,
//!   seeded generator. Same seed + same outcomes → same choices.
//! - **Non-stationarity friendly**: windowed rates, not lifetime averages, plus
//!   a short window per regime-eligible arm for fast phase detection.
//! - **Small K**: built for a handful of arms.
//!
//! **Building blocks:**
//! - [`OutcomeWindow`]: fixed-capacity FIFO of boolean outcomes; `rate()` is 0.5
//!   when empty.
//! - [`ArmRegistry`]: per-arm long/short windows, attempt counters and
//!   [`Phase`] labels.
//! - [`PhaseDetector`]: threshold classifier `UNKNOWN`/`HIGH`/`LOW` over a
//!   short window, with a minimum-sample floor.
//!
//! **Selection policies** (all implement [`SelectionPolicy`]):
//! - [`EpsilonGreedy`]: forced initial exploration, then epsilon-greedy over
//!   long-window rates with exploration biased to under-sampled arms.
//! - [`PhaseAware`]: rides regime-eligible arms while they are `HIGH`, avoids
//!   them while `LOW`, otherwise falls back to epsilon-greedy.
//! - [`Schedule`]: a fixed repeating arm pattern (baselines, manual runs).
//!
//! Every decision is a [`Choice`] carrying a typed [`ChoiceReason`].
//!
//! **Running episodes:**
//! - [`TrialExecutor`]: the collaborator that spends the budget
//!   (`start_episode`, `execute_trial`, `budget_status`).
//! - [`DecisionLoop`]: asks the policy, executes, checks the budget invariant,
//!   records the outcome, and produces an [`EpisodeLog`]. Operator
//!   [`Override`]s arrive on a channel and apply only between trials.
//! - [`SimulatedExecutor`]: seeded in-process executor with oscillating and
//!   cyclic arms. `HttpExecutor` (feature `http`) talks to the remote API.
//! - [`analysis`]: rolling rates, volatility, streaks and usage over logs.
//!
//! ```rust
//! use portal_bandit::{
//!     DecisionLoop, EpisodeConfig, PhaseAware, PhaseAwareConfig, SimConfig, SimulatedExecutor,
//! };
//!
//! let policy = PhaseAware::with_seed(3, PhaseAwareConfig::default(), 7).unwrap();
//! let sim = SimulatedExecutor::from_config(&SimConfig::default(), 3, 7).unwrap();
//! let mut dl = DecisionLoop::new(policy, sim, EpisodeConfig::default()).unwrap();
//! let log = dl.run_episode().unwrap();
//! assert_eq!(log.saved + log.lost, log.budget);
//! ```
//!
//! **Non-goals:**
//! - No estimation of the true regime-switching process and no optimality
//!   guarantee against an oracle.
//! - No charts or dashboards; [`EpisodeLog`] JSON is the hand-off point.

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod window;
pub use window::*;

mod phase;
pub use phase::*;

mod registry;
pub use registry::*;

mod decision;
pub use decision::*;

mod policy;
pub use policy::*;

mod config;
pub use config::*;

mod epsilon;
pub use epsilon::EpsilonGreedy;

mod phase_aware;
pub use phase_aware::*;

mod schedule;
pub use schedule::*;

mod overrides;
pub use overrides::*;

mod trial_log;
pub use trial_log::*;

mod episode;
pub use episode::*;

mod sim;
pub use sim::*;

pub mod analysis;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::*;
