//! The decision loop: budget bookkeeping around a [`SelectionPolicy`].
//!
//! Per trial:
//! 1. apply queued operator [`Override`]s (blocking while paused),
//! 2. query the executor's budget and stop at zero,
//! 3. `decide()`, then execute `min(units_per_trial, remaining)` units,
//! 4. check the report against the budget and feed the outcome back.
//!
//! The policy never sees the budget. The loop owns the episode and enforces
//! `saved + lost + remaining == budget` on every status and report; numbers that
//! break it surface as [`Error::Protocol`].
//!
//! A trial whose execution fails is never recorded. The loop re-queries the
//! budget: if it is unchanged the trial did not happen and is retried (same arm,
//! same units) up to `max_retries` times, otherwise the episode aborts.

use std::sync::mpsc::{Receiver, TryRecvError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::validate_units;
use crate::{
    EpisodeConfig, EpisodeEnd, EpisodeLog, Error, Override, Result, SelectionPolicy, TrialRecord,
};

/// Running totals as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub saved: u64,
    pub lost: u64,
    pub remaining: u64,
    /// Trials executed so far in this episode.
    pub steps: u64,
}

impl BudgetStatus {
    /// `saved + lost + remaining`: the episode budget `B`.
    pub fn total(&self) -> u64 {
        self.saved
            .saturating_add(self.lost)
            .saturating_add(self.remaining)
    }

    fn same_budget(&self, other: &BudgetStatus) -> bool {
        (self.saved, self.lost, self.remaining) == (other.saved, other.lost, other.remaining)
    }
}

/// Outcome of one executed trial. All units share the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialReport {
    pub units_sent: u32,
    pub succeeded: bool,
    pub saved_total: u64,
    pub lost_total: u64,
    pub remaining: u64,
}

impl TrialReport {
    fn status(&self, steps: u64) -> BudgetStatus {
        BudgetStatus {
            saved: self.saved_total,
            lost: self.lost_total,
            remaining: self.remaining,
            steps,
        }
    }
}

/// The external collaborator that actually spends the budget.
pub trait TrialExecutor {
    /// Reset the external counters and report the starting budget.
    fn start_episode(&mut self) -> Result<BudgetStatus>;

    /// Commit `units` to `arm`. Atomic: all units succeed or all are lost.
    fn execute_trial(&mut self, arm: usize, units: u32) -> Result<TrialReport>;

    /// Current totals, without side effects.
    fn budget_status(&mut self) -> Result<BudgetStatus>;

    fn remaining_budget(&mut self) -> Result<u64> {
        Ok(self.budget_status()?.remaining)
    }
}

impl<E: TrialExecutor + ?Sized> TrialExecutor for &mut E {
    fn start_episode(&mut self) -> Result<BudgetStatus> {
        (**self).start_episode()
    }
    fn execute_trial(&mut self, arm: usize, units: u32) -> Result<TrialReport> {
        (**self).execute_trial(arm, units)
    }
    fn budget_status(&mut self) -> Result<BudgetStatus> {
        (**self).budget_status()
    }
}

impl<E: TrialExecutor + ?Sized> TrialExecutor for Box<E> {
    fn start_episode(&mut self) -> Result<BudgetStatus> {
        (**self).start_episode()
    }
    fn execute_trial(&mut self, arm: usize, units: u32) -> Result<TrialReport> {
        (**self).execute_trial(arm, units)
    }
    fn budget_status(&mut self) -> Result<BudgetStatus> {
        (**self).budget_status()
    }
}

fn protocol(detail: String) -> Error {
    Error::Protocol { detail }
}

fn check_status(status: &BudgetStatus, budget: u64) -> Result<()> {
    if status.total() == budget {
        Ok(())
    } else {
        Err(protocol(format!(
            "saved {} + lost {} + remaining {} != budget {budget}",
            status.saved, status.lost, status.remaining
        )))
    }
}

fn check_report(report: &TrialReport, before: &BudgetStatus, units: u32) -> Result<()> {
    if report.units_sent != units {
        return Err(protocol(format!(
            "requested {units} unit(s), executor sent {}",
            report.units_sent
        )));
    }
    let units = u64::from(units);
    if before.remaining.checked_sub(units) != Some(report.remaining) {
        return Err(protocol(format!(
            "remaining went {} -> {} for a {units}-unit trial",
            before.remaining, report.remaining
        )));
    }
    let (saved, lost) = if report.succeeded {
        (before.saved + units, before.lost)
    } else {
        (before.saved, before.lost + units)
    };
    if (report.saved_total, report.lost_total) != (saved, lost) {
        return Err(protocol(format!(
            "totals saved {} lost {} disagree with a {} trial of {units} unit(s)",
            report.saved_total,
            report.lost_total,
            if report.succeeded { "successful" } else { "failed" }
        )));
    }
    Ok(())
}

enum Flow {
    Continue,
    Stop,
}

/// Drives one policy against one executor, episode after episode.
pub struct DecisionLoop<P, E> {
    policy: P,
    executor: E,
    cfg: EpisodeConfig,
    overrides: Option<Receiver<Override>>,
    paused: bool,
}

impl<P: SelectionPolicy, E: TrialExecutor> DecisionLoop<P, E> {
    pub fn new(policy: P, executor: E, cfg: EpisodeConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            policy,
            executor,
            cfg,
            overrides: None,
            paused: false,
        })
    }

    /// Accept operator overrides from `rx`, applied only between trials.
    pub fn with_overrides(mut self, rx: Receiver<Override>) -> Self {
        self.overrides = Some(rx);
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn config(&self) -> &EpisodeConfig {
        &self.cfg
    }

    pub fn into_parts(self) -> (P, E) {
        (self.policy, self.executor)
    }

    /// Run one episode until the budget is exhausted or an operator stops it.
    pub fn run_episode(&mut self) -> Result<EpisodeLog> {
        self.policy.begin_episode();
        let start = self.executor.start_episode()?;
        let budget = start.total();
        let units_per_trial = self.cfg.units_per_trial;
        info!(
            policy = %self.policy.kind(),
            budget,
            units_per_trial,
            "episode started"
        );

        let mut last = start;
        let mut trials: Vec<TrialRecord> = Vec::new();
        let end = loop {
            if let Flow::Stop = self.poll_overrides() {
                break EpisodeEnd::Stopped;
            }

            let status = self.executor.budget_status()?;
            check_status(&status, budget)?;
            last = status;
            if status.remaining == 0 {
                break EpisodeEnd::Exhausted;
            }

            let choice = self.policy.decide();
            let units = u64::from(self.cfg.units_per_trial).min(status.remaining) as u32;
            let report = self.execute_with_retry(choice.arm, units, &status)?;
            check_report(&report, &status, units)?;
            self.policy.record_outcome(choice.arm, report.succeeded)?;
            last = report.status(status.steps + 1);

            let step = trials.len() as u64 + 1;
            let done = report.saved_total + report.lost_total;
            let record = TrialRecord {
                step,
                arm: choice.arm,
                units,
                succeeded: report.succeeded,
                saved_total: report.saved_total,
                lost_total: report.lost_total,
                remaining: report.remaining,
                cumulative_rate: report.saved_total as f64 / done.max(1) as f64,
                reason: choice.reason,
            };
            debug!(
                step,
                arm = record.arm,
                units,
                succeeded = record.succeeded,
                remaining = record.remaining,
                reason = ?record.reason,
                "trial"
            );
            if self.cfg.progress_every > 0 && step % self.cfg.progress_every == 0 {
                info!(
                    step,
                    saved = record.saved_total,
                    lost = record.lost_total,
                    remaining = record.remaining,
                    rate = record.cumulative_rate,
                    "progress"
                );
            }
            trials.push(record);
        };

        let log = EpisodeLog {
            policy: self.policy.kind(),
            budget,
            units_per_trial,
            trials,
            arms: self.policy.registry().summaries(),
            saved: last.saved,
            lost: last.lost,
            end,
        };
        info!(
            saved = log.saved,
            lost = log.lost,
            trials = log.trials.len(),
            rate = log.success_rate(),
            end = ?log.end,
            "episode finished"
        );
        Ok(log)
    }

    fn execute_with_retry(
        &mut self,
        arm: usize,
        units: u32,
        before: &BudgetStatus,
    ) -> Result<TrialReport> {
        let mut retries = 0;
        loop {
            let err = match self.executor.execute_trial(arm, units) {
                Ok(report) => return Ok(report),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            let now = match self.executor.budget_status() {
                Ok(now) => now,
                Err(requery) => {
                    warn!(arm, units, error = %err, requery = %requery, "trial failed and budget unknown, aborting");
                    return Err(err);
                }
            };
            if !now.same_budget(before) {
                warn!(arm, units, error = %err, "trial failed after the budget moved, aborting");
                return Err(err);
            }
            if retries >= self.cfg.max_retries {
                warn!(arm, units, retries, error = %err, "trial failed, retries exhausted");
                return Err(err);
            }
            retries += 1;
            warn!(arm, units, retry = retries, error = %err, "trial failed, budget untouched, retrying");
        }
    }

    fn poll_overrides(&mut self) -> Flow {
        let Some(rx) = self.overrides.take() else {
            return Flow::Continue;
        };
        let mut connected = true;
        let flow = loop {
            let next = if self.paused {
                rx.recv().ok()
            } else {
                match rx.try_recv() {
                    Ok(o) => Some(o),
                    Err(TryRecvError::Empty) => break Flow::Continue,
                    Err(TryRecvError::Disconnected) => None,
                }
            };
            let Some(o) = next else {
                connected = false;
                if self.paused {
                    warn!("override channel closed while paused, resuming");
                    self.paused = false;
                }
                break Flow::Continue;
            };
            if let Flow::Stop = self.apply_override(o) {
                break Flow::Stop;
            }
        };
        if connected {
            self.overrides = Some(rx);
        }
        flow
    }

    fn apply_override(&mut self, o: Override) -> Flow {
        match o {
            Override::SetPattern { pattern } => {
                if let Err(e) = self.policy.set_pattern(pattern) {
                    warn!(error = %e, "pattern override ignored");
                }
            }
            Override::SetUnits { units } => match validate_units(units) {
                Ok(()) => {
                    info!(units, "units per trial updated");
                    self.cfg.units_per_trial = units;
                }
                Err(e) => warn!(error = %e, "units override ignored"),
            },
            Override::ShowStats => {
                for s in self.policy.registry().summaries() {
                    info!(
                        arm = s.arm,
                        attempts = s.attempts,
                        successes = s.successes,
                        window_rate = s.window_rate,
                        phase = %s.phase,
                        "arm stats"
                    );
                }
            }
            Override::TogglePause => {
                self.paused = !self.paused;
                info!(paused = self.paused, "pause toggled");
            }
            Override::Resume => {
                if self.paused {
                    self.paused = false;
                    info!("resumed");
                }
            }
            Override::Stop => {
                info!("stop requested");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::{Schedule, ScheduleConfig, SimulatedExecutor};

    fn always(arm: usize, arms: usize) -> Schedule {
        let cfg = ScheduleConfig {
            pattern: vec![arm],
            ..ScheduleConfig::default()
        };
        Schedule::new(arms, cfg).unwrap()
    }

    fn episode(units: u32) -> EpisodeConfig {
        EpisodeConfig {
            units_per_trial: units,
            ..EpisodeConfig::default()
        }
    }

    #[test]
    fn exact_budget_takes_exact_trials() {
        let ex = SimulatedExecutor::stationary(&[0.5], 12, 3).unwrap();
        let mut dl = DecisionLoop::new(always(0, 1), ex, episode(3)).unwrap();
        let log = dl.run_episode().unwrap();
        assert_eq!(log.trials.len(), 4);
        assert_eq!(log.saved + log.lost, 12);
        assert_eq!(log.end, EpisodeEnd::Exhausted);
        let mut prev = 0;
        for t in &log.trials {
            let done = t.saved_total + t.lost_total;
            assert!(done > prev);
            prev = done;
        }
    }

    #[test]
    fn last_trial_is_capped_by_remaining() {
        let ex = SimulatedExecutor::stationary(&[1.0, 0.0], 10, 0).unwrap();
        let mut dl = DecisionLoop::new(always(1, 2), ex, episode(3)).unwrap();
        let log = dl.run_episode().unwrap();
        let units: Vec<u32> = log.trials.iter().map(|t| t.units).collect();
        assert_eq!(units, vec![3, 3, 3, 1]);
        assert_eq!((log.saved, log.lost), (0, 10));
        assert_eq!(log.arms[1].attempts, 4);
    }

    #[test]
    fn invalid_units_fail_before_any_trial() {
        let ex = SimulatedExecutor::stationary(&[0.5], 12, 0).unwrap();
        assert!(DecisionLoop::new(always(0, 1), ex, episode(4))
            .err()
            .is_some_and(|e| e.is_config()));
    }

    #[test]
    fn stop_override_ends_episode_early() {
        let (tx, rx) = mpsc::channel();
        tx.send(Override::Stop).unwrap();
        let ex = SimulatedExecutor::stationary(&[0.5], 30, 0).unwrap();
        let mut dl = DecisionLoop::new(always(0, 1), ex, episode(3))
            .unwrap()
            .with_overrides(rx);
        let log = dl.run_episode().unwrap();
        assert_eq!(log.end, EpisodeEnd::Stopped);
        assert!(log.trials.is_empty());
    }

    #[test]
    fn overrides_apply_between_trials() {
        let (tx, rx) = mpsc::channel();
        tx.send(Override::SetUnits { units: 1 }).unwrap();
        tx.send(Override::SetPattern {
            pattern: vec![1, 0],
        })
        .unwrap();
        tx.send(Override::TogglePause).unwrap();
        tx.send(Override::ShowStats).unwrap();
        tx.send(Override::Resume).unwrap();
        drop(tx);
        let ex = SimulatedExecutor::stationary(&[0.5, 0.5], 4, 0).unwrap();
        let mut dl = DecisionLoop::new(always(0, 2), ex, episode(3))
            .unwrap()
            .with_overrides(rx);
        let log = dl.run_episode().unwrap();
        let arms: Vec<usize> = log.trials.iter().map(|t| t.arm).collect();
        assert_eq!(arms, vec![1, 0, 1, 0]);
        assert!(log.trials.iter().all(|t| t.units == 1));
    }

    #[test]
    fn closed_channel_while_paused_resumes() {
        let (tx, rx) = mpsc::channel();
        tx.send(Override::TogglePause).unwrap();
        drop(tx);
        let ex = SimulatedExecutor::stationary(&[0.5], 6, 0).unwrap();
        let mut dl = DecisionLoop::new(always(0, 1), ex, episode(3))
            .unwrap()
            .with_overrides(rx);
        assert_eq!(dl.run_episode().unwrap().trials.len(), 2);
    }

    struct Lying {
        inner: SimulatedExecutor,
    }

    impl TrialExecutor for Lying {
        fn start_episode(&mut self) -> Result<BudgetStatus> {
            self.inner.start_episode()
        }
        fn execute_trial(&mut self, arm: usize, units: u32) -> Result<TrialReport> {
            let mut r = self.inner.execute_trial(arm, units)?;
            r.units_sent = units.saturating_sub(1);
            Ok(r)
        }
        fn budget_status(&mut self) -> Result<BudgetStatus> {
            self.inner.budget_status()
        }
    }

    #[test]
    fn short_batch_is_a_protocol_error_and_not_recorded() {
        let ex = Lying {
            inner: SimulatedExecutor::stationary(&[0.5], 9, 0).unwrap(),
        };
        let mut dl = DecisionLoop::new(always(0, 1), ex, episode(3)).unwrap();
        assert!(matches!(dl.run_episode(), Err(Error::Protocol { .. })));
        assert_eq!(dl.policy().registry().total_attempts(), 0);
    }
}
