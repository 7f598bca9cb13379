//! Offline statistics over outcome sequences and episode logs.
//!
//! These are the numbers used to characterise an arm from a baseline run
//! (one arm for a whole episode): how fast its rolling rate moves, how long
//! its good streaks last, and whether early, mid and late trials differ.

use std::ops::Range;

use serde::Serialize;

use crate::{EpisodeLog, Error, Result};

/// Rolling success rate with window `w`. The first `w - 1` entries use the
/// shorter prefix available so far, so the output has one entry per outcome.
pub fn rolling_rate(outcomes: &[bool], w: usize) -> Result<Vec<f64>> {
    if w == 0 {
        return Err(Error::config("window", "must be > 0"));
    }
    let mut out = Vec::with_capacity(outcomes.len());
    let mut hits = 0usize;
    for (i, &o) in outcomes.iter().enumerate() {
        hits += o as usize;
        if i >= w {
            hits -= outcomes[i - w] as usize;
        }
        let n = (i + 1).min(w);
        out.push(hits as f64 / n as f64);
    }
    Ok(out)
}

/// Population standard deviation of the full-width rolling rates.
///
/// `None` when the sequence is shorter than `w`.
pub fn volatility(outcomes: &[bool], w: usize) -> Result<Option<f64>> {
    let rates = rolling_rate(outcomes, w)?;
    let full = rates.get(w - 1..).unwrap_or(&[]);
    if full.is_empty() {
        return Ok(None);
    }
    let n = full.len() as f64;
    let mean = full.iter().sum::<f64>() / n;
    let var = full.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Ok(Some(var.sqrt()))
}

/// Length of the longest run of consecutive successes.
pub fn longest_streak(outcomes: &[bool]) -> usize {
    let mut best = 0;
    let mut cur = 0;
    for &o in outcomes {
        cur = if o { cur + 1 } else { 0 };
        best = best.max(cur);
    }
    best
}

/// Success rate over one step range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRate {
    pub range: Range<usize>,
    pub samples: usize,
    /// `None` when the segment holds no outcomes.
    pub rate: Option<f64>,
}

/// Success rate of `outcomes[range]` for each range (clipped to the data).
pub fn segment_rates(outcomes: &[bool], ranges: &[Range<usize>]) -> Vec<SegmentRate> {
    ranges
        .iter()
        .map(|r| {
            let lo = r.start.min(outcomes.len());
            let hi = r.end.clamp(lo, outcomes.len());
            let slice = &outcomes[lo..hi];
            let rate = (!slice.is_empty())
                .then(|| slice.iter().filter(|&&o| o).count() as f64 / slice.len() as f64);
            SegmentRate {
                range: r.clone(),
                samples: slice.len(),
                rate,
            }
        })
        .collect()
}

/// Early / mid / late split used for baseline reports.
pub fn default_segments() -> Vec<Range<usize>> {
    vec![0..100, 100..200, 200..usize::MAX]
}

/// Per-arm share of trials in an episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmUsage {
    pub arm: usize,
    pub trials: usize,
    pub units: u64,
    /// Fraction of all trials that went to this arm.
    pub share: f64,
}

/// Summary numbers for one episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub trials: usize,
    pub success_rate: f64,
    pub usage: Vec<ArmUsage>,
    pub longest_streak: usize,
}

/// Usage per arm, for every arm listed in the log's summaries (or seen in
/// its trials, whichever is larger).
pub fn arm_usage(log: &EpisodeLog) -> Vec<ArmUsage> {
    let arms = log
        .trials
        .iter()
        .map(|t| t.arm + 1)
        .max()
        .unwrap_or(0)
        .max(log.arms.len());
    let total = log.trials.len();
    let mut usage: Vec<ArmUsage> = (0..arms)
        .map(|arm| ArmUsage {
            arm,
            trials: 0,
            units: 0,
            share: 0.0,
        })
        .collect();
    for t in &log.trials {
        let u = &mut usage[t.arm];
        u.trials += 1;
        u.units += u64::from(t.units);
    }
    if total > 0 {
        for u in &mut usage {
            u.share = u.trials as f64 / total as f64;
        }
    }
    usage
}

/// Saved fraction of committed units after each trial.
pub fn cumulative_rate(log: &EpisodeLog) -> Vec<f64> {
    let mut saved = 0u64;
    let mut done = 0u64;
    log.trials
        .iter()
        .map(|t| {
            let units = u64::from(t.units);
            done += units;
            if t.succeeded {
                saved += units;
            }
            saved as f64 / done.max(1) as f64
        })
        .collect()
}

/// Outcome sequence of one arm's trials, in order.
pub fn arm_outcomes(log: &EpisodeLog, arm: usize) -> Vec<bool> {
    log.trials
        .iter()
        .filter(|t| t.arm == arm)
        .map(|t| t.succeeded)
        .collect()
}

pub fn report(log: &EpisodeLog) -> EpisodeReport {
    let outcomes: Vec<bool> = log.trials.iter().map(|t| t.succeeded).collect();
    EpisodeReport {
        trials: log.trials.len(),
        success_rate: log.success_rate(),
        usage: arm_usage(log),
        longest_streak: longest_streak(&outcomes),
    }
}
