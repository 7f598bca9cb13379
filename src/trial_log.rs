//! Trial-by-trial episode records and their JSON persistence.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{ChoiceReason, Phase, PolicyKind, Result};

/// One executed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 1-based trial number within the episode.
    pub step: u64,
    pub arm: usize,
    pub units: u32,
    pub succeeded: bool,
    pub saved_total: u64,
    pub lost_total: u64,
    pub remaining: u64,
    /// `saved_total / (saved_total + lost_total)` after this trial.
    pub cumulative_rate: f64,
    pub reason: ChoiceReason,
}

/// Per-arm snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmSummary {
    pub arm: usize,
    pub attempts: u64,
    pub successes: u64,
    /// Long-window rate at snapshot time.
    pub window_rate: f64,
    pub window_len: usize,
    /// Short-window rate, for phase-eligible arms only.
    pub short_rate: Option<f64>,
    pub phase: Phase,
}

impl ArmSummary {
    /// Lifetime success fraction (0 when never tried).
    pub fn lifetime_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeEnd {
    /// Budget exhausted (`saved + lost == budget`).
    Exhausted,
    /// Operator stop before exhaustion.
    Stopped,
}

/// Everything the decision loop knows about one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeLog {
    pub policy: PolicyKind,
    pub budget: u64,
    pub units_per_trial: u32,
    pub trials: Vec<TrialRecord>,
    pub arms: Vec<ArmSummary>,
    pub saved: u64,
    pub lost: u64,
    pub end: EpisodeEnd,
}

impl EpisodeLog {
    /// Fraction of committed units that were saved.
    pub fn success_rate(&self) -> f64 {
        let done = self.saved + self.lost;
        if done == 0 {
            0.0
        } else {
            self.saved as f64 / done as f64
        }
    }

    pub fn write_json<W: Write>(&self, w: W) -> Result<()> {
        serde_json::to_writer_pretty(w, self)?;
        Ok(())
    }

    /// Write to `<dir>/<prefix>_<unix-seconds>.json`, creating `dir` if
    /// needed. Returns the path written.
    pub fn save(&self, dir: impl AsRef<Path>, prefix: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = dir.join(format!("{prefix}_{secs}.json"));
        let mut w = BufWriter::new(File::create(&path)?);
        self.write_json(&mut w)?;
        w.flush()?;
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let r = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(r)?)
    }
}
