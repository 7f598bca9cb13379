//! Blocking HTTP executor for the remote episode API.
//!
//! Three endpoints, all authenticated with a bearer token:
//!
//! - `POST /api/mortys/start/`: reset the episode, returns a status body
//! - `POST /api/mortys/portal/` with `{"planet", "morty_count"}`: run a trial
//! - `GET /api/mortys/status/`: current totals
//!
//! Wire field names are mapped onto [`BudgetStatus`] and [`TrialReport`] here
//! and nowhere else. Requests are spaced at least `min_interval_ms` apart.

use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BudgetStatus, Error, HttpConfig, Result, TrialExecutor, TrialReport};

#[derive(Debug, Deserialize)]
struct WireStatus {
    morties_in_citadel: u64,
    morties_on_planet_jessica: u64,
    morties_lost: u64,
    #[serde(default)]
    steps_taken: u64,
}

impl From<WireStatus> for BudgetStatus {
    fn from(w: WireStatus) -> Self {
        BudgetStatus {
            saved: w.morties_on_planet_jessica,
            lost: w.morties_lost,
            remaining: w.morties_in_citadel,
            steps: w.steps_taken,
        }
    }
}

#[derive(Debug, Serialize)]
struct WirePortal {
    planet: usize,
    morty_count: u32,
}

#[derive(Debug, Deserialize)]
struct WireTrial {
    morties_sent: u32,
    survived: bool,
    morties_on_planet_jessica: u64,
    morties_lost: u64,
    morties_in_citadel: u64,
}

impl From<WireTrial> for TrialReport {
    fn from(w: WireTrial) -> Self {
        TrialReport {
            units_sent: w.morties_sent,
            succeeded: w.survived,
            saved_total: w.morties_on_planet_jessica,
            lost_total: w.morties_lost,
            remaining: w.morties_in_citadel,
        }
    }
}

/// [`TrialExecutor`] backed by the remote API.
#[derive(Debug)]
pub struct HttpExecutor {
    client: Client,
    base_url: String,
    token: String,
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl HttpExecutor {
    pub fn new(cfg: &HttpConfig, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::config("token", "must not be empty"));
        }
        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("base_url", "must not be empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
            min_interval: Duration::from_millis(cfg.min_interval_ms),
            last_request: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn send<T: DeserializeOwned>(&mut self, op: &'static str, req: RequestBuilder) -> Result<T> {
        self.pace();
        let resp = req.bearer_auth(&self.token).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Executor {
                op,
                detail: format!("HTTP {status}: {}", body.trim()),
            });
        }
        let body = resp.text()?;
        debug!(op, %status, "api response");
        serde_json::from_str(&body).map_err(|e| Error::Executor {
            op,
            detail: format!("unexpected response body: {e}"),
        })
    }
}

impl TrialExecutor for HttpExecutor {
    fn start_episode(&mut self) -> Result<BudgetStatus> {
        let req = self.client.post(self.url("/api/mortys/start/"));
        let status: WireStatus = self.send("start_episode", req)?;
        Ok(status.into())
    }

    fn execute_trial(&mut self, arm: usize, units: u32) -> Result<TrialReport> {
        let body = WirePortal {
            planet: arm,
            morty_count: units,
        };
        let req = self.client.post(self.url("/api/mortys/portal/")).json(&body);
        let report: WireTrial = self.send("execute_trial", req)?;
        Ok(report.into())
    }

    fn budget_status(&mut self) -> Result<BudgetStatus> {
        let req = self.client.get(self.url("/api/mortys/status/"));
        let status: WireStatus = self.send("budget_status", req)?;
        Ok(status.into())
    }
}
