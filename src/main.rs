use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use portal_bandit::analysis::{self, EpisodeReport, SegmentRate};
use portal_bandit::{
    Config, DecisionLoop, EpisodeLog, EpsilonGreedy, Error, HttpExecutor, Override, PhaseAware,
    Result, Schedule, SelectionPolicy, SimulatedExecutor, TrialExecutor,
};

const TOKEN_ENV: &str = "PORTAL_API_TOKEN";

#[derive(Parser)]
#[command(name = "portal-bandit")]
#[command(version)]
#[command(about = "Route a depletable budget across drifting arms, trial by trial")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one or more episodes against the remote API or the simulator
    Run(RunArgs),
    /// Summarise a saved episode log
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    EpsilonGreedy,
    PhaseAware,
    Schedule,
}

#[derive(Args)]
struct RunArgs {
    /// Selection policy
    #[arg(long, value_enum, default_value = "phase-aware")]
    policy: PolicyArg,

    /// Arm pattern for the schedule policy, e.g. `2,1,0`
    #[arg(long, value_delimiter = ',')]
    pattern: Option<Vec<usize>>,

    /// Units per trial (1-3)
    #[arg(long)]
    units: Option<u32>,

    /// Seed for the policy (and the simulator)
    #[arg(long)]
    seed: Option<u64>,

    /// TOML config file; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token (defaults to $PORTAL_API_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Use the in-process simulator instead of the remote API
    #[arg(long)]
    simulate: bool,

    /// Read overrides from stdin (`p 2,1,0`, `m 3`, `s`, `pause`, `quit`)
    #[arg(long)]
    interactive: bool,

    /// Number of episodes to run
    #[arg(long, default_value_t = 1)]
    episodes: u32,

    /// Directory for episode logs
    #[arg(long, default_value = "logs")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Episode log written by `run`
    log: PathBuf,

    /// Rolling window for per-arm volatility
    #[arg(long, default_value_t = 30)]
    window: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Analyze(args) => analyze(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "aborted");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &RunArgs) -> Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if let Some(units) = args.units {
        cfg.episode.units_per_trial = units;
    }
    if let Some(pattern) = &args.pattern {
        cfg.schedule.pattern = pattern.clone();
    }
    if let Some(url) = &args.base_url {
        cfg.http.base_url = url.clone();
    }
    Ok(cfg)
}

fn build_policy(kind: PolicyArg, cfg: &Config) -> Result<Box<dyn SelectionPolicy>> {
    Ok(match kind {
        PolicyArg::EpsilonGreedy => Box::new(EpsilonGreedy::with_seed(
            cfg.arms,
            cfg.epsilon.clone(),
            cfg.seed,
        )?),
        PolicyArg::PhaseAware => {
            Box::new(PhaseAware::with_seed(cfg.arms, cfg.phase.clone(), cfg.seed)?)
        }
        PolicyArg::Schedule => Box::new(Schedule::new(cfg.arms, cfg.schedule.clone())?),
    })
}

fn build_executor(args: &RunArgs, cfg: &Config) -> Result<Box<dyn TrialExecutor>> {
    if args.simulate {
        return Ok(Box::new(SimulatedExecutor::from_config(
            &cfg.sim, cfg.arms, cfg.seed,
        )?));
    }
    let token = match &args.token {
        Some(t) => t.clone(),
        None => std::env::var(TOKEN_ENV).map_err(|_| Error::InvalidConfig {
            field: "token",
            reason: format!("pass --token or set {TOKEN_ENV}"),
        })?,
    };
    Ok(Box::new(HttpExecutor::new(&cfg.http, token)?))
}

fn spawn_stdin_overrides() -> Receiver<Override> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match Override::parse(&line) {
                Ok(o) => {
                    if tx.send(o).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "ignored input"),
            }
        }
    });
    rx
}

fn run(args: RunArgs) -> Result<()> {
    let cfg = load_config(&args)?;
    let policy = build_policy(args.policy, &cfg)?;
    let executor = build_executor(&args, &cfg)?;
    let mut dl = DecisionLoop::new(policy, executor, cfg.episode.clone())?;
    if args.interactive {
        dl = dl.with_overrides(spawn_stdin_overrides());
    }

    for episode in 0..args.episodes {
        let log = dl.run_episode()?;
        let prefix = format!("{}_{episode}", log.policy);
        let path = log.save(&args.out_dir, &prefix)?;
        info!(
            episode,
            saved = log.saved,
            budget = log.budget,
            path = %path.display(),
            "episode log written"
        );
        if log.end == portal_bandit::EpisodeEnd::Stopped {
            break;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ArmAnalysis {
    arm: usize,
    trials: usize,
    longest_streak: usize,
    volatility: Option<f64>,
    segments: Vec<SegmentRate>,
}

#[derive(Serialize)]
struct Analysis {
    episode: EpisodeReport,
    arms: Vec<ArmAnalysis>,
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let log = EpisodeLog::load(&args.log)?;
    let segments = analysis::default_segments();
    let arms = analysis::arm_usage(&log)
        .iter()
        .map(|u| -> Result<ArmAnalysis> {
            let outcomes = analysis::arm_outcomes(&log, u.arm);
            Ok(ArmAnalysis {
                arm: u.arm,
                trials: outcomes.len(),
                longest_streak: analysis::longest_streak(&outcomes),
                volatility: analysis::volatility(&outcomes, args.window)?,
                segments: analysis::segment_rates(&outcomes, &segments),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let out = Analysis {
        episode: analysis::report(&log),
        arms,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
