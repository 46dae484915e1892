//! Calibration check session driver.
//!
//! Replays robot-reported session payloads and user transitions through the
//! session model, standing in for the transport and UI layers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use calcheck::core::comparison::evaluate;
use calcheck::core::invariants::{unlisted_tip_racks, validate_invariants};
use calcheck::core::types::{ComparisonStatus, TransitionEvent, Vector3};
use calcheck::exit_codes;
use calcheck::io::config::{CalcheckConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use calcheck::io::snapshot_store::{load_payload, write_snapshot};
use calcheck::io::summary::render_summary;
use calcheck::logging;
use calcheck::session::SessionStore;

#[derive(Parser)]
#[command(
    name = "calcheck",
    version,
    about = "Calibration check session model driver"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Raise log verbosity (`-v` info, `-vv` debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a payload against the schema and every session invariant.
    Validate {
        payload: PathBuf,
    },
    /// Print the steps the session will visit, one per line.
    Plan {
        payload: PathBuf,
    },
    /// Apply transition events (`advance`, `exit`, `jumpToResults`) in order.
    Step {
        payload: PathBuf,
        #[arg(required = true)]
        events: Vec<TransitionEvent>,
        /// Write the resulting snapshot to this file.
        #[arg(long)]
        write: Option<PathBuf>,
    },
    /// Compare a difference vector against a threshold vector.
    Evaluate {
        /// Measured difference as `x,y,z`.
        #[arg(long, allow_hyphen_values = true)]
        difference: Vector3,
        /// Per-axis threshold as `x,y,z`.
        #[arg(long)]
        threshold: Vector3,
    },
    /// Render a plain-text results summary.
    Summary {
        payload: PathBuf,
    },
    /// Write the default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Validate { payload } => cmd_validate(&cli.config, &payload),
        Command::Plan { payload } => cmd_plan(&cli.config, &payload),
        Command::Step {
            payload,
            events,
            write,
        } => cmd_step(&cli.config, &payload, &events, write.as_deref()),
        Command::Evaluate {
            difference,
            threshold,
        } => cmd_evaluate(difference, threshold),
        Command::Summary { payload } => cmd_summary(&cli.config, &payload),
        Command::InitConfig { force } => cmd_init_config(&cli.config, force),
    }
}

fn cmd_validate(config: &Path, payload: &Path) -> Result<i32> {
    let cfg = load_config(config)?;
    let sequencer = cfg.sequencer()?;
    let payload = load_payload(payload)?;
    let mut errors = validate_invariants(&payload, &sequencer);
    if let Some(params) = &cfg.params {
        errors.extend(unlisted_tip_racks(&payload, params));
    }
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    println!("ok");
    Ok(exit_codes::OK)
}

fn cmd_plan(config: &Path, payload: &Path) -> Result<i32> {
    let store = open_store(config, payload)?;
    for step in store.plan() {
        println!("{step}");
    }
    Ok(exit_codes::OK)
}

fn cmd_step(
    config: &Path,
    payload: &Path,
    events: &[TransitionEvent],
    write: Option<&Path>,
) -> Result<i32> {
    let mut store = open_store(config, payload)?;
    let mut code = exit_codes::OK;
    for event in events {
        match store.transition(*event) {
            Ok(snapshot) => debug!(%event, step = %snapshot.current_step(), "event applied"),
            Err(err) if err.is_terminal() => {
                eprintln!("{err}");
                code = exit_codes::TERMINATED;
                break;
            }
            Err(err) => return Err(err).with_context(|| format!("apply event {event}")),
        }
    }

    println!("{}", store.current_step());
    if let Some(path) = write {
        write_snapshot(path, &store.snapshot())?;
    }
    if store.is_terminated() {
        code = exit_codes::TERMINATED;
    }
    Ok(code)
}

fn cmd_evaluate(difference: Vector3, threshold: Vector3) -> Result<i32> {
    let result = evaluate(difference, threshold);
    let json = serde_json::to_string_pretty(&result).context("serialize comparison")?;
    println!("{json}");
    Ok(exit_codes::OK)
}

fn cmd_summary(config: &Path, payload: &Path) -> Result<i32> {
    let store = open_store(config, payload)?;
    let snapshot = store.snapshot();
    print!("{}", render_summary(&snapshot, store.params())?);

    let outside = snapshot
        .registry()
        .ranks()
        .into_iter()
        .any(|rank| store.overall_status(rank) == ComparisonStatus::OutsideThreshold);
    if outside {
        return Ok(exit_codes::OUTSIDE_THRESHOLD);
    }
    Ok(exit_codes::OK)
}

fn cmd_init_config(config: &Path, force: bool) -> Result<i32> {
    if config.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config.display());
    }
    write_config(config, &CalcheckConfig::default())
        .with_context(|| format!("write {}", config.display()))?;
    Ok(exit_codes::OK)
}

/// Load config and payload, then open a session store from them.
fn open_store(config: &Path, payload: &Path) -> Result<SessionStore> {
    let options = load_config(config)?.session_options()?;
    let payload = load_payload(payload)?;
    let store = SessionStore::open(payload, options).context("open calibration session")?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_step_with_events() {
        let cli = Cli::parse_from([
            "calcheck",
            "step",
            "session.json",
            "advance",
            "jumpToResults",
        ]);
        match cli.command {
            Command::Step { events, write, .. } => {
                assert_eq!(
                    events,
                    vec![TransitionEvent::Advance, TransitionEvent::JumpToResults]
                );
                assert!(write.is_none());
            }
            _ => panic!("expected step command"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn parse_evaluate_vectors() {
        let cli = Cli::parse_from([
            "calcheck",
            "evaluate",
            "--difference",
            "-0.3,0.05,0.05",
            "--threshold",
            "0.25,0.25,0.25",
        ]);
        match cli.command {
            Command::Evaluate {
                difference,
                threshold,
            } => {
                assert_eq!(difference, Vector3::new(-0.3, 0.05, 0.05));
                assert_eq!(threshold, Vector3::new(0.25, 0.25, 0.25));
            }
            _ => panic!("expected evaluate command"),
        }
    }

    #[test]
    fn parse_rejects_nan_difference() {
        let parsed = Cli::try_parse_from([
            "calcheck",
            "evaluate",
            "--difference",
            "NaN,0,0",
            "--threshold",
            "0.25,0.25,0.25",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_rejects_unknown_event() {
        assert!(Cli::try_parse_from(["calcheck", "step", "session.json", "rewind"]).is_err());
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["calcheck", "plan", "s.json", "--config", "other.toml"]);
        assert!(matches!(cli.command, Command::Plan { .. }));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn parse_counts_verbose_flags() {
        let cli = Cli::parse_from(["calcheck", "-vv", "summary", "s.json"]);
        assert_eq!(cli.verbose, 2);
    }
}
