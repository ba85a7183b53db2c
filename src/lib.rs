// src/lib.rs

pub mod bridge;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod logging;
pub mod poll;
pub mod primary;
pub mod types;
pub mod unit;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::bridge::LogBridge;
use crate::cli::CliArgs;
use crate::config::{SuiteConfig, load_and_validate, timeout_from_secs};
use crate::coordinator::{CoordinatorOptions, RunCoordinator, RunReport, RunSettings, RunState};
use crate::primary::primary_context;
use crate::unit::command::CommandUnit;
use crate::unit::{UnitOutcome, UnitRef, select_run_set};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - suite loading
/// - primary loop + coordinator
/// - stdin debugger acknowledgment (debug builds only)
/// - Ctrl-C handling
///
/// Returns whether every executed unit passed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let options = coordinator_options(&cfg, &args)?;

    let platform = cfg.config.platform();
    let units = build_units(&cfg, &platform, &config_root_dir(&config_path));

    if args.dry_run {
        print_dry_run(&options, &platform, units);
        return Ok(true);
    }

    let (primary, primary_loop) = primary_context();
    let coordinator = RunCoordinator::new(options, primary.clone(), Arc::new(LogBridge));

    if coordinator.debug_gate_enabled() {
        spawn_debugger_ack(coordinator.clone());
    }

    // Stop the primary loop once the run has been reported.
    let stop = primary.clone();
    let handle = coordinator.run_test_array(
        units,
        Some(Box::new(move || {
            if let Err(err) = stop.stop() {
                warn!(error = %err, "failed to stop primary loop");
            }
        })),
    )?;

    tokio::select! {
        _ = primary_loop.run() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                bail!("failed to listen for Ctrl+C: {e}");
            }
            bail!("interrupted before run {} completed", handle.run_id());
        }
    }

    let report = handle.report().await?;
    print_report(&report);
    Ok(report.all_passed())
}

/// Merge CLI overrides into the suite's `[config]` section.
fn coordinator_options(cfg: &SuiteConfig, args: &CliArgs) -> Result<CoordinatorOptions> {
    let default_timeout = match args.timeout {
        Some(secs) => timeout_from_secs("--timeout", secs)?,
        None => cfg.config.default_timeout(),
    };

    Ok(CoordinatorOptions {
        build_mode: args.build_mode.unwrap_or(cfg.config.build_mode),
        settings: RunSettings {
            default_timeout,
            should_wait_for_debugger: args.wait_for_debugger || cfg.config.wait_for_debugger,
        },
    })
}

/// Figure out the directory tests run in.
///
/// - If the config path has a non-empty parent (e.g. "suites/Testctl.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Testctl.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn build_units(cfg: &SuiteConfig, platform: &str, root_dir: &Path) -> Vec<UnitRef> {
    cfg.test
        .iter()
        .map(|(name, test)| UnitRef::new(CommandUnit::from_config(name, test, platform, root_dir)))
        .collect()
}

/// Wait for the run to reach the gate, then treat the next line on stdin as
/// the developer's acknowledgment.
fn spawn_debugger_ack(coordinator: RunCoordinator) {
    tokio::spawn(async move {
        let mut states = coordinator.subscribe();
        if states
            .wait_for(|s| *s == RunState::AwaitingDebugAck)
            .await
            .is_err()
        {
            return;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(_) => {
                if let Err(err) = coordinator.acknowledge_debugger() {
                    warn!(error = %err, "debugger acknowledgment rejected");
                }
            }
            Err(err) => warn!(error = %err, "failed to read debugger acknowledgment from stdin"),
        }
    });
}

/// Simple dry-run output: print settings and the units that would run.
fn print_dry_run(options: &CoordinatorOptions, platform: &str, units: Vec<UnitRef>) {
    println!("testctl dry-run");
    println!("  build_mode = {}", options.build_mode);
    println!("  platform = {platform}");
    println!(
        "  default_timeout = {:?}",
        options.settings.default_timeout
    );
    println!(
        "  wait_for_debugger = {} (effective: {})",
        options.settings.should_wait_for_debugger,
        options.settings.should_wait_for_debugger && options.build_mode.is_debug()
    );
    println!();

    let total = units.len();
    let run_set = select_run_set(units);
    println!("selected {} of {total} tests:", run_set.len());
    for name in run_set.names() {
        println!("  - {name}");
    }
    if run_set.skipped_unsupported() > 0 {
        println!("  ({} unsupported on {platform})", run_set.skipped_unsupported());
    }
    if run_set.focus_applied() {
        println!("  ({} skipped: not focused)", run_set.skipped_unfocused());
    }

    debug!("dry-run complete (no execution)");
}

fn print_report(report: &RunReport) {
    println!("run {} finished", report.run_id);
    for result in &report.results {
        match &result.outcome {
            UnitOutcome::Passed => println!("  ok    {} ({:?})", result.name, result.duration),
            UnitOutcome::Failed(reason) => {
                println!("  FAIL  {} ({:?}): {reason}", result.name, result.duration)
            }
            UnitOutcome::Panicked(reason) => {
                println!("  PANIC {} ({:?}): {reason}", result.name, result.duration)
            }
        }
    }
    println!(
        "{} passed, {} failed, {} unsupported, {} unfocused",
        report.passed(),
        report.failed(),
        report.skipped_unsupported,
        report.skipped_unfocused
    );
    info!(run_id = report.run_id, all_passed = report.all_passed(), "run reported");
}
