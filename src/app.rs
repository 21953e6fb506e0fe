//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - runs the reconciliation pipeline
//! - prints reports or launches the dashboard
//! - writes optional exports

use std::time::Duration;

use clap::Parser;

use crate::cli::{CheckArgs, Command, ReportArgs, TuiArgs};
use crate::data::cache::HttpFetcher;
use crate::domain::{PipelineConfig, SourceKey};
use crate::error::AppError;
use crate::recon::Engine;
use crate::report::{Adjustment, adjusted_rows, display_rows, facility_totals, summarize};

pub mod pipeline;

/// Entry point for the `gasb` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `gasb` and `gasb -a 60` behave like `gasb tui ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Tui(args) => handle_tui(args),
        Command::Report(args) => handle_report(args),
        Command::Check(args) => handle_check(args),
    }
}

pub fn build_engine(config: PipelineConfig) -> Result<Engine<HttpFetcher>, AppError> {
    let fetcher = HttpFetcher::new(config.timeout)?;
    Ok(Engine::new(config, fetcher))
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    let config = args.pipeline.to_config();
    crate::logging::init_file(&args.pipeline.log, &config.cache_dir)?;

    let engine = build_engine(config)?;
    let memo = pipeline::ModelMemo::new(engine, Duration::from_secs(args.memo_secs));
    crate::tui::run(memo, Adjustment::new(args.adjustment))
}

fn handle_report(args: ReportArgs) -> Result<(), AppError> {
    crate::logging::init_stderr(&args.pipeline.log);

    let engine = build_engine(args.pipeline.to_config())?;
    let reconciled = engine.reconcile(args.refresh);
    let adjustment = Adjustment::new(args.adjustment);

    let (rows, origin) = display_rows(&reconciled.model);
    let shown = adjusted_rows(&rows, adjustment);
    let summary = summarize(&shown);

    println!(
        "{}",
        crate::report::format_run_summary(&reconciled, &summary, origin, adjustment)
    );
    if args.facilities {
        println!("{}", crate::report::format_facilities(&facility_totals(&reconciled)));
    }
    println!("{}", crate::report::format_daily_table(&shown));

    // Exports carry the canonical model only, never the placeholder.
    if let Some(path) = &args.export_model {
        crate::io::export::write_model_csv(path, &reconciled.model, adjustment)?;
    }
    if let Some(path) = &args.export_supply {
        crate::io::export::write_supply_csv(path, &reconciled.supply)?;
    }

    Ok(())
}

fn handle_check(args: CheckArgs) -> Result<(), AppError> {
    crate::logging::init_stderr(&args.pipeline.log);

    let engine = build_engine(args.pipeline.to_config())?;
    let keys: Vec<SourceKey> = match args.source {
        Some(key) => vec![key],
        None => SourceKey::ALL.to_vec(),
    };

    let mut failures = 0usize;
    for key in &keys {
        match engine.reader().cache().fetch(*key, true) {
            Ok(bytes) => {
                let rows = crate::data::reader::parse_csv(&bytes)
                    .map(|t| t.len())
                    .unwrap_or(0);
                println!("ok    {:<11} {:>8} rows  {:>10} bytes", key.as_str(), rows, bytes.len());
            }
            Err(err) => {
                failures += 1;
                println!("FAIL  {:<11} {err}", key.as_str());
            }
        }
    }

    if args.source.is_none() {
        let reconciled = engine.reconcile(false);
        println!(
            "model {:>8} days  supply {:>8} rows  fallback: {}",
            reconciled.model.len(),
            reconciled.supply.len(),
            crate::report::fmt_fallback(reconciled.fallback),
        );
    }

    if failures > 0 {
        return Err(AppError::new(
            4,
            format!("{failures} of {} sources unavailable.", keys.len()),
        ));
    }
    Ok(())
}

/// Rewrite argv so `gasb` defaults to `gasb tui`.
///
/// Rules:
/// - `gasb`                     -> `gasb tui`
/// - `gasb -a 60 ...`           -> `gasb tui -a 60 ...`
/// - `gasb --help/--version/-h` -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "tui" | "report" | "check");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_launches_tui() {
        assert_eq!(rewrite_args(args(&["gasb"])), args(&["gasb", "tui"]));
        assert_eq!(
            rewrite_args(args(&["gasb", "-a", "60"])),
            args(&["gasb", "tui", "-a", "60"])
        );
    }

    #[test]
    fn subcommands_and_help_pass_through() {
        assert_eq!(rewrite_args(args(&["gasb", "report"])), args(&["gasb", "report"]));
        assert_eq!(rewrite_args(args(&["gasb", "--help"])), args(&["gasb", "--help"]));
    }
}
