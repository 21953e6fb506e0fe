//! Command-line parsing for the gas balance dashboard.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the pipeline code. Every pipeline option can also be set through
//! a `GASB_*` environment variable (or `.env`).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    PipelineConfig, SourceKey, DEFAULT_BASE_URL, DEFAULT_CACHE_DIR, DEFAULT_HORIZON_DAYS, DEFAULT_MAX_AGE_HOURS,
    DEFAULT_MEMO_SECS, DEFAULT_TIMEOUT_SECS,
};
use crate::report::Adjustment;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gasb", version, about = "Gas Bulletin Board supply & demand balance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the interactive dashboard.
    Tui(TuiArgs),
    /// Print the supply summary and daily balance table, optionally exporting CSV.
    Report(ReportArgs),
    /// Force-refresh every source and report what each one yielded.
    Check(CheckArgs),
}

/// Options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct PipelineArgs {
    /// Base URL of the bulletin board reports directory.
    #[arg(long, env = "GASB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory holding cached source files.
    #[arg(long, env = "GASB_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Network timeout per source (seconds).
    #[arg(long, env = "GASB_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Cached files at least this old are refetched (hours).
    #[arg(long, env = "GASB_MAX_AGE_HOURS", default_value_t = DEFAULT_MAX_AGE_HOURS)]
    pub max_age_hours: u64,

    /// Days covered by the nameplate projection when the outlook is absent.
    #[arg(long, env = "GASB_HORIZON_DAYS", default_value_t = DEFAULT_HORIZON_DAYS)]
    pub horizon_days: u32,

    /// Tracing filter directive (e.g. `info`, `gas_balance=debug`).
    #[arg(long, env = "GASB_LOG", default_value = "info")]
    pub log: String,
}

impl PipelineArgs {
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            base_url: self.base_url.clone(),
            cache_dir: self.cache_dir.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_age: Duration::from_secs(self.max_age_hours.saturating_mul(3600)),
            horizon_days: self.horizon_days,
            ..PipelineConfig::default()
        }
    }
}

/// Options for the dashboard.
#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// How long a computed model is reused before re-reading sources (seconds).
    #[arg(long, env = "GASB_MEMO_SECS", default_value_t = DEFAULT_MEMO_SECS)]
    pub memo_secs: u64,

    /// Initial consumption override (0-100, step 5).
    #[arg(short = 'a', long, default_value_t = Adjustment::DEFAULT, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub adjustment: u8,
}

/// Options for the printed report.
#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Refetch every source regardless of cache age.
    #[arg(long)]
    pub refresh: bool,

    /// Consumption override (0-100, step 5).
    #[arg(short = 'a', long, default_value_t = Adjustment::DEFAULT, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub adjustment: u8,

    /// Also print per-facility supply totals.
    #[arg(long)]
    pub facilities: bool,

    /// Export the daily model to CSV.
    #[arg(long = "export-model", value_name = "CSV")]
    pub export_model: Option<PathBuf>,

    /// Export the per-facility supply table to CSV.
    #[arg(long = "export-supply", value_name = "CSV")]
    pub export_supply: Option<PathBuf>,
}

/// Options for the connectivity check.
#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Check a single source instead of all of them.
    #[arg(long, value_enum)]
    pub source: Option<SourceKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_flags_parse() {
        let cli = Cli::parse_from([
            "gasb",
            "report",
            "--refresh",
            "-a",
            "95",
            "--cache-dir",
            "/tmp/gbb",
            "--export-model",
            "out.csv",
        ]);
        let Command::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert!(args.refresh);
        assert_eq!(args.adjustment, 95);
        assert_eq!(args.pipeline.cache_dir, PathBuf::from("/tmp/gbb"));
        assert_eq!(args.export_model, Some(PathBuf::from("out.csv")));

        let config = args.pipeline.to_config();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/gbb"));
        assert_eq!(config.facility_class, "production");
    }

    #[test]
    fn adjustment_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["gasb", "report", "-a", "101"]).is_err());
    }

    #[test]
    fn check_accepts_a_source_key() {
        let cli = Cli::parse_from(["gasb", "check", "--source", "mto-future"]);
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.source, Some(SourceKey::MtoFuture));
    }
}
