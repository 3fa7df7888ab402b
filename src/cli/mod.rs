//! SLAMD Discovery CLI Module
//!
//! Command-line interface for ranking candidate experiments.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::discovery::{
    uncertainty_column, DiscoveryExperiment, ExperimentConfig, NOVELTY_COLUMN, ROW_NUMBER_COLUMN,
    UTILITY_COLUMN,
};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "slamd-discovery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rank candidate experiments by explore/exploit utility")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit surrogates and rank the unlabeled rows
    Run {
        /// Input data file (CSV, JSON lines, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Experiment configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Write the ranked table to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of candidates to print
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Check configuration and labeling without fitting
    Validate {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Experiment configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

// ─── Loading ───────────────────────────────────────────────────────────────────

pub fn load_config(path: &Path) -> anyhow::Result<ExperimentConfig> {
    let json = std::fs::read_to_string(path)?;
    Ok(ExperimentConfig::from_json(&json)?)
}

fn load_inputs(data_path: &Path, config_path: &Path) -> anyhow::Result<(DataFrame, DiscoveryExperiment)> {
    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_auto(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let config = load_config(config_path)?;
    let experiment = DiscoveryExperiment::new(config)?;
    step_ok(&format!(
        "Configuration: {} target(s), {} feature(s), backend {}",
        experiment.config().targets.len(),
        experiment.config().features.len(),
        experiment.config().model.to_string().cyan()
    ));
    Ok((df, experiment))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data_path: &Path,
    config_path: &Path,
    output: Option<&Path>,
    top: usize,
) -> anyhow::Result<()> {
    section("Discovery");

    let (df, experiment) = load_inputs(data_path, config_path)?;

    step_run("Fitting surrogates and scoring");
    let start = Instant::now();
    let mut result = experiment.run(&df)?;
    step_done(&format!("{} candidates in {:?}", result.ranked.height(), start.elapsed()));

    print_top_candidates(&result.ranked, &experiment.config().target_names(), top)?;

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        DataSaver::save_csv(&mut result.ranked, path)?;
        step_done(&format!("{} rows × {} cols", result.ranked.height(), result.ranked.width()));
    }

    println!();
    Ok(())
}

pub fn cmd_validate(data_path: &Path, config_path: &Path) -> anyhow::Result<()> {
    section("Validate");

    let (df, experiment) = load_inputs(data_path, config_path)?;
    let labels = experiment.check(&df)?;

    println!();
    println!("  {:<12} {}", muted("Rows"), labels.n_rows());
    println!("  {:<12} {}", muted("Labeled"), labels.labeled.len());
    println!("  {:<12} {}", muted("Candidates"), labels.unlabeled.len());
    println!();
    step_ok("Ready to run");
    println!();
    Ok(())
}

fn print_top_candidates(ranked: &DataFrame, targets: &[String], top: usize) -> anyhow::Result<()> {
    let top = ranked.head(Some(top));
    let row_numbers = top.column(ROW_NUMBER_COLUMN)?.cast(&DataType::UInt32)?;
    let row_numbers = row_numbers.as_materialized_series().u32()?;
    let utility = top.column(UTILITY_COLUMN)?.as_materialized_series().f64()?;
    let novelty = top.column(NOVELTY_COLUMN)?.as_materialized_series().f64()?;

    let mut target_columns = Vec::with_capacity(targets.len());
    for target in targets {
        let mean = top.column(target)?.as_materialized_series().f64()?;
        let std = top
            .column(&uncertainty_column(target))?
            .as_materialized_series()
            .f64()?;
        target_columns.push((mean, std));
    }

    println!();
    let mut header = format!("  {:>4} {:>12} {:>9}", "#", UTILITY_COLUMN, NOVELTY_COLUMN);
    for target in targets {
        header.push_str(&format!(" {:>22}", truncate(target, 22)));
    }
    println!("{}", muted(&header));
    println!("  {}", dim(&"─".repeat(header.len().saturating_sub(2))));

    for i in 0..top.height() {
        let mut line = format!(
            "{:>4} {:>12} {:>9}",
            row_numbers.get(i).unwrap_or_default(),
            format!("{:.4}", utility.get(i).unwrap_or(f64::NAN)),
            format!("{:.3}", novelty.get(i).unwrap_or(f64::NAN)),
        );
        for (mean, std) in &target_columns {
            line.push_str(&format!(
                " {:>22}",
                format!(
                    "{:.3} ± {:.3}",
                    mean.get(i).unwrap_or(f64::NAN),
                    std.get(i).unwrap_or(f64::NAN)
                )
            ));
        }
        if i == 0 {
            println!("  {}", line.white().bold());
        } else {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width - 1).collect();
        out.push('…');
        out
    }
}
