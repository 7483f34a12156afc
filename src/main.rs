use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};

mod calc;
mod extract;
mod models;
mod report;
mod settings;

use models::{AccountingMode, RawData, SortKey, Theme};
use settings::Settings;

#[derive(Parser)]
#[command(name = "attendance-insight")]
#[command(about = "Attendance projections and risk tracking from ERP exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, compute, and print the sorted subject summary
    #[command(group(
        ArgGroup::new("input")
            .args(["html", "csv"])
            .multiple(false)
    ))]
    Analyze {
        /// Saved attendance page to extract
        #[arg(long)]
        html: Option<PathBuf>,
        /// CSV export to extract
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f64>,
        /// danger, name, or percentage
        #[arg(long)]
        sort: Option<String>,
        /// standard or carry-forward-corrected
        #[arg(long)]
        mode: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    #[command(group(
        ArgGroup::new("input")
            .args(["html", "csv"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        html: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        theme: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let dir = settings::data_dir();

    match cli.command {
        Commands::Analyze {
            html,
            csv,
            threshold,
            sort,
            mode,
            limit,
        } => {
            let run = effective_settings(&dir, threshold, sort, mode);
            let (raw, captured_at) = load_input(&dir, html, csv)?;

            let mut subjects =
                calc::process_all_subjects(&raw, run.clamped_threshold(), run.mode);
            calc::sort_subjects(&mut subjects, run.sort_by);
            let stats = calc::aggregate_stats(&subjects);

            if stats.subject_count == 0 {
                println!("No subjects extracted.");
                return Ok(());
            }

            println!(
                "{} subjects, mean attendance {:.1}% (threshold {:.0}%)",
                stats.subject_count,
                stats.mean_percentage,
                run.clamped_threshold()
            );
            println!(
                "{} safe, {} borderline, {} critical",
                stats.safe, stats.borderline, stats.critical
            );
            if let Some(at_risk) = &stats.most_at_risk {
                println!(
                    "Most at risk: {} ({}) at {:.1}%",
                    at_risk.course_name, at_risk.course_code, at_risk.percentage
                );
            }
            if let Some(captured_at) = captured_at {
                println!("Data captured {}", captured_at.format("%Y-%m-%d %H:%M UTC"));
            }
            println!();
            for subject in subjects.iter().take(limit) {
                println!("{}", report::summarize_subject(subject));
            }
        }
        Commands::Report {
            html,
            csv,
            threshold,
            sort,
            mode,
            out,
        } => {
            let run = effective_settings(&dir, threshold, sort, mode);
            let (raw, captured_at) = load_input(&dir, html, csv)?;

            let mut subjects =
                calc::process_all_subjects(&raw, run.clamped_threshold(), run.mode);
            calc::sort_subjects(&mut subjects, run.sort_by);
            let stats = calc::aggregate_stats(&subjects);

            let markdown = report::build_report(
                &subjects,
                &stats,
                run.clamped_threshold(),
                run.mode,
                captured_at,
            );
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let current = settings::load_settings(&dir);
                println!("threshold: {:.0}", current.clamped_threshold());
                println!("sort: {}", current.sort_by.as_str());
                println!("mode: {}", current.mode.as_str());
                println!("theme: {}", current.theme.as_str());
            }
            ConfigAction::Set {
                threshold,
                sort,
                mode,
                theme,
            } => {
                let mut current = settings::load_settings(&dir);
                if let Some(threshold) = threshold {
                    current.threshold = threshold.clamp(0.0, 100.0);
                }
                if let Some(sort) = sort {
                    current.sort_by = SortKey::parse_or_default(&sort);
                }
                if let Some(mode) = mode {
                    current.mode = AccountingMode::parse_or_default(&mode);
                }
                if let Some(theme) = theme {
                    current.theme = Theme::parse_or_default(&theme);
                }
                settings::save_settings(&dir, &current)?;
                println!("Settings saved.");
            }
        },
    }

    Ok(())
}

/// Persisted settings with per-run flag overrides. Unknown sort or mode
/// strings fall back to the defaults rather than erroring.
fn effective_settings(
    dir: &std::path::Path,
    threshold: Option<f64>,
    sort: Option<String>,
    mode: Option<String>,
) -> Settings {
    let mut run = settings::load_settings(dir);
    if let Some(threshold) = threshold {
        run.threshold = threshold;
    }
    if let Some(sort) = sort {
        run.sort_by = SortKey::parse_or_default(&sort);
    }
    if let Some(mode) = mode {
        run.mode = AccountingMode::parse_or_default(&mode);
    }
    run
}

/// Raw data from the requested source, or the saved snapshot when no source
/// is given. Fresh extractions replace the snapshot.
fn load_input(
    dir: &std::path::Path,
    html: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> anyhow::Result<(RawData, Option<DateTime<Utc>>)> {
    if let Some(path) = html {
        let raw = extract::from_html_file(&path)?;
        let snapshot = settings::save_snapshot(dir, &raw)?;
        return Ok((raw, Some(snapshot.captured_at)));
    }
    if let Some(path) = csv {
        let raw = extract::from_csv_file(&path)?;
        let snapshot = settings::save_snapshot(dir, &raw)?;
        return Ok((raw, Some(snapshot.captured_at)));
    }
    let snapshot = settings::load_snapshot(dir)
        .context("no saved snapshot; pass --html or --csv to extract fresh data")?;
    Ok((snapshot.subjects, Some(snapshot.captured_at)))
}
