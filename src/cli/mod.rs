//! # CLI Module
//!
//! Command-line interface for the file sorting engine.
//!
//! ## Usage
//! ```bash
//! # Copy everything from Downloads into category folders
//! smartfile sort ~/Downloads ~/Sorted
//!
//! # Move instead of copy, skip files that already exist
//! smartfile sort ~/Downloads ~/Sorted --move --conflict skip
//!
//! # Let the model override rules when confident
//! smartfile sort ~/Downloads ~/Sorted --ml --threshold 0.8
//!
//! # JSON report for scripting
//! smartfile sort ~/Downloads ~/Sorted --output json
//!
//! # Inspect the model and the rule table
//! smartfile model status
//! smartfile rules
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use smartfile_flow::core::classifier::ClassifierAdapter;
use smartfile_flow::core::resolver::ConflictPolicy;
use smartfile_flow::core::settings::Settings;
use smartfile_flow::core::sorter::{RunOutcome, RunReport, SortEngine};
use smartfile_flow::error::{ConfigError, Result};
use smartfile_flow::events::{Event, FileEvent, RunEvent};
use std::path::{Path, PathBuf};
use std::thread;

/// SmartFile Flow - Sort a folder into category folders
#[derive(Parser, Debug)]
#[command(name = "smartfile")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sort files from SOURCE into category folders under TARGET
    Sort {
        /// Directory to sort
        source: PathBuf,

        /// Directory that receives the category folders
        target: PathBuf,

        /// Move files instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        /// Consult the classification model
        #[arg(long)]
        ml: bool,

        /// What to do when a destination file already exists
        #[arg(short, long)]
        conflict: Option<ConflictArg>,

        /// Directory holding category_vectors.json
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Minimum model confidence (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Settings file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Inspect the classification model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Print the extension rule table
    Rules {
        /// Settings file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
enum ModelAction {
    /// Try to load the model and print its status
    Status {
        /// Directory holding category_vectors.json
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Settings file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConflictArg {
    /// Keep both, numbering the new file (default)
    Rename,
    /// Leave the existing file and skip the new one
    Skip,
    /// Replace the existing file
    Overwrite,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Rename => ConflictPolicy::Rename,
            ConflictArg::Skip => ConflictPolicy::Skip,
            ConflictArg::Overwrite => ConflictPolicy::Overwrite,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sort {
            source,
            target,
            move_files,
            ml,
            conflict,
            model_dir,
            threshold,
            include_hidden,
            config,
            output,
            verbose,
        } => {
            smartfile_flow::init_tracing(if verbose { "debug" } else { "warn" });

            let mut settings = Settings::load(config.as_deref())?;
            if move_files {
                settings.sort.copy_files = false;
            }
            if ml {
                settings.sort.use_ml = true;
            }
            if let Some(conflict) = conflict {
                settings.sort.conflict_resolution = conflict.into();
            }
            if let Some(dir) = model_dir {
                settings.ml.model_dir = dir;
            }
            if let Some(threshold) = threshold {
                settings.ml.confidence_threshold = check_threshold(threshold)?;
            }
            if include_hidden {
                settings.scan.include_hidden = true;
            }

            run_sort(&settings, &source, &target, output, verbose)
        }
        Commands::Model {
            action: ModelAction::Status { model_dir, config },
        } => {
            smartfile_flow::init_tracing("error");
            let mut settings = Settings::load(config.as_deref())?;
            if let Some(dir) = model_dir {
                settings.ml.model_dir = dir;
            }
            run_model_status(&settings);
            Ok(())
        }
        Commands::Rules { config, output } => {
            let settings = Settings::load(config.as_deref())?;
            print_rules(&settings, output);
            Ok(())
        }
    }
}

fn check_threshold(threshold: f32) -> std::result::Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ConfigError::InvalidSettings {
            path: PathBuf::from("--threshold"),
            reason: format!("{} must be within 0.0..=1.0", threshold),
        })
    }
}

fn run_sort(
    settings: &Settings,
    source: &Path,
    target: &Path,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("SmartFile Flow").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let engine = SortEngine::from_settings(settings);
    engine.set_directories(source, target);

    // Progress bar for pretty output
    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let (receiver, run) = engine.start()?.into_parts();
    let progress_clone = progress.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = progress_clone.as_ref() else {
                continue;
            };
            match event {
                Event::Run(RunEvent::Started { total }) => {
                    pb.set_length(total as u64);
                    pb.set_message("sorting");
                }
                Event::Run(RunEvent::Progress(p)) => {
                    pb.set_position(p.stats.processed() as u64);
                    if verbose {
                        pb.set_message(
                            p.current_path
                                .file_name()
                                .unwrap_or_default()
                                .to_string_lossy()
                                .into_owned(),
                        );
                    }
                }
                Event::File(FileEvent::Failed { source, message, .. }) => {
                    pb.println(format!(
                        "{} {}: {}",
                        style("✗").red(),
                        source.display(),
                        message
                    ));
                }
                Event::File(FileEvent::Sorted {
                    source,
                    destination,
                    ..
                }) if verbose => {
                    pb.println(format!(
                        "{} {} -> {}",
                        style("✓").green(),
                        source.display(),
                        destination.display()
                    ));
                }
                Event::Run(RunEvent::Finished { .. }) | Event::Run(RunEvent::Failed { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = run.join();

    // The worker dropped its sender, so the event thread ends
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = result?;

    match output {
        OutputFormat::Pretty => print_pretty_report(&term, &report, &engine),
        OutputFormat::Json => print_json(&report),
    }

    Ok(())
}

fn print_pretty_report(term: &Term, report: &RunReport, engine: &SortEngine) {
    let headline = match report.outcome {
        RunOutcome::Completed => format!("{} Sort Complete", style("✓").green().bold()),
        RunOutcome::CompletedWithErrors => {
            format!("{} Sort Complete with errors", style("!").yellow().bold())
        }
        RunOutcome::Cancelled => format!("{} Sort Cancelled", style("✗").red().bold()),
    };
    term.write_line(&headline).ok();
    term.write_line("").ok();

    let stats = &report.stats;
    term.write_line(&format!(
        "  {} files found in {:.1}s",
        style(stats.total).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!("  {} sorted", style(stats.sorted).green())).ok();
    if stats.skipped > 0 {
        term.write_line(&format!("  {} skipped", style(stats.skipped).yellow()))
            .ok();
    }
    if stats.failed > 0 {
        term.write_line(&format!("  {} failed", style(stats.failed).red())).ok();
    }
    if report.scan_errors > 0 {
        term.write_line(&format!(
            "  {} unreadable entries",
            style(report.scan_errors).dim()
        ))
        .ok();
    }

    if !report.by_category.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("By category:").bold().underlined()))
            .ok();
        for (category, count) in &report.by_category {
            term.write_line(&format!("  {:<16} {}", category, style(count).cyan()))
                .ok();
        }
    }

    if engine.use_ml() {
        term.write_line("").ok();
        term.write_line(&format!(
            "  {} by rule, {} by model, {} fallback",
            report.by_source.rule, report.by_source.model, report.by_source.fallback
        ))
        .ok();
        term.write_line(&format!("  {}", style(engine.ml_info()).dim())).ok();
    }

    term.write_line("").ok();
    let footer = if engine.copy_files() {
        "Originals were kept. Nothing was deleted from the source."
    } else {
        "Sorted files were moved out of the source."
    };
    term.write_line(&format!("{}", style(footer).dim())).ok();
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!(error = %e, "Failed to serialize output"),
    }
}

fn run_model_status(settings: &Settings) {
    let term = Term::stdout();
    let adapter = ClassifierAdapter::from_model_dir(
        &settings.ml.model_dir,
        settings.ml.confidence_threshold,
    );
    adapter.set_enabled(settings.sort.use_ml);

    let marker = match adapter.load() {
        Ok(()) => style("✓").green().bold(),
        Err(_) => style("✗").yellow().bold(),
    };

    term.write_line(&format!("{} {}", marker, adapter.status_summary()))
        .ok();
    term.write_line(&format!(
        "  {}",
        style(adapter.model_location().display()).dim()
    ))
    .ok();
}

fn print_rules(settings: &Settings, output: OutputFormat) {
    let table = settings.category_rules().table();

    match output {
        OutputFormat::Json => print_json(&table),
        OutputFormat::Pretty => {
            let term = Term::stdout();
            for (category, extensions) in &table {
                term.write_line(&format!(
                    "{:<14} {}",
                    style(category).bold(),
                    extensions.join(" ")
                ))
                .ok();
            }
            term.write_line(&format!(
                "{:<14} {}",
                style("Other").bold(),
                style("everything else").dim()
            ))
            .ok();
        }
    }
}
