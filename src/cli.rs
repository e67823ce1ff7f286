//! Command-line interface module for picsort.
//!
//! This module handles:
//! - Argument parsing
//! - Startup validation (the only fatal errors)
//! - Wiring enumeration, the dispatcher and the relocator together
//! - Undo of a previous run

use crate::admission::CancelToken;
use crate::category::Category;
use crate::classifier::Classifier;
use crate::config::{ConfigError, SorterConfig};
use crate::dispatcher::{Dispatcher, RunReport};
use crate::enumerate::enumerate_images;
use crate::output::OutputFormatter;
use crate::relocator::{DryRunRelocator, FileRelocator, OperationLog, RelocateError, Relocator};
use crate::undo::{UndoError, UndoManager, UndoReport};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Sort an image tree into valid, invalid and duplicate directories.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory tree to sort
    pub source: PathBuf,

    /// Base directory for valid_images/, invalid_images/ and duplicate_images/
    /// [default: SOURCE]
    pub destination: Option<PathBuf>,

    /// Classify and report without moving anything
    #[arg(long)]
    pub dry_run: bool,

    /// Move the files of the previous run back to where they came from
    #[arg(long, conflicts_with = "dry_run")]
    pub undo: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only print the summary
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// The base directory for the category roots.
    pub fn destination_root(&self) -> &Path {
        self.destination.as_deref().unwrap_or(&self.source)
    }
}

/// Errors that stop a run before any file is touched.
#[derive(Debug)]
pub enum SortError {
    /// The source directory is missing or not a directory.
    InvalidSource(PathBuf),
    /// Configuration could not be loaded or compiled.
    Config(ConfigError),
    /// The worker pool could not be started.
    WorkerPool(String),
    /// The category roots could not be created.
    Prepare(RelocateError),
    /// Undo could not start.
    Undo(UndoError),
}

impl std::fmt::Display for SortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSource(path) => {
                write!(f, "Source directory doesn't exist: {}", path.display())
            }
            Self::Config(e) => write!(f, "Error loading configuration: {}", e),
            Self::WorkerPool(reason) => write!(f, "Could not start workers: {}", reason),
            Self::Prepare(e) => write!(f, "Could not prepare destination: {}", e),
            Self::Undo(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SortError {}

impl From<ConfigError> for SortError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Runs the command described by `args`.
///
/// `cancel` stops admission of new files when triggered; the run still waits
/// for admitted files and returns a report marked as interrupted.
///
/// ```no_run
/// use clap::Parser;
/// use picsort::admission::CancelToken;
/// use picsort::cli::{Args, run_cli};
///
/// let args = Args::parse_from(["picsort", "/path/to/photos"]);
/// match run_cli(&args, CancelToken::new()) {
///     Ok(outcome) => println!("{:?}", outcome),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(args: &Args, cancel: CancelToken) -> Result<CliOutcome, SortError> {
    if args.undo {
        return undo_run(args.destination_root()).map(CliOutcome::Undone);
    }
    sort_directory(args, cancel).map(CliOutcome::Sorted)
}

/// What a successful invocation did.
#[derive(Debug)]
pub enum CliOutcome {
    Sorted(RunReport),
    Undone(UndoReport),
}

impl CliOutcome {
    /// True if the sorting run was cut short by cancellation.
    pub fn interrupted(&self) -> bool {
        matches!(self, CliOutcome::Sorted(report) if report.interrupted)
    }
}

/// Sorts the tree at `args.source` into the destination roots.
pub fn sort_directory(args: &Args, cancel: CancelToken) -> Result<RunReport, SortError> {
    let source = args.source.as_path();
    if !source.is_dir() {
        return Err(SortError::InvalidSource(source.to_path_buf()));
    }
    let destination = args.destination_root();

    let config = SorterConfig::load(args.config.as_deref())?;
    let filters = config.compile_filters()?;
    let settings = &config.sorter;

    let relocator: Box<dyn Relocator> = if args.dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", source.display()));
        Box::new(DryRunRelocator::new(destination))
    } else {
        OutputFormatter::info(&format!("Sorting images in: {}", source.display()));
        let relocator = FileRelocator::new(destination);
        relocator.prepare().map_err(SortError::Prepare)?;
        Box::new(relocator)
    };

    let enumeration = enumerate_images(source, destination, settings, &filters);
    for (path, reason) in &enumeration.unreadable {
        OutputFormatter::warning(&format!("Skipping {}: {}", path.display(), reason));
    }

    let files = enumeration.candidates;
    if files.is_empty() {
        OutputFormatter::plain("No images found to sort.");
        return Ok(RunReport::default());
    }
    OutputFormatter::plain(&format!(
        "Found {} images, processing up to {} at a time",
        files.len(),
        settings.max_concurrent
    ));

    let progress = OutputFormatter::create_progress_bar(files.len() as u64, !args.quiet);
    let dispatcher = Dispatcher::new(
        settings.max_concurrent,
        Classifier::from_settings(settings),
        relocator,
    )
    .map_err(|e| SortError::WorkerPool(e.to_string()))?
    .with_cancel_token(cancel)
    .with_progress(progress)
    .verbose(!args.quiet);

    let report = dispatcher.run(files);

    if !args.dry_run && !report.operations.is_empty() {
        let mut log = OperationLog::new(source.to_path_buf(), destination.to_path_buf());
        for operation in &report.operations {
            log.add_operation(operation.clone());
        }
        match log.save(destination) {
            Ok(()) => OutputFormatter::plain(&format!(
                "History saved. Use 'picsort {} {} --undo' to revert changes.",
                source.display(),
                destination.display()
            )),
            Err(e) => OutputFormatter::warning(&format!("Could not save history: {}", e)),
        }
    }

    OutputFormatter::summary_table(&report);
    if args.dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
    } else if report.is_complete_success() {
        OutputFormatter::success(&format!(
            "Sorted {} images: {} valid, {} duplicate, {} invalid",
            report.total,
            report.count(Category::Valid),
            report.count(Category::Duplicate),
            report.invalid_count()
        ));
    } else if !report.failures.is_empty() {
        OutputFormatter::warning("Some files could not be sorted. Please review errors above.");
    }

    Ok(report)
}

/// Reverts the run recorded under `destination`.
fn undo_run(destination: &Path) -> Result<UndoReport, SortError> {
    OutputFormatter::info("Undoing previous run...");

    let report = UndoManager::undo(destination).map_err(SortError::Undo)?;
    OutputFormatter::success(&format!("Restored: {}", report.restored_files));

    if !report.skipped_files.is_empty() {
        OutputFormatter::warning(&format!("Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.failed_restores.is_empty() {
        OutputFormatter::error(&format!("Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.is_complete_success() {
        OutputFormatter::warning("History file was NOT deleted. Fix the issues and try again.");
    } else if let Some(e) = &report.history_error {
        OutputFormatter::warning(&format!("Could not delete history file: {}", e));
    }

    Ok(report)
}
