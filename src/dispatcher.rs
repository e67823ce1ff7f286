//! Bounded fan-out of classification work.
//!
//! One task per candidate file runs on a fixed-size rayon pool, and each task
//! must also hold an [`AdmissionPermit`](crate::admission::AdmissionPermit)
//! while it decodes, classifies and relocates. `run` returns only after every
//! task has finished. Nothing that happens inside a task escapes it: relocation
//! errors and panics become [`TaskFailure`]s in the [`RunReport`].

use crate::admission::{AdmissionGate, CancelToken};
use crate::category::Category;
use crate::classifier::{Classifier, Verdict};
use crate::enumerate::CandidateFile;
use crate::output::OutputFormatter;
use crate::registry::DuplicateRegistry;
use crate::relocator::{Operation, RelocateError, Relocator};
use indicatif::ProgressBar;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// Default ceiling on concurrently admitted files.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Why a task did not place its file.
#[derive(Debug)]
pub enum TaskFailure {
    /// The run was cancelled before the file was admitted.
    Interrupted,
    /// Classification succeeded but the move failed. The file stays put.
    Relocation {
        category: Category,
        error: RelocateError,
    },
    /// The task panicked. The message is the panic payload, if printable.
    Panicked(String),
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFailure::Interrupted => write!(f, "interrupted before processing"),
            TaskFailure::Relocation { category, error } => {
                write!(f, "could not move [{}]: {}", category.label(), error)
            }
            TaskFailure::Panicked(message) => write!(f, "unexpected failure: {}", message),
        }
    }
}

/// A file that was classified and moved.
#[derive(Debug)]
pub struct Placement {
    pub verdict: Verdict,
    pub operation: Operation,
}

/// What happened to one candidate file.
#[derive(Debug)]
pub struct FileOutcome {
    pub file: CandidateFile,
    pub result: Result<Placement, TaskFailure>,
}

/// Aggregated results of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Number of candidate files dispatched.
    pub total: usize,
    /// Files per category, counting every file that was classified,
    /// whether or not the move succeeded.
    pub classified: BTreeMap<Category, usize>,
    /// Successful moves, in enumeration order.
    pub operations: Vec<Operation>,
    /// Files that were classified or attempted but not placed.
    pub failures: Vec<(CandidateFile, TaskFailure)>,
    /// Files never admitted because the run was cancelled.
    pub skipped: usize,
    /// True if cancellation was requested during the run.
    pub interrupted: bool,
    /// Highest number of files admitted at the same time.
    pub peak_in_flight: usize,
    /// Distinct fingerprints claimed.
    pub unique_images: usize,
}

impl RunReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome.result {
            Ok(placement) => {
                *self.classified.entry(placement.verdict.category).or_insert(0) += 1;
                self.operations.push(placement.operation);
            }
            Err(TaskFailure::Interrupted) => self.skipped += 1,
            Err(failure) => {
                if let TaskFailure::Relocation { category, .. } = &failure {
                    *self.classified.entry(*category).or_insert(0) += 1;
                }
                self.failures.push((outcome.file, failure));
            }
        }
    }

    /// Number of files classified as `category`.
    pub fn count(&self, category: Category) -> usize {
        self.classified.get(&category).copied().unwrap_or(0)
    }

    /// Files routed to the invalid root, across every invalid reason.
    pub fn invalid_count(&self) -> usize {
        self.classified
            .iter()
            .filter(|(category, _)| category.is_invalid())
            .map(|(_, count)| count)
            .sum()
    }

    /// True when every dispatched file was placed.
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0 && !self.interrupted
    }
}

/// Runs classification and relocation for a batch of files under a
/// concurrency ceiling.
pub struct Dispatcher {
    classifier: Classifier,
    relocator: Box<dyn Relocator>,
    registry: DuplicateRegistry,
    gate: AdmissionGate,
    pool: ThreadPool,
    cancel: CancelToken,
    progress: ProgressBar,
    verbose: bool,
}

impl Dispatcher {
    /// Creates a dispatcher admitting at most `max_concurrent` files at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be started.
    pub fn new(
        max_concurrent: usize,
        classifier: Classifier,
        relocator: Box<dyn Relocator>,
    ) -> Result<Self, ThreadPoolBuildError> {
        let max_concurrent = max_concurrent.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_concurrent)
            .thread_name(|idx| format!("image-processor-{}", idx))
            .build()?;

        Ok(Self {
            classifier,
            relocator,
            registry: DuplicateRegistry::new(),
            gate: AdmissionGate::new(max_concurrent),
            pool,
            cancel: CancelToken::new(),
            progress: ProgressBar::hidden(),
            verbose: false,
        })
    }

    /// Uses `cancel` as the stop signal for permit acquisition.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reports progress on `progress` instead of a hidden bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Prints one line per file as it completes.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The admission gate, for inspection.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Processes every file and waits for all of them.
    ///
    /// The wait itself is not interruptible: cancellation only stops new
    /// admissions, and files already admitted finish their current step.
    pub fn run(&self, files: Vec<CandidateFile>) -> RunReport {
        let total = files.len();
        self.progress.set_length(total as u64);

        let outcomes: Vec<FileOutcome> = self
            .pool
            .install(|| files.into_par_iter().map(|file| self.process(file)).collect());

        self.progress.finish_and_clear();

        let mut report = RunReport {
            total,
            ..RunReport::default()
        };
        for outcome in outcomes {
            report.record(outcome);
        }
        report.interrupted = self.cancel.is_cancelled();
        report.peak_in_flight = self.gate.peak();
        report.unique_images = self.registry.len();
        report
    }

    fn process(&self, file: CandidateFile) -> FileOutcome {
        let result = match self.gate.acquire(&self.cancel) {
            Ok(_permit) => panic::catch_unwind(AssertUnwindSafe(|| self.place(&file)))
                .unwrap_or_else(|payload| Err(TaskFailure::Panicked(panic_message(&*payload)))),
            Err(_) => Err(TaskFailure::Interrupted),
        };

        self.report_progress(&file, &result);
        FileOutcome { file, result }
    }

    /// Ticks the progress bar and prints the per-file line.
    ///
    /// The file has already been placed at this point, so a panic while
    /// printing is swallowed here. It must not unwind through the progress
    /// bar's lock or out of the worker, or the placement would be lost.
    fn report_progress(&self, file: &CandidateFile, result: &Result<Placement, TaskFailure>) {
        self.progress.inc(1);
        if self.verbose {
            self.progress.suspend(|| {
                let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                    log_outcome(file, result, self.relocator.simulated())
                }));
            });
        }
    }

    fn place(&self, file: &CandidateFile) -> Result<Placement, TaskFailure> {
        let verdict = self.classifier.classify(file, &self.registry);
        match self.relocator.relocate(file, verdict.category) {
            Ok(operation) => Ok(Placement { verdict, operation }),
            Err(error) => Err(TaskFailure::Relocation {
                category: verdict.category,
                error,
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

fn log_outcome(file: &CandidateFile, result: &Result<Placement, TaskFailure>, simulated: bool) {
    match result {
        Ok(placement) => {
            OutputFormatter::moved(&placement.operation, simulated);
            if let Some(detail) = &placement.verdict.detail {
                OutputFormatter::warning(&format!(
                    "{} [{}]: {}",
                    file.path.display(),
                    placement.verdict.category.label(),
                    detail
                ));
            }
        }
        Err(TaskFailure::Interrupted) => {}
        Err(failure) => {
            OutputFormatter::error(&format!("{}: {}", file.path.display(), failure));
        }
    }
}
