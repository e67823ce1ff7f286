/// Reverting a previous sorting run.
///
/// The history log written by a real run lists every move. Undo replays it
/// backwards, putting each file back at its original path.
use crate::relocator::{HistoryError, Operation, OperationLog};
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that could not be restored, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files no longer where the run left them.
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Set when every file was restored but the history log could not be removed.
    pub history_error: Option<String>,
}

impl UndoReport {
    /// Returns the total number of operations processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if the undo was completely successful.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

/// Errors that prevent an undo from starting.
#[derive(Debug)]
pub enum UndoError {
    /// The destination root does not exist.
    InvalidDestination(PathBuf),
    /// There is no history log to replay.
    NoHistory(PathBuf),
    /// The history log could not be read.
    History(HistoryError),
}

impl std::fmt::Display for UndoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDestination(path) => {
                write!(f, "Destination directory doesn't exist: {}", path.display())
            }
            Self::NoHistory(path) => {
                write!(f, "No previous run found to undo in {}", path.display())
            }
            Self::History(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for UndoError {}

impl From<HistoryError> for UndoError {
    fn from(e: HistoryError) -> Self {
        Self::History(e)
    }
}

/// Manages undo operations for sorting runs.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the run whose history lives in `destination_root`.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: skipped
    /// * **Original path taken**: the occupant is backed up with a timestamp suffix
    /// * **Missing parent directory**: recreated
    /// * **Permission denied**: recorded as a failure
    ///
    /// The history log is deleted only if every file was restored. Failing to
    /// delete it does not fail the undo; see [`UndoReport::history_error`].
    ///
    /// ```no_run
    /// use picsort::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/path/to/photos")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(destination_root: &Path) -> Result<UndoReport, UndoError> {
        if !destination_root.is_dir() {
            return Err(UndoError::InvalidDestination(destination_root.to_path_buf()));
        }

        let log = OperationLog::load(destination_root)?
            .ok_or_else(|| UndoError::NoHistory(destination_root.to_path_buf()))?;

        let mut report = UndoReport::default();
        for operation in log.operations.iter().rev() {
            match Self::restore_file(operation) {
                Ok(()) => report.restored_files += 1,
                Err(RestoreFailure::Missing(path, reason)) => {
                    report.skipped_files.push((path, reason))
                }
                Err(RestoreFailure::Failed(path, reason)) => {
                    report.failed_restores.push((path, reason))
                }
            }
        }

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(destination_root)
        {
            report.history_error = Some(e.to_string());
        }

        Ok(report)
    }

    fn restore_file(operation: &Operation) -> Result<(), RestoreFailure> {
        if !operation.new_path.exists() {
            return Err(RestoreFailure::Missing(
                operation.new_path.clone(),
                "File not found at expected location".to_string(),
            ));
        }

        if let Some(parent) = operation.original_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RestoreFailure::Failed(
                    parent.to_path_buf(),
                    format!("Could not recreate directory: {}", e),
                )
            })?;
        }

        if operation.original_path.exists() {
            let backup_path = Self::generate_backup_path(&operation.original_path);
            fs::rename(&operation.original_path, &backup_path).map_err(|e| {
                RestoreFailure::Failed(
                    operation.original_path.clone(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
        }

        fs::rename(&operation.new_path, &operation.original_path).map_err(|e| {
            RestoreFailure::Failed(
                operation.new_path.clone(),
                format!("Failed to restore file: {}", e),
            )
        })
    }

    /// `a.png` becomes `a.png.bak.20251109-143052`.
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");

        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}

enum RestoreFailure {
    Missing(PathBuf, String),
    Failed(PathBuf, String),
}
