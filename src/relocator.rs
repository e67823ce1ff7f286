/// Moving classified files into their destination roots.
///
/// A file's destination is `<destination root>/<category root>/<relative path>`,
/// so each category root mirrors the layout of the source tree. Every move is
/// recorded as an [`Operation`]; a real run persists them in an
/// [`OperationLog`] so the run can be undone.
use crate::category::Category;
use crate::enumerate::CandidateFile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the history log written at the destination root.
pub const HISTORY_FILE: &str = ".picsort_history.json";

/// A single relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Where the file was before the run.
    pub original_path: PathBuf,
    /// Where the file was moved to.
    pub new_path: PathBuf,
    /// The category that decided the destination.
    pub category: Category,
}

/// Errors reported by a [`Relocator`]. None of them abort a run.
#[derive(Debug)]
pub enum RelocateError {
    /// Failed to create a parent directory under the destination root.
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    /// The operating system refused access to the source or destination.
    PermissionDenied {
        source: PathBuf,
        destination: PathBuf,
        error: io::Error,
    },
    /// Something that cannot be replaced is in the way at the destination.
    AlreadyExists {
        source: PathBuf,
        destination: PathBuf,
        error: io::Error,
    },
    /// Any other I/O failure while moving.
    Io {
        source: PathBuf,
        destination: PathBuf,
        error: io::Error,
    },
}

impl RelocateError {
    fn from_move(source: &Path, destination: &Path, error: io::Error) -> Self {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                source,
                destination,
                error,
            },
            io::ErrorKind::AlreadyExists | io::ErrorKind::IsADirectory => Self::AlreadyExists {
                source,
                destination,
                error,
            },
            _ => Self::Io {
                source,
                destination,
                error,
            },
        }
    }
}

impl std::fmt::Display for RelocateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::PermissionDenied {
                source,
                destination,
                error,
            } => write!(
                f,
                "Access denied moving {} to {}: {}",
                source.display(),
                destination.display(),
                error
            ),
            Self::AlreadyExists {
                destination, error, ..
            } => write!(f, "File already exists: {}: {}", destination.display(), error),
            Self::Io {
                source,
                destination,
                error,
            } => write!(
                f,
                "Failed to move {} to {}: {}",
                source.display(),
                destination.display(),
                error
            ),
        }
    }
}

impl std::error::Error for RelocateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DirectoryCreationFailed { source, .. } => Some(source),
            Self::PermissionDenied { error, .. }
            | Self::AlreadyExists { error, .. }
            | Self::Io { error, .. } => Some(error),
        }
    }
}

/// Result type for relocation.
pub type RelocateResult<T> = Result<T, RelocateError>;

/// Computes `destination_root/<category root>/<relative path>`.
///
/// ```
/// use picsort::category::Category;
/// use picsort::relocator::destination_for;
/// use std::path::{Path, PathBuf};
///
/// let dest = destination_for(Path::new("/out"), Path::new("2024/a.png"), Category::Duplicate);
/// assert_eq!(dest, PathBuf::from("/out/duplicate_images/2024/a.png"));
/// ```
pub fn destination_for(destination_root: &Path, relative: &Path, category: Category) -> PathBuf {
    destination_root.join(category.destination()).join(relative)
}

/// Physically places a classified file. Shared by all workers.
pub trait Relocator: Send + Sync {
    /// Moves `file` under the root for `category`.
    fn relocate(&self, file: &CandidateFile, category: Category) -> RelocateResult<Operation>;

    /// True if operations are only reported, not performed.
    fn simulated(&self) -> bool {
        false
    }
}

/// Moves files on disk, replacing whatever file is already at the target.
#[derive(Debug, Clone)]
pub struct FileRelocator {
    destination_root: PathBuf,
}

impl FileRelocator {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
        }
    }

    /// Creates the three category roots up front.
    pub fn prepare(&self) -> RelocateResult<()> {
        for root in crate::category::DESTINATION_ROOTS {
            let path = self.destination_root.join(root);
            fs::create_dir_all(&path)
                .map_err(|source| RelocateError::DirectoryCreationFailed { path, source })?;
        }
        Ok(())
    }
}

impl Relocator for FileRelocator {
    fn relocate(&self, file: &CandidateFile, category: Category) -> RelocateResult<Operation> {
        let destination = destination_for(&self.destination_root, &file.relative, category);

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| RelocateError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        move_replacing(&file.path, &destination)
            .map_err(|e| RelocateError::from_move(&file.path, &destination, e))?;

        Ok(Operation {
            original_path: file.path.clone(),
            new_path: destination,
            category,
        })
    }
}

/// Renames `source` onto `destination`, falling back to copy + remove when
/// the two paths are on different filesystems.
fn move_replacing(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            if let Err(copy_err) = fs::copy(source, destination) {
                let _ = fs::remove_file(destination);
                return Err(copy_err);
            }
            fs::remove_file(source)
        }
        Err(err) => Err(err),
    }
}

/// Reports where files would go without touching the filesystem.
#[derive(Debug, Clone)]
pub struct DryRunRelocator {
    destination_root: PathBuf,
}

impl DryRunRelocator {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
        }
    }
}

impl Relocator for DryRunRelocator {
    fn relocate(&self, file: &CandidateFile, category: Category) -> RelocateResult<Operation> {
        Ok(Operation {
            original_path: file.path.clone(),
            new_path: destination_for(&self.destination_root, &file.relative, category),
            category,
        })
    }

    fn simulated(&self) -> bool {
        true
    }
}

/// Errors reading or writing the history log.
#[derive(Debug)]
pub enum HistoryError {
    /// Failed to write the history file.
    Write(io::Error),
    /// Failed to read the history file.
    Read(io::Error),
    /// The history file could not be parsed.
    InvalidFormat(String),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write(e) => write!(f, "Failed to write history file: {}", e),
            Self::Read(e) => write!(f, "Failed to read history file: {}", e),
            Self::InvalidFormat(reason) => write!(f, "Invalid history file format: {}", reason),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Every move performed by one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    /// RFC 3339 timestamp of when the run started.
    pub timestamp: String,
    /// The tree that was sorted.
    pub source_root: PathBuf,
    /// Where the category roots were created.
    pub destination_root: PathBuf,
    /// Moves, in enumeration order.
    pub operations: Vec<Operation>,
}

impl OperationLog {
    pub fn new(source_root: PathBuf, destination_root: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            source_root,
            destination_root,
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Path of the history file for a destination root.
    pub fn history_file_path(destination_root: &Path) -> PathBuf {
        destination_root.join(HISTORY_FILE)
    }

    /// Writes this log as pretty JSON into `destination_root`.
    pub fn save(&self, destination_root: &Path) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HistoryError::InvalidFormat(format!("JSON serialization failed: {}", e)))?;
        fs::write(Self::history_file_path(destination_root), json).map_err(HistoryError::Write)
    }

    /// Loads the log stored in `destination_root`, if there is one.
    pub fn load(destination_root: &Path) -> Result<Option<Self>, HistoryError> {
        let history_path = Self::history_file_path(destination_root);
        if !history_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&history_path).map_err(HistoryError::Read)?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| HistoryError::InvalidFormat(format!("JSON parse error: {}", e)))
    }

    /// Removes the history file, if present.
    pub fn delete(destination_root: &Path) -> Result<(), HistoryError> {
        let history_path = Self::history_file_path(destination_root);
        if history_path.exists() {
            fs::remove_file(&history_path).map_err(HistoryError::Write)?;
        }
        Ok(())
    }
}
