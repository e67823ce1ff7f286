//! picsort - sort an image tree into valid, invalid and duplicate directories
//!
//! Every image below a source directory is decoded, classified, fingerprinted
//! and moved to `valid_images/`, `invalid_images/` or `duplicate_images/`
//! under a destination base, keeping its path relative to the source. Files
//! are processed concurrently under a fixed admission ceiling, and a shared
//! first-writer-wins registry decides which of several identical images is
//! the canonical copy.

pub mod admission;
pub mod category;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod enumerate;
pub mod fingerprint;
pub mod output;
pub mod registry;
pub mod relocator;
pub mod undo;

pub use admission::{AdmissionGate, CancelToken};
pub use category::Category;
pub use classifier::{Classifier, Verdict};
pub use config::{ConfigError, SorterConfig};
pub use dispatcher::{Dispatcher, RunReport};
pub use enumerate::CandidateFile;
pub use fingerprint::Fingerprint;
pub use registry::DuplicateRegistry;
pub use relocator::{FileRelocator, Relocator};
pub use undo::{UndoManager, UndoReport};

pub use cli::{Args, run_cli};
