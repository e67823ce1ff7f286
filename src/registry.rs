//! First-writer-wins registry of fingerprints seen during a run.

use crate::fingerprint::Fingerprint;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::{Path, PathBuf};

/// Maps each fingerprint to the relative path of the file that claimed it
/// first.
///
/// Entries are only ever added. The registry lives for one run and is
/// shared by reference between all workers; the only mutating operation is
/// [`claim`](DuplicateRegistry::claim), which checks and inserts under the
/// same shard lock.
#[derive(Debug, Default)]
pub struct DuplicateRegistry {
    entries: DashMap<Fingerprint, PathBuf>,
}

impl DuplicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `fingerprint` for `relative` if nobody has yet.
    ///
    /// Returns `None` when this call became the canonical entry, or the path
    /// recorded by the earlier winner. Linearizable: for a given fingerprint
    /// exactly one caller ever observes `None`.
    ///
    /// ```
    /// use picsort::fingerprint::Fingerprint;
    /// use picsort::registry::DuplicateRegistry;
    /// use std::path::{Path, PathBuf};
    ///
    /// let registry = DuplicateRegistry::new();
    /// let fp = Fingerprint { digest: 7, width: 640, height: 480 };
    /// assert_eq!(registry.claim(fp, Path::new("a.png")), None);
    /// assert_eq!(registry.claim(fp, Path::new("b.png")), Some(PathBuf::from("a.png")));
    /// ```
    pub fn claim(&self, fingerprint: Fingerprint, relative: &Path) -> Option<PathBuf> {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(existing) => Some(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(relative.to_path_buf());
                None
            }
        }
    }

    /// Number of distinct fingerprints claimed so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
