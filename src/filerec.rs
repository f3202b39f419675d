//! File records and the registry that owns them.
//!
//! Every file taking part in a dedupe run gets one [`FileRecord`], keyed by a
//! stable identity (typically the inode number). The record owns the head of
//! the file's block list and remembers which other files it has already been
//! fully compared against, so a whole-file comparison of the same pair is
//! never repeated.
//!
//! # Comparison markers
//!
//! A pair is unordered. Markers are stored once, on the record with the
//! lower identity, so `(a, b)` and `(b, a)` resolve to the same marker.
//!
//! ```
//! use blockdupe::filerec::{FileId, FileRegistry};
//!
//! let mut files = FileRegistry::new();
//! files.register(FileId(7), None).unwrap();
//! files.register(FileId(3), None).unwrap();
//!
//! assert!(!files.were_compared(FileId(7), FileId(3)));
//! files.mark_compared(FileId(7), FileId(3)).unwrap();
//! assert!(files.were_compared(FileId(3), FileId(7)));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::block::BlockList;
use crate::error::{IndexError, IndexResult};

/// Stable file identity, e.g. an inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Book-keeping for one registered file.
#[derive(Debug)]
pub struct FileRecord {
    id: FileId,
    path: Option<PathBuf>,
    pub(crate) blocks: BlockList,
    /// Higher identities this file has been fully compared against.
    compared: BTreeSet<FileId>,
}

impl FileRecord {
    fn new(id: FileId, path: Option<PathBuf>) -> Self {
        Self {
            id,
            path,
            blocks: BlockList::default(),
            compared: BTreeSet::new(),
        }
    }

    /// File identity.
    #[must_use]
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Path carried for the caller; never opened by the index.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of blocks currently indexed for this file.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

/// All registered files, ordered by identity.
#[derive(Debug, Default)]
pub struct FileRegistry {
    records: BTreeMap<FileId, FileRecord>,
}

fn canonical_pair(a: FileId, b: FileId) -> (FileId, FileId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl FileRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new file.
    ///
    /// # Errors
    ///
    /// [`IndexError::DuplicateIdentity`] if `id` is already registered.
    pub fn register(&mut self, id: FileId, path: Option<PathBuf>) -> IndexResult<&FileRecord> {
        use std::collections::btree_map::Entry;

        match self.records.entry(id) {
            Entry::Occupied(_) => Err(IndexError::DuplicateIdentity(id)),
            Entry::Vacant(slot) => {
                log::debug!("Registered file {} ({:?})", id, path);
                Ok(slot.insert(FileRecord::new(id, path)))
            }
        }
    }

    /// Remove a file that no longer has indexed blocks.
    ///
    /// Comparison markers naming `id` are dropped as well, so a later file
    /// registered under the same identity starts uncompared.
    ///
    /// # Errors
    ///
    /// - [`IndexError::UnknownFile`] if `id` is not registered.
    /// - [`IndexError::InvariantViolation`] if the file still owns blocks;
    ///   remove them from the hash tree first.
    pub fn unregister(&mut self, id: FileId) -> IndexResult<FileRecord> {
        let record = self.records.get(&id).ok_or(IndexError::UnknownFile(id))?;
        if !record.blocks.is_empty() {
            return Err(IndexError::invariant(format!(
                "file {} unregistered with {} live blocks",
                id,
                record.blocks.len()
            )));
        }

        let record = self.records.remove(&id).ok_or(IndexError::UnknownFile(id))?;
        for lower in self.records.range_mut(..id).map(|(_, r)| r) {
            lower.compared.remove(&id);
        }
        log::debug!("Unregistered file {}", id);
        Ok(record)
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, id: FileId) -> Option<&FileRecord> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: FileId) -> Option<&mut FileRecord> {
        self.records.get_mut(&id)
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: FileId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of registered files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no files are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Whether the unordered pair `(a, b)` was marked as fully compared.
    ///
    /// Unregistered files were never compared.
    #[must_use]
    pub fn were_compared(&self, a: FileId, b: FileId) -> bool {
        let (lo, hi) = canonical_pair(a, b);
        self.records
            .get(&lo)
            .is_some_and(|record| record.compared.contains(&hi))
    }

    /// Record that the unordered pair `(a, b)` has been fully compared.
    ///
    /// Marking an already-marked pair is a no-op.
    ///
    /// # Errors
    ///
    /// [`IndexError::UnknownFile`] if either file is not registered.
    pub fn mark_compared(&mut self, a: FileId, b: FileId) -> IndexResult<()> {
        let (lo, hi) = canonical_pair(a, b);
        if !self.records.contains_key(&hi) {
            return Err(IndexError::UnknownFile(hi));
        }
        let record = self.records.get_mut(&lo).ok_or(IndexError::UnknownFile(lo))?;
        record.compared.insert(hi);
        Ok(())
    }
}
