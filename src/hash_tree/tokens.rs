//! Per-group file membership tokens.
//!
//! Most digests occur once or a handful of times, so groups start without
//! any per-file index and answer "does file X occur here?" by scanning their
//! block list. Once a group grows to the promotion limit it builds a
//! [`FileTokens`] set with one pass over its blocks and keeps it current on
//! every later insert. Lookups are then a binary search.
//!
//! Tokens are a sorted `Vec` rather than a tree so that every allocation can
//! go through `try_reserve` and fail cleanly before the group is touched.

use std::collections::TryReserveError;

use crate::filerec::FileId;

/// Sorted, duplicate-free set of files with at least one block in a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileTokens {
    files: Vec<FileId>,
}

impl FileTokens {
    /// Build tokens from the owners of a group's blocks, plus `extra`.
    ///
    /// Pure with respect to the group: nothing is modified, so a failed
    /// allocation leaves the caller's state untouched.
    pub(crate) fn scan(
        owners: impl Iterator<Item = FileId>,
        extra: FileId,
    ) -> Result<Self, TryReserveError> {
        let mut files = Vec::new();
        files.try_reserve(owners.size_hint().0 + 1)?;
        for file in owners.chain(std::iter::once(extra)) {
            files.try_reserve(1)?;
            files.push(file);
        }
        files.sort_unstable();
        files.dedup();
        Ok(Self { files })
    }

    pub(crate) fn contains(&self, file: FileId) -> bool {
        self.files.binary_search(&file).is_ok()
    }

    /// Reserve room so a following [`ensure`](Self::ensure) cannot allocate.
    pub(crate) fn reserve_for(&mut self, file: FileId) -> Result<(), TryReserveError> {
        if !self.contains(file) {
            self.files.try_reserve(1)?;
        }
        Ok(())
    }

    /// Add a token for `file`; no-op if one exists. Returns whether it was added.
    pub(crate) fn ensure(&mut self, file: FileId) -> bool {
        match self.files.binary_search(&file) {
            Ok(_) => false,
            Err(pos) => {
                self.files.insert(pos, file);
                true
            }
        }
    }

    /// Drop the token for `file`. Returns whether one existed.
    pub(crate) fn remove(&mut self, file: FileId) -> bool {
        match self.files.binary_search(&file) {
            Ok(pos) => {
                self.files.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.iter().copied()
    }
}
