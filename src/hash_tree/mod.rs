//! The hash index: digest → group of duplicate blocks.
//!
//! # Overview
//!
//! [`HashTree`] is the top-level structure callers feed with
//! `(digest, file, offset, flags)` observations. It owns:
//!
//! - the ordered map from [`Digest`] to group (one group per distinct digest),
//! - the [`FileRegistry`] of participating files,
//! - the block arena both groups and files thread their lists through,
//! - the [`SeenGeneration`] used to mark blocks during traversal passes.
//!
//! Groups are created by the first insert of their digest and destroyed the
//! moment their last block is removed. Groups that reach the configured
//! promotion limit build a per-file membership index of "tokens".
//!
//! # Example
//!
//! ```
//! use blockdupe::config::IndexConfig;
//! use blockdupe::filerec::FileId;
//! use blockdupe::hash_tree::HashTree;
//!
//! let mut tree = HashTree::new(IndexConfig::default().with_digest_len(4)).unwrap();
//! let (a, b) = (FileId(1), FileId(2));
//! tree.register_file(a, None).unwrap();
//! tree.register_file(b, None).unwrap();
//!
//! tree.insert(b"\x00\x01\x02\x03", a, 0, 0).unwrap();
//! tree.insert(b"\x00\x01\x02\x03", b, 4096, 0).unwrap();
//!
//! let group = tree.lookup_group(b"\x00\x01\x02\x03").unwrap();
//! assert_eq!(group.len(), 2);
//! assert_eq!(tree.num_hashes(), 1);
//! assert_eq!(tree.num_blocks(), 2);
//! ```
//!
//! # Thread Safety
//!
//! `HashTree` has no internal locking. Hash computation may run in parallel,
//! but every mutation must be serialized by the caller (a single writer
//! draining a queue, or an external lock held across each call).

mod group;
mod tokens;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::block::{Block, BlockArena, BlockId, Chain};
use crate::config::IndexConfig;
use crate::digest::Digest;
use crate::error::{IndexError, IndexResult};
use crate::filerec::{FileId, FileRecord, FileRegistry};
use crate::seen::SeenGeneration;
use crate::stats::IndexStats;

pub(crate) use group::DupeGroup;
pub use group::{GroupId, GroupRef};
use group::Membership;
use tokens::FileTokens;

/// Index of all hashed blocks, grouped by digest.
#[derive(Debug)]
pub struct HashTree {
    config: IndexConfig,
    groups: BTreeMap<Digest, DupeGroup>,
    arena: BlockArena,
    files: FileRegistry,
    seen: SeenGeneration,
    num_hashes: usize,
    num_blocks: usize,
    next_group_id: u64,
}

impl HashTree {
    /// Create an empty tree.
    ///
    /// # Errors
    ///
    /// [`IndexError::Config`] if `config` fails validation.
    pub fn new(config: IndexConfig) -> IndexResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create an empty tree with [`IndexConfig::default`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::build(IndexConfig::default())
    }

    fn build(config: IndexConfig) -> Self {
        Self {
            config,
            groups: BTreeMap::new(),
            arena: BlockArena::new(),
            files: FileRegistry::new(),
            seen: SeenGeneration::new(),
            num_hashes: 0,
            num_blocks: 0,
            next_group_id: 0,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of distinct digests (live groups).
    #[must_use]
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Number of live blocks across all groups.
    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Registered files.
    #[must_use]
    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    // -- file registry ------------------------------------------------------

    /// Register a file so blocks can be inserted for it.
    ///
    /// # Errors
    ///
    /// [`IndexError::DuplicateIdentity`] if `id` is already registered.
    pub fn register_file(&mut self, id: FileId, path: Option<PathBuf>) -> IndexResult<FileId> {
        self.files.register(id, path).map(FileRecord::id)
    }

    /// Unregister a file whose blocks were already removed.
    ///
    /// Does not cascade: call [`remove_all_for_file`](Self::remove_all_for_file) first.
    ///
    /// # Errors
    ///
    /// - [`IndexError::UnknownFile`] if `id` is not registered.
    /// - [`IndexError::InvariantViolation`] if the file still owns blocks.
    pub fn unregister_file(&mut self, id: FileId) -> IndexResult<()> {
        self.files.unregister(id).map(drop)
    }

    /// See [`FileRegistry::were_compared`].
    #[must_use]
    pub fn were_compared(&self, a: FileId, b: FileId) -> bool {
        self.files.were_compared(a, b)
    }

    /// See [`FileRegistry::mark_compared`].
    ///
    /// # Errors
    ///
    /// [`IndexError::UnknownFile`] if either file is not registered.
    pub fn mark_compared(&mut self, a: FileId, b: FileId) -> IndexResult<()> {
        self.files.mark_compared(a, b)
    }

    // -- insertion and removal ----------------------------------------------

    /// Record that `file` has a block with `digest` at `offset`.
    ///
    /// Creates the digest's group on first sight. Every allocation that can
    /// fail is reserved before anything is linked, so on error the tree is
    /// exactly as it was before the call.
    ///
    /// The one allocation that cannot be reserved is a new node of the digest
    /// map, made when a digest is seen for the first time and its leaf is full.
    /// `BTreeMap` has no fallible insert, so that failure aborts the process
    /// instead of returning [`IndexError::OutOfMemory`].
    ///
    /// # Errors
    ///
    /// - [`IndexError::DigestLength`] if `digest` is not the configured length.
    /// - [`IndexError::UnknownFile`] if `file` is not registered.
    /// - [`IndexError::OutOfMemory`] if a reservation fails.
    /// - [`IndexError::InvariantViolation`] if the digest map is corrupted.
    pub fn insert(
        &mut self,
        digest: &[u8],
        file: FileId,
        offset: u64,
        flags: u32,
    ) -> IndexResult<BlockId> {
        let key = Digest::new(digest)
            .filter(|key| key.len() == self.config.digest_len)
            .ok_or(IndexError::DigestLength {
                expected: self.config.digest_len,
                actual: digest.len(),
            })?;
        if !self.files.contains(file) {
            return Err(IndexError::UnknownFile(file));
        }

        // Fallible phase: nothing is modified until all of this succeeds.
        self.arena.reserve_one()?;
        let promote_limit = self.config.promote_limit;
        let promotion = match self.groups.get_mut(digest) {
            Some(group) => match &mut group.membership {
                Membership::Promoted(tokens) => {
                    tokens.reserve_for(file)?;
                    None
                }
                // Counts the incoming block, so a group promotes on reaching the limit
                // rather than on the insert after it.
                Membership::Unpromoted if group.blocks.len() + 1 >= promote_limit => {
                    let owners = self
                        .arena
                        .iter(&group.blocks, Chain::Group)
                        .map(|(_, block)| block.file());
                    Some(FileTokens::scan(owners, file)?)
                }
                Membership::Unpromoted => None,
            },
            None if promote_limit <= 1 => Some(FileTokens::scan(std::iter::empty(), file)?),
            None => None,
        };

        let digest = key;
        if !self.groups.contains_key(&digest) {
            self.create_group(digest)?;
        }

        let group = self
            .groups
            .get_mut(&digest)
            .ok_or_else(|| IndexError::invariant(format!("group {digest} vanished")))?;
        let record = self
            .files
            .get_mut(file)
            .ok_or(IndexError::UnknownFile(file))?;

        let id = self
            .arena
            .alloc(Block::new(digest, file, offset, flags));
        self.arena.push_back(&mut group.blocks, id, Chain::Group);
        self.arena.push_back(&mut record.blocks, id, Chain::File);

        match promotion {
            Some(tokens) => {
                log::debug!(
                    "Promoted group {} ({}) at {} blocks, {} files",
                    group.id,
                    digest,
                    group.blocks.len(),
                    tokens.len()
                );
                group.membership = Membership::Promoted(tokens);
            }
            None => {
                if let Some(tokens) = group.tokens_mut() {
                    tokens.ensure(file);
                }
            }
        }

        self.num_blocks += 1;
        log::trace!("Inserted block {digest} file={file} offset={offset} flags={flags:#x}");
        Ok(id)
    }

    fn create_group(&mut self, digest: Digest) -> IndexResult<()> {
        let id = GroupId(self.next_group_id);
        match self.groups.entry(digest) {
            Entry::Occupied(entry) => Err(IndexError::invariant(format!(
                "duplicate group for digest {}",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(DupeGroup::new(id, digest));
                self.next_group_id += 1;
                self.num_hashes += 1;
                log::trace!("Created group {id} for {digest}");
                Ok(())
            }
        }
    }

    /// Remove every block owned by `file`, destroying groups that empty.
    ///
    /// Returns the number of blocks removed. The file stays registered.
    ///
    /// # Errors
    ///
    /// - [`IndexError::UnknownFile`] if `file` is not registered.
    /// - [`IndexError::InvariantViolation`] if a block's group is missing.
    pub fn remove_all_for_file(&mut self, file: FileId) -> IndexResult<usize> {
        let mut removed = 0;
        loop {
            let record = self.files.get(file).ok_or(IndexError::UnknownFile(file))?;
            let Some(id) = record.blocks.first() else {
                break;
            };
            self.remove_block(id)?;
            removed += 1;
        }
        log::debug!("Removed {removed} blocks for file {file}");
        Ok(removed)
    }

    /// Unlink one block from its group and file and free it.
    ///
    /// Only called while removing every block of the block's file, which is
    /// what makes dropping the file's token from a surviving group correct.
    fn remove_block(&mut self, id: BlockId) -> IndexResult<()> {
        let block = self
            .arena
            .get(id)
            .ok_or_else(|| IndexError::invariant(format!("stale block handle {id:?}")))?;
        let digest = *block.digest();
        let file = block.file();

        let group = self
            .groups
            .get_mut(&digest)
            .ok_or_else(|| IndexError::invariant(format!("block without group {digest}")))?;
        let record = self
            .files
            .get_mut(file)
            .ok_or_else(|| IndexError::invariant(format!("block owned by unknown file {file}")))?;

        self.arena.unlink(&mut group.blocks, id, Chain::Group);
        self.arena.unlink(&mut record.blocks, id, Chain::File);
        self.arena.free(id);
        self.num_blocks -= 1;

        if group.blocks.is_empty() {
            let group_id = group.id;
            self.groups.remove(&digest);
            self.num_hashes -= 1;
            log::trace!("Destroyed group {group_id} for {digest}");
        } else if let Some(tokens) = group.tokens_mut() {
            tokens.remove(file);
        }
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    /// Find the group for `digest`.
    #[must_use]
    pub fn lookup_group(&self, digest: &[u8]) -> Option<GroupRef<'_>> {
        self.groups.get(digest).map(|group| self.view(group))
    }

    fn view<'a>(&'a self, group: &'a DupeGroup) -> GroupRef<'a> {
        GroupRef {
            group,
            arena: &self.arena,
        }
    }

    /// Blocks of `group` owned by `file`, in insertion order.
    pub fn iterate_group_for_file<'a>(
        &'a self,
        group: GroupRef<'a>,
        file: FileId,
    ) -> impl Iterator<Item = (BlockId, &'a Block)> + 'a {
        group.blocks_of(file)
    }

    /// Whether `file` has a block in the group for `digest`.
    #[must_use]
    pub fn group_contains_file(&self, digest: &[u8], file: FileId) -> bool {
        self.lookup_group(digest)
            .is_some_and(|group| group.contains_file(file))
    }

    /// Resolve a block handle. `None` once the block was removed.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.arena.get(id)
    }

    /// Group the block belongs to.
    #[must_use]
    pub fn group_of(&self, id: BlockId) -> Option<GroupRef<'_>> {
        let block = self.arena.get(id)?;
        self.lookup_group(block.digest().as_bytes())
    }

    /// Other blocks with the same digest as `id` that `file` owns.
    ///
    /// Excludes `id` itself. Passing the block's own file finds content
    /// repeated within one file.
    pub fn dupes_in_file(
        &self,
        id: BlockId,
        file: FileId,
    ) -> impl Iterator<Item = (BlockId, &Block)> + '_ {
        self.group_of(id)
            .into_iter()
            .flat_map(move |group| group.blocks_of(file))
            .filter(move |(other, _)| *other != id)
    }

    /// Blocks of `file` in insertion order. Empty for unknown files.
    pub fn file_blocks(&self, file: FileId) -> impl Iterator<Item = (BlockId, &Block)> + '_ {
        self.files
            .get(file)
            .map(|record| self.arena.iter(&record.blocks, Chain::File))
            .into_iter()
            .flatten()
    }

    /// All groups in digest order.
    pub fn groups(&self) -> impl Iterator<Item = GroupRef<'_>> {
        self.groups.values().map(|group| self.view(group))
    }

    /// Groups with at least two blocks, largest first; ties in digest order.
    #[must_use]
    pub fn duplicate_groups(&self) -> Vec<GroupRef<'_>> {
        let mut dupes: Vec<_> = self.groups().filter(|group| group.len() > 1).collect();
        dupes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.digest().cmp(b.digest())));
        dupes
    }

    // -- seen marking ---------------------------------------------------------

    /// Mark a block as seen in the current pass. Returns false for stale handles.
    pub fn mark_seen(&mut self, id: BlockId) -> bool {
        match self.arena.get_mut(id) {
            Some(block) => {
                self.seen.mark(block);
                true
            }
            None => false,
        }
    }

    /// Whether the block was marked in the current pass.
    #[must_use]
    pub fn is_seen_this_pass(&self, id: BlockId) -> bool {
        self.arena
            .get(id)
            .is_some_and(|block| self.seen.is_current(block))
    }

    /// Whether the block was ever marked.
    #[must_use]
    pub fn was_ever_seen(&self, id: BlockId) -> bool {
        self.arena.get(id).is_some_and(SeenGeneration::ever_marked)
    }

    /// Start a new pass; all earlier marks stop counting as current.
    pub fn advance_pass(&mut self) {
        self.seen.advance();
    }

    /// Current seen generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.seen.current()
    }

    // -- diagnostics ------------------------------------------------------------

    /// Snapshot of the tree's counters.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            distinct_hashes: self.num_hashes,
            blocks: self.num_blocks,
            files: self.files.len(),
            generation: self.seen.current(),
            ..IndexStats::default()
        };
        for group in self.groups.values() {
            if group.blocks.len() > 1 {
                stats.duplicate_groups += 1;
                stats.duplicate_blocks += group.blocks.len();
            }
            if group.tokens().is_some() {
                stats.promoted_groups += 1;
            }
        }
        stats
    }

    /// Audit every counter, list and token set.
    ///
    /// # Errors
    ///
    /// [`IndexError::InvariantViolation`] describing the first inconsistency.
    pub fn validate(&self) -> IndexResult<()> {
        let fail = |msg: String| Err(IndexError::InvariantViolation(msg));

        if self.num_hashes != self.groups.len() {
            return fail(format!(
                "num_hashes {} != {} groups",
                self.num_hashes,
                self.groups.len()
            ));
        }
        if self.num_blocks != self.arena.len() {
            return fail(format!(
                "num_blocks {} != {} live arena blocks",
                self.num_blocks,
                self.arena.len()
            ));
        }

        let mut group_total = 0;
        for (key, group) in &self.groups {
            let mut walked = 0;
            let mut owners = BTreeSet::new();
            for (_, block) in self.arena.iter(&group.blocks, Chain::Group) {
                walked += 1;
                if block.digest() != key {
                    return fail(format!("block in group {key} has digest {}", block.digest()));
                }
                if !self.files.contains(block.file()) {
                    return fail(format!("group {key} references unknown file {}", block.file()));
                }
                owners.insert(block.file());
            }
            if walked == 0 || walked != group.blocks.len() {
                return fail(format!(
                    "group {key} counts {} blocks, list holds {walked}",
                    group.blocks.len()
                ));
            }
            match group.tokens() {
                Some(tokens) => {
                    if !tokens.iter().eq(owners.iter().copied()) {
                        return fail(format!("group {key} tokens do not match its owners"));
                    }
                }
                None if walked >= self.config.promote_limit => {
                    return fail(format!("group {key} has {walked} blocks but is unpromoted"));
                }
                None => {}
            }
            group_total += walked;
        }
        if group_total != self.num_blocks {
            return fail(format!("groups hold {group_total} blocks, expected {}", self.num_blocks));
        }

        let mut file_total = 0;
        for record in self.files.iter() {
            let mut walked = 0;
            for (_, block) in self.arena.iter(&record.blocks, Chain::File) {
                walked += 1;
                if block.file() != record.id() {
                    return fail(format!(
                        "file {} lists block owned by {}",
                        record.id(),
                        block.file()
                    ));
                }
            }
            if walked != record.block_count() {
                return fail(format!(
                    "file {} counts {} blocks, list holds {walked}",
                    record.id(),
                    record.block_count()
                ));
            }
            file_total += walked;
        }
        if file_total != self.num_blocks {
            return fail(format!("files hold {file_total} blocks, expected {}", self.num_blocks));
        }
        Ok(())
    }
}
