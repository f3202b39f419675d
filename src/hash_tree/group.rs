//! Hash groups: every block sharing one digest.

use std::fmt;

use crate::block::{Block, BlockArena, BlockId, BlockIter, BlockList, Chain};
use crate::digest::Digest;
use crate::filerec::FileId;

use super::tokens::FileTokens;

/// Identity of a group for its whole lifetime.
///
/// A group recreated for a digest whose previous group was destroyed gets a
/// fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub(crate) u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Membership index state. The transition is one-way.
#[derive(Debug)]
pub(crate) enum Membership {
    Unpromoted,
    Promoted(FileTokens),
}

/// All blocks of one digest. Owned by the [`HashTree`](super::HashTree).
#[derive(Debug)]
pub(crate) struct DupeGroup {
    pub(crate) id: GroupId,
    pub(crate) digest: Digest,
    pub(crate) blocks: BlockList,
    pub(crate) membership: Membership,
}

impl DupeGroup {
    pub(crate) fn new(id: GroupId, digest: Digest) -> Self {
        Self {
            id,
            digest,
            blocks: BlockList::default(),
            membership: Membership::Unpromoted,
        }
    }

    pub(crate) fn tokens(&self) -> Option<&FileTokens> {
        match &self.membership {
            Membership::Promoted(tokens) => Some(tokens),
            Membership::Unpromoted => None,
        }
    }

    pub(crate) fn tokens_mut(&mut self) -> Option<&mut FileTokens> {
        match &mut self.membership {
            Membership::Promoted(tokens) => Some(tokens),
            Membership::Unpromoted => None,
        }
    }
}

/// Read-only view of a group.
///
/// Borrowed from the tree, so the tree cannot be mutated while a view is alive.
#[derive(Clone, Copy)]
pub struct GroupRef<'a> {
    pub(crate) group: &'a DupeGroup,
    pub(crate) arena: &'a BlockArena,
}

impl<'a> GroupRef<'a> {
    /// Group identity.
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.group.id
    }

    /// Shared digest.
    #[must_use]
    pub fn digest(&self) -> &'a Digest {
        &self.group.digest
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.group.blocks.len()
    }

    /// Always false for a live group; groups are destroyed when they empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.group.blocks.is_empty()
    }

    /// Whether the group has built its membership tokens.
    #[must_use]
    pub fn is_promoted(&self) -> bool {
        matches!(self.group.membership, Membership::Promoted(_))
    }

    /// Distinct files tokened, once promoted.
    #[must_use]
    pub fn file_count(&self) -> Option<usize> {
        self.group.tokens().map(FileTokens::len)
    }

    /// Files holding a token, in identity order. Empty until promoted.
    pub fn token_files(&self) -> impl Iterator<Item = FileId> + 'a {
        self.group.tokens().into_iter().flat_map(|tokens| tokens.iter())
    }

    /// All blocks in insertion order.
    #[must_use]
    pub fn blocks(&self) -> BlockIter<'a> {
        self.arena.iter(&self.group.blocks, Chain::Group)
    }

    /// Blocks owned by `file`, in insertion order.
    ///
    /// Walks the stored list each time it is called, so it can be restarted freely.
    pub fn blocks_of(self, file: FileId) -> impl Iterator<Item = (BlockId, &'a Block)> + 'a {
        self.blocks().filter(move |(_, block)| block.file() == file)
    }

    /// Whether `file` has at least one block in this group.
    ///
    /// A token lookup once promoted, a linear scan before that.
    #[must_use]
    pub fn contains_file(&self, file: FileId) -> bool {
        match self.group.tokens() {
            Some(tokens) => tokens.contains(file),
            None => self.blocks().any(|(_, block)| block.file() == file),
        }
    }
}

impl fmt::Debug for GroupRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRef")
            .field("id", &self.id())
            .field("digest", self.digest())
            .field("len", &self.len())
            .field("promoted", &self.is_promoted())
            .finish()
    }
}
