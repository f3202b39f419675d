//! Block records and the arena that owns them.
//!
//! # Overview
//!
//! A [`Block`] is one occurrence of a digest: a `(file, offset, flags)` triple.
//! Every block belongs to exactly two lists at once: its group's occurrence
//! list and its file's block list. Rather than each container holding its
//! own copy, all blocks live in a single [`BlockArena`] and both lists are
//! threaded through the arena slots by [`BlockId`] handle. Removing a block
//! frees its slot, which is the single source of truth: both lists are
//! unlinked in the same call, and any handle to the old slot stops resolving.
//!
//! Handles carry a serial number so a handle to a freed slot never aliases a
//! block later allocated into the same slot.

use std::collections::TryReserveError;

use crate::digest::Digest;
use crate::filerec::FileId;

/// Stable handle to a block in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    slot: usize,
    serial: u64,
}

/// One recorded occurrence of a digest.
#[derive(Debug, Clone)]
pub struct Block {
    digest: Digest,
    file: FileId,
    offset: u64,
    flags: u32,
    /// Seen stamp; 0 means never marked.
    pub(crate) seen: u64,
    group_links: Links,
    file_links: Links,
}

impl Block {
    pub(crate) fn new(digest: Digest, file: FileId, offset: u64, flags: u32) -> Self {
        Self {
            digest,
            file,
            offset,
            flags,
            seen: 0,
            group_links: Links::default(),
            file_links: Links::default(),
        }
    }

    /// Digest of the group this block belongs to.
    #[must_use]
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Owning file.
    #[must_use]
    pub fn file(&self) -> FileId {
        self.file
    }

    /// Logical byte offset of the block within its file.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Caller-defined flags.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Raw seen stamp.
    #[must_use]
    pub fn seen_stamp(&self) -> u64 {
        self.seen
    }

    fn links(&self, chain: Chain) -> &Links {
        match chain {
            Chain::Group => &self.group_links,
            Chain::File => &self.file_links,
        }
    }

    fn links_mut(&mut self, chain: Chain) -> &mut Links {
        match chain {
            Chain::Group => &mut self.group_links,
            Chain::File => &mut self.file_links,
        }
    }
}

/// Which of a block's two lists an operation walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chain {
    Group,
    File,
}

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<BlockId>,
    next: Option<BlockId>,
}

/// Head of an intrusive, insertion-ordered list of blocks.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BlockList {
    head: Option<BlockId>,
    tail: Option<BlockId>,
    len: usize,
}

impl BlockList {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn first(&self) -> Option<BlockId> {
        self.head
    }
}

#[derive(Debug)]
enum Slot {
    Occupied { serial: u64, block: Block },
    Vacant { next_free: Option<usize> },
}

/// Slot arena owning every live block.
#[derive(Debug, Default)]
pub(crate) struct BlockArena {
    slots: Vec<Slot>,
    free_head: Option<usize>,
    next_serial: u64,
    live: usize,
}

impl BlockArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of live blocks.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Make sure the next [`alloc`](Self::alloc) cannot allocate.
    pub(crate) fn reserve_one(&mut self) -> Result<(), TryReserveError> {
        if self.free_head.is_none() {
            self.slots.try_reserve(1)?;
        }
        Ok(())
    }

    /// Store `block` and return its handle. Unlinked until pushed onto lists.
    pub(crate) fn alloc(&mut self, block: Block) -> BlockId {
        self.next_serial += 1;
        let serial = self.next_serial;
        let occupied = Slot::Occupied { serial, block };
        let slot = match self.free_head {
            Some(slot) => {
                if let Slot::Vacant { next_free } = &self.slots[slot] {
                    self.free_head = *next_free;
                }
                self.slots[slot] = occupied;
                slot
            }
            None => {
                self.slots.push(occupied);
                self.slots.len() - 1
            }
        };
        self.live += 1;
        BlockId { slot, serial }
    }

    /// Release a slot. The block must already be unlinked from both lists.
    pub(crate) fn free(&mut self, id: BlockId) -> Option<Block> {
        self.get(id)?;
        let vacant = Slot::Vacant {
            next_free: self.free_head,
        };
        match std::mem::replace(&mut self.slots[id.slot], vacant) {
            Slot::Occupied { block, .. } => {
                self.free_head = Some(id.slot);
                self.live -= 1;
                Some(block)
            }
            Slot::Vacant { .. } => None,
        }
    }

    pub(crate) fn get(&self, id: BlockId) -> Option<&Block> {
        match self.slots.get(id.slot)? {
            Slot::Occupied { serial, block } if *serial == id.serial => Some(block),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        match self.slots.get_mut(id.slot)? {
            Slot::Occupied { serial, block } if *serial == id.serial => Some(block),
            _ => None,
        }
    }

    fn links_mut(&mut self, id: BlockId, chain: Chain) -> &mut Links {
        match &mut self.slots[id.slot] {
            Slot::Occupied { block, .. } => block.links_mut(chain),
            Slot::Vacant { .. } => unreachable!("linked block {id:?} has a vacant slot"),
        }
    }

    /// Append a live block to the tail of `list`.
    pub(crate) fn push_back(&mut self, list: &mut BlockList, id: BlockId, chain: Chain) {
        let prev = list.tail;
        *self.links_mut(id, chain) = Links { prev, next: None };
        match prev {
            Some(tail) => self.links_mut(tail, chain).next = Some(id),
            None => list.head = Some(id),
        }
        list.tail = Some(id);
        list.len += 1;
    }

    /// Detach a live block from `list`.
    pub(crate) fn unlink(&mut self, list: &mut BlockList, id: BlockId, chain: Chain) {
        let Links { prev, next } = std::mem::take(self.links_mut(id, chain));
        match prev {
            Some(prev) => self.links_mut(prev, chain).next = next,
            None => list.head = next,
        }
        match next {
            Some(next) => self.links_mut(next, chain).prev = prev,
            None => list.tail = prev,
        }
        list.len -= 1;
    }

    /// Iterate `list` front to back.
    pub(crate) fn iter<'a>(&'a self, list: &BlockList, chain: Chain) -> BlockIter<'a> {
        BlockIter {
            arena: self,
            next: list.head,
            remaining: list.len,
            chain,
        }
    }
}

/// Iterator over one of the intrusive block lists.
#[derive(Clone)]
pub struct BlockIter<'a> {
    arena: &'a BlockArena,
    next: Option<BlockId>,
    remaining: usize,
    chain: Chain,
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = (BlockId, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let block = self.arena.get(id)?;
        self.next = block.links(self.chain).next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((id, block))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
