//! Per-pass "seen" marking with O(1) reset.
//!
//! Traversals over the index need to remember which blocks they already
//! handled in the current pass. Clearing a flag on every block between passes
//! would cost O(n), so each block instead stores the generation in which it
//! was last marked. A block is seen in this pass iff its stamp equals the
//! current generation; advancing the generation invalidates every earlier
//! mark at once without touching any block.
//!
//! Stamp 0 is reserved for "never marked" and the generation starts at 1. It
//! is only ever incremented. A 64-bit counter does not wrap in any realistic
//! number of passes, so wraparound is not guarded against.

use crate::block::Block;

/// Generation counter shared by one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenGeneration {
    current: u64,
}

impl Default for SeenGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl SeenGeneration {
    /// Start at the first generation.
    #[must_use]
    pub fn new() -> Self {
        Self { current: 1 }
    }

    /// Current generation number.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Stamp `block` with the current generation.
    pub fn mark(&self, block: &mut Block) {
        block.seen = self.current;
    }

    /// Whether `block` was marked during the current generation.
    #[must_use]
    pub fn is_current(&self, block: &Block) -> bool {
        block.seen == self.current
    }

    /// Whether `block` was marked in any generation.
    #[must_use]
    pub fn ever_marked(block: &Block) -> bool {
        block.seen != 0
    }

    /// Begin a new pass, lazily clearing all marks.
    pub fn advance(&mut self) {
        self.current = self.current.wrapping_add(1);
        log::trace!("Seen generation advanced to {}", self.current);
    }
}
