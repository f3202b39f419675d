//! Serializable counters describing an index.

use serde::{Deserialize, Serialize};

/// Snapshot of a [`HashTree`](crate::hash_tree::HashTree)'s counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Distinct digests (live groups)
    pub distinct_hashes: usize,
    /// Live blocks across all groups
    pub blocks: usize,
    /// Registered files
    pub files: usize,
    /// Groups with two or more blocks
    pub duplicate_groups: usize,
    /// Blocks inside those groups
    pub duplicate_blocks: usize,
    /// Groups that built membership tokens
    pub promoted_groups: usize,
    /// Current seen generation
    pub generation: u64,
}

impl IndexStats {
    /// Share of blocks whose digest occurs more than once, in percent.
    #[must_use]
    pub fn duplicate_rate(&self) -> f64 {
        if self.blocks == 0 {
            0.0
        } else {
            (self.duplicate_blocks as f64 / self.blocks as f64) * 100.0
        }
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
