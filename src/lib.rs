//! blockdupe - Content-Addressed Duplicate-Block Index
//!
//! Given a stream of `(digest, file, offset)` observations for fixed-size
//! blocks, the index keeps one group per distinct digest and, for each group,
//! the file locations sharing it. Later stages walk the groups to find and
//! act on duplicate extents across files.
//!
//! Computing digests, opening files and issuing the dedupe request itself
//! are left to the embedding application; the index only sees opaque digests
//! and file identities.
//!
//! # Example
//!
//! ```
//! use blockdupe::{FileId, HashTree, IndexConfig};
//!
//! let mut tree = HashTree::new(IndexConfig::default().with_digest_len(2)).unwrap();
//! tree.register_file(FileId(1), None).unwrap();
//! tree.register_file(FileId(2), None).unwrap();
//!
//! tree.insert(&[0xab, 0xcd], FileId(1), 0, 0).unwrap();
//! tree.insert(&[0xab, 0xcd], FileId(2), 4096, 0).unwrap();
//!
//! let group = tree.lookup_group(&[0xab, 0xcd]).unwrap();
//! let in_first: Vec<u64> = tree
//!     .iterate_group_for_file(group, FileId(1))
//!     .map(|(_, block)| block.offset())
//!     .collect();
//! assert_eq!(in_first, vec![0]);
//! ```

pub mod block;
pub mod config;
pub mod digest;
pub mod error;
pub mod filerec;
pub mod hash_tree;
pub mod logging;
pub mod seen;
pub mod stats;

pub use block::{Block, BlockId, BlockIter};
pub use config::{IndexConfig, PROMOTE_LIMIT};
pub use digest::Digest;
pub use error::{IndexError, IndexResult};
pub use filerec::{FileId, FileRecord, FileRegistry};
pub use hash_tree::{GroupId, GroupRef, HashTree};
pub use seen::SeenGeneration;
pub use stats::IndexStats;
