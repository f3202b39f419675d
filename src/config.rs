//! Index configuration.
//!
//! Configuration is layered with `figment`, lowest priority first:
//!
//! 1. Built-in defaults ([`IndexConfig::default`])
//! 2. An optional TOML file
//! 3. Environment variables prefixed with `BLOCKDUPE_` (e.g. `BLOCKDUPE_DIGEST_LEN=20`)
//!
//! The resulting values are fixed for the lifetime of a
//! [`HashTree`](crate::hash_tree::HashTree): the digest length in particular
//! is a process-wide constant that every inserted digest must match.
//!
//! # Example
//!
//! ```
//! use blockdupe::config::IndexConfig;
//!
//! let config = IndexConfig::default().with_promote_limit(64);
//! assert_eq!(config.digest_len, 32);
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::IndexResult;

/// Occurrence count at which a group builds its file-membership tokens.
pub const PROMOTE_LIMIT: usize = 30_000;

/// Default digest length in bytes (BLAKE3 / SHA-256 width).
pub const DEFAULT_DIGEST_LEN: usize = 32;

/// Longest digest the index accepts; digests are stored inline at this width.
pub const MAX_DIGEST_LEN: usize = 64;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BLOCKDUPE_";

/// Tunables for the hash index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Length in bytes of every digest inserted into the index.
    #[serde(default = "default_digest_len")]
    pub digest_len: usize,
    /// Group size at which membership tokens are built.
    #[serde(default = "default_promote_limit")]
    pub promote_limit: usize,
}

fn default_digest_len() -> usize {
    DEFAULT_DIGEST_LEN
}

fn default_promote_limit() -> usize {
    PROMOTE_LIMIT
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            digest_len: DEFAULT_DIGEST_LEN,
            promote_limit: PROMOTE_LIMIT,
        }
    }
}

impl IndexConfig {
    /// Set the digest length.
    #[must_use]
    pub fn with_digest_len(mut self, len: usize) -> Self {
        self.digest_len = len;
        self
    }

    /// Set the promotion limit.
    #[must_use]
    pub fn with_promote_limit(mut self, limit: usize) -> Self {
        self.promote_limit = limit;
        self
    }

    /// Build the layered figment: defaults, then `file` if given, then environment.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load and validate configuration from all layers.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`](crate::error::IndexError::Config) if a
    /// layer fails to parse or the merged values are out of range.
    pub fn load(file: Option<&Path>) -> IndexResult<Self> {
        let config: Self = Self::figment(file).extract()?;
        config.validate()?;
        log::debug!(
            "Loaded index config: digest_len={}, promote_limit={}",
            config.digest_len,
            config.promote_limit
        );
        Ok(config)
    }

    /// Check that values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`](crate::error::IndexError::Config)
    /// describing the first bad value.
    pub fn validate(&self) -> IndexResult<()> {
        if self.digest_len == 0 || self.digest_len > MAX_DIGEST_LEN {
            return Err(figment::Error::from(format!(
                "digest_len must be between 1 and {MAX_DIGEST_LEN}, got {}",
                self.digest_len
            ))
            .into());
        }
        if self.promote_limit == 0 {
            let msg = "promote_limit must be at least 1".to_string();
            return Err(figment::Error::from(msg).into());
        }
        Ok(())
    }
}
