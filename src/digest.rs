//! Opaque block digests.
//!
//! A [`Digest`] is an immutable byte string produced by an external hashing
//! stage. The index never interprets it: digests are only compared, byte-wise
//! unsigned and lexicographically, which is the order groups are kept in.
//!
//! Bytes are stored inline (up to [`MAX_DIGEST_LEN`]), so building or copying
//! a digest never allocates. Every block record keeps its own copy.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::config::MAX_DIGEST_LEN;

/// Content digest of one block.
#[derive(Clone, Copy)]
pub struct Digest {
    bytes: [u8; MAX_DIGEST_LEN],
    len: u8,
}

impl Digest {
    /// Copy raw digest bytes. `None` if longer than [`MAX_DIGEST_LEN`].
    #[must_use]
    pub fn new(bytes: &[u8]) -> Option<Self> {
        let len = u8::try_from(bytes.len())
            .ok()
            .filter(|&len| usize::from(len) <= MAX_DIGEST_LEN)?;
        let mut inline = [0u8; MAX_DIGEST_LEN];
        inline[..bytes.len()].copy_from_slice(bytes);
        Some(Self { bytes: inline, len })
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Whether the digest has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lowercase hexadecimal rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Parse a hexadecimal digest.
    ///
    /// # Errors
    ///
    /// [`hex::FromHexError`] on bad digits or odd length, and
    /// `InvalidStringLength` if the decoded digest is too long.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::new(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl<const N: usize> From<[u8; N]> for Digest {
    fn from(bytes: [u8; N]) -> Self {
        const { assert!(N <= MAX_DIGEST_LEN, "digest array too long") };
        let mut inline = [0u8; MAX_DIGEST_LEN];
        inline[..N].copy_from_slice(&bytes);
        // N <= MAX_DIGEST_LEN < 256
        Self {
            bytes: inline,
            len: N as u8,
        }
    }
}

impl PartialEq for Digest {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Digest {}

impl PartialOrd for Digest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Digest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for Digest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl Borrow<[u8]> for Digest {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_unsigned_lexicographic() {
        let low = Digest::from([0x00u8, 0xff]);
        let mid = Digest::from([0x7fu8, 0x00]);
        let high = Digest::from([0x80u8, 0x00]);
        assert!(low < mid);
        // 0x80 must sort above 0x7f (no signed byte comparison)
        assert!(mid < high);
    }

    #[test]
    fn test_prefix_sorts_first() {
        // trailing zero bytes are significant even though padding is zero
        let short = Digest::from([0x01u8]);
        let long = Digest::from([0x01u8, 0x00]);
        assert!(short < long);
        assert_ne!(short, long);
    }

    #[test]
    fn test_equal_bytes_equal_digest() {
        assert_eq!(Digest::new(b"abcd"), Some(Digest::from(*b"abcd")));
    }

    #[test]
    fn test_new_rejects_oversized() {
        assert!(Digest::new(&[0u8; MAX_DIGEST_LEN]).is_some());
        assert!(Digest::new(&[0u8; MAX_DIGEST_LEN + 1]).is_none());
        assert!(Digest::new(&[0u8; 300]).is_none());
    }

    #[test]
    fn test_hex() {
        let digest = Digest::from([0xdeu8, 0xad, 0xbe, 0xef]);
        assert_eq!(digest.to_hex(), "deadbeef");
        assert_eq!(digest.to_string(), "deadbeef");
        assert_eq!(Digest::from_hex("deadbeef"), Ok(digest));
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(Digest::from_hex("abc").is_err());
        assert!(Digest::from_hex("zz").is_err());
        let too_long = "00".repeat(MAX_DIGEST_LEN + 1);
        assert_eq!(
            Digest::from_hex(&too_long),
            Err(hex::FromHexError::InvalidStringLength)
        );
    }
}
