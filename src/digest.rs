//! Key digests used for bucket placement.

use sha2::{Digest as _, Sha256};

/// Maps a key to the digest string that names its bucket.
///
/// Implementations must be deterministic: the same key always yields the
/// same digest. Distinct keys may share a digest; the table then chains
/// them and tells them apart by key comparison.
pub trait KeyDigest {
    fn digest(&self, key: &str) -> String;
}

/// SHA-256 over the key's UTF-8 bytes, rendered as 64 lowercase hex chars.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sha256Digest;

impl KeyDigest for Sha256Digest {
    #[inline]
    fn digest(&self, key: &str) -> String {
        format!("{:x}", Sha256::digest(key.as_bytes()))
    }
}
