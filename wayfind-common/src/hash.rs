//! Stable content hashing for cache keys and derived identifiers

use sha2::{Digest, Sha256};

/// Unit separator between hashed parts so ["ab","c"] and ["a","bc"] differ
const PART_SEPARATOR: char = '\u{1f}';

/// Lowercase hex SHA-256 of a string
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Hash an ordered sequence of parts into a hex signature
pub fn signature<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            let mut buf = [0u8; 4];
            hasher.update(PART_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(part.as_ref().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// `{prefix}_{first 16 hex chars}` identifier derived from `parts`
pub fn short_id<I, S>(prefix: &str, parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sig = signature(parts);
    format!("{}_{}", prefix, &sig[..16])
}
