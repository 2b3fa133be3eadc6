//! Utility functions and helpers.

pub mod date;

use sha2::{Digest, Sha256};

/// Stable id derived from a channel name and a document body.
///
/// Identical events map to the same id, so create-only writes keyed on it
/// keep the first copy.
pub fn content_id(channel: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(channel.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
