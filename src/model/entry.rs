//! A single file entry, as seen in a listing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One file as recorded by a listing, either freshly fetched from the agent
/// or deserialized from a persisted prior listing.
///
/// `mtime` is seconds since the epoch rather than a typed timestamp,
/// matching the agent's own `ModTime` (parsed from RFC3339) and the
/// persisted JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "mtime", skip_serializing_if = "Option::is_none")]
    pub mtime: Option<f64>,
    #[serde(rename = "Hashes", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hashes: BTreeMap<String, String>,

    /// Unknown fields from a persisted listing, kept so a round trip through
    /// a sidecar reader doesn't silently drop data. Never populated on a
    /// freshly-listed entry, and never re-emitted by the core itself.
    #[serde(flatten, skip_serializing)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FileEntry {
    #[must_use]
    pub fn new(path: impl Into<String>, size: u64, mtime: Option<f64>) -> Self {
        FileEntry {
            path: path.into(),
            size,
            mtime,
            hashes: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_hash(mut self, algo: impl Into<String>, digest: impl Into<String>) -> Self {
        self.hashes.insert(algo.into(), digest.into());
        self
    }

    /// Whether this entry and `other` share at least one hash algorithm,
    /// and if so, whether all shared digests agree.
    #[must_use]
    pub fn hashes_agree(&self, other: &FileEntry) -> Option<bool> {
        let mut shared = false;
        for (algo, digest) in &self.hashes {
            if let Some(other_digest) = other.hashes.get(algo) {
                shared = true;
                if digest != other_digest {
                    return Some(false);
                }
            }
        }
        shared.then_some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_agree_true_when_shared_digest_matches() {
        let a = FileEntry::new("a", 1, None).with_hash("md5", "aa");
        let b = FileEntry::new("a", 1, None).with_hash("md5", "aa");
        assert_eq!(a.hashes_agree(&b), Some(true));
    }

    #[test]
    fn hashes_agree_false_when_shared_digest_differs() {
        let a = FileEntry::new("a", 1, None).with_hash("md5", "aa");
        let b = FileEntry::new("a", 1, None).with_hash("md5", "bb");
        assert_eq!(a.hashes_agree(&b), Some(false));
    }

    #[test]
    fn hashes_agree_none_when_no_algorithm_shared() {
        let a = FileEntry::new("a", 1, None).with_hash("md5", "aa");
        let b = FileEntry::new("a", 1, None).with_hash("sha1", "bb");
        assert_eq!(a.hashes_agree(&b), None);
    }
}
