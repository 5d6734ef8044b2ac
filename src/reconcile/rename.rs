//! One-to-one rename detection for one side.

use std::collections::{BTreeSet, HashMap};

use crate::config::RenameAttr;
use crate::model::{FileEntry, Listing, Query};

/// The result of rename detection for one side: the matched pairs, and the
/// `new`/`deleted` sets with matched paths removed.
#[derive(Debug, Clone, Default)]
pub struct RenameResult {
    /// `(deleted_path, new_path)` ordered pairs.
    pub moves: Vec<(String, String)>,
    pub new: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

fn attr_key(entry: &FileEntry, attr: RenameAttr) -> Option<String> {
    match attr {
        RenameAttr::Size => Some(format!("size:{}", entry.size)),
        RenameAttr::Mtime => entry.mtime.map(|m| format!("mtime:{}", m.to_bits())),
        RenameAttr::Hash => {
            let mut algos: Vec<&String> = entry.hashes.keys().collect();
            algos.sort();
            let algo = algos.first()?;
            Some(format!("hash:{}:{}", algo, entry.hashes[*algo]))
        }
        RenameAttr::None => None,
    }
}

/// Matches `new` against `deleted` by `attr`, requiring one-to-one matches.
/// Entries whose key collides across more than one candidate on either side
/// are left unmatched rather than guessed at.
#[must_use]
pub fn detect_renames(
    curr: &Listing,
    prev: &Listing,
    new: &BTreeSet<String>,
    deleted: &BTreeSet<String>,
    attr: RenameAttr,
) -> RenameResult {
    if attr == RenameAttr::None {
        return RenameResult {
            moves: Vec::new(),
            new: new.clone(),
            deleted: deleted.clone(),
        };
    }

    let mut new_by_key: HashMap<String, Vec<&str>> = HashMap::new();
    for path in new {
        let entry = curr.get(Query::Path(path)).expect("path from new set");
        if let Some(key) = attr_key(entry, attr) {
            new_by_key.entry(key).or_default().push(path.as_str());
        }
    }
    let mut deleted_by_key: HashMap<String, Vec<&str>> = HashMap::new();
    for path in deleted {
        let entry = prev.get(Query::Path(path)).expect("path from deleted set");
        if let Some(key) = attr_key(entry, attr) {
            deleted_by_key.entry(key).or_default().push(path.as_str());
        }
    }

    let mut moves = Vec::new();
    let mut matched_new = BTreeSet::new();
    let mut matched_deleted = BTreeSet::new();

    let mut keys: Vec<&String> = new_by_key.keys().collect();
    keys.sort();
    for key in keys {
        let Some(news) = new_by_key.get(key) else { continue };
        let Some(dels) = deleted_by_key.get(key) else { continue };
        if news.len() == 1 && dels.len() == 1 {
            moves.push((dels[0].to_string(), news[0].to_string()));
            matched_new.insert(news[0].to_string());
            matched_deleted.insert(dels[0].to_string());
        }
    }

    RenameResult {
        moves,
        new: new.difference(&matched_new).cloned().collect(),
        deleted: deleted.difference(&matched_deleted).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_one_to_one_by_hash() {
        let curr = Listing::from_entries(vec![
            FileEntry::new("b/f.txt", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let prev = Listing::from_entries(vec![
            FileEntry::new("a/f.txt", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let new = BTreeSet::from(["b/f.txt".to_string()]);
        let deleted = BTreeSet::from(["a/f.txt".to_string()]);

        let result = detect_renames(&curr, &prev, &new, &deleted, RenameAttr::Hash);
        assert_eq!(result.moves, vec![("a/f.txt".to_string(), "b/f.txt".to_string())]);
        assert!(result.new.is_empty());
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn ambiguous_match_is_left_unrenamed() {
        let curr = Listing::from_entries(vec![
            FileEntry::new("b1.txt", 10, None).with_hash("md5", "aa"),
            FileEntry::new("b2.txt", 10, None).with_hash("md5", "aa"),
        ])
        .unwrap();
        let prev = Listing::from_entries(vec![
            FileEntry::new("a1.txt", 10, None).with_hash("md5", "aa"),
        ])
        .unwrap();
        let new = BTreeSet::from(["b1.txt".to_string(), "b2.txt".to_string()]);
        let deleted = BTreeSet::from(["a1.txt".to_string()]);

        let result = detect_renames(&curr, &prev, &new, &deleted, RenameAttr::Hash);
        assert!(result.moves.is_empty());
        assert_eq!(result.new, new);
        assert_eq!(result.deleted, deleted);
    }

    #[test]
    fn disabled_when_attr_is_none() {
        let curr = Listing::empty();
        let prev = Listing::empty();
        let new = BTreeSet::from(["x".to_string()]);
        let deleted = BTreeSet::from(["y".to_string()]);
        let result = detect_renames(&curr, &prev, &new, &deleted, RenameAttr::None);
        assert!(result.moves.is_empty());
        assert_eq!(result.new, new);
        assert_eq!(result.deleted, deleted);
    }
}
