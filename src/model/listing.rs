//! Listing: an indexed, immutable-after-construction set of file entries.

use std::collections::HashMap;

use super::entry::FileEntry;

/// A query against a [`Listing`]'s indexed attributes.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    Path(&'a str),
    /// `(Path, Size, mtime)` identity triple.
    Identity(&'a str, u64, f64),
}

/// A set of file entries with a unique `Path`, indexed for lookup by `Path`
/// and by the `(Path, Size, mtime)` identity triple.
///
/// Entries are inserted once and never mutated in place: annotating an
/// entry (e.g. attaching a re-fetched hash) means removing it and
/// re-inserting the amended copy, which keeps the indexes honest without
/// giving callers a handle into table-internal state.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    by_path: HashMap<String, FileEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicatePath;

impl Listing {
    #[must_use]
    pub fn empty() -> Self {
        Listing {
            by_path: HashMap::new(),
        }
    }

    #[must_use]
    pub fn from_entries(entries: Vec<FileEntry>) -> Result<Self, DuplicatePath> {
        let mut listing = Listing::empty();
        for entry in entries {
            listing.insert(entry)?;
        }
        Ok(listing)
    }

    /// Inserts `entry`. Fails if `Path` is already present.
    pub fn insert(&mut self, entry: FileEntry) -> Result<(), DuplicatePath> {
        if self.by_path.contains_key(&entry.path) {
            return Err(DuplicatePath);
        }
        self.by_path.insert(entry.path.clone(), entry);
        Ok(())
    }

    /// Removes the entry with this `Path`, if present. Idempotent.
    pub fn remove(&mut self, path: &str) -> Option<FileEntry> {
        self.by_path.remove(path)
    }

    #[must_use]
    pub fn get(&self, query: Query<'_>) -> Option<&FileEntry> {
        match query {
            Query::Path(path) => self.by_path.get(path),
            Query::Identity(path, size, mtime) => self.by_path.get(path).filter(|e| {
                e.size == size && e.mtime.is_some_and(|m| m.to_bits() == mtime.to_bits())
            }),
        }
    }

    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn iterate(&self) -> impl Iterator<Item = &FileEntry> {
        self.by_path.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    #[must_use]
    pub fn paths(&self) -> std::collections::HashSet<&str> {
        self.by_path.keys().map(String::as_str).collect()
    }

    /// Serializes to the persisted JSON array form used for `prev` state.
    /// Order is sorted by `Path` for a stable, diffable on-disk
    /// representation.
    #[must_use]
    pub fn to_json_array(&self) -> Vec<&FileEntry> {
        let mut entries: Vec<&FileEntry> = self.by_path.values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicate_path() {
        let mut listing = Listing::empty();
        listing.insert(FileEntry::new("a", 1, None)).unwrap();
        assert!(listing.insert(FileEntry::new("a", 2, None)).is_err());
    }

    #[test]
    fn get_by_path() {
        let mut listing = Listing::empty();
        listing.insert(FileEntry::new("a", 1, None)).unwrap();
        assert!(listing.get(Query::Path("a")).is_some());
        assert!(listing.get(Query::Path("b")).is_none());
    }

    #[test]
    fn get_by_identity_triple() {
        let mut listing = Listing::empty();
        listing.insert(FileEntry::new("a", 1, Some(100.0))).unwrap();
        assert!(listing.get(Query::Identity("a", 1, 100.0)).is_some());
        assert!(listing.get(Query::Identity("a", 1, 200.0)).is_none());
        assert!(listing.get(Query::Identity("a", 2, 100.0)).is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut listing = Listing::empty();
        listing.insert(FileEntry::new("a", 1, None)).unwrap();
        assert!(listing.remove("a").is_some());
        assert!(listing.remove("a").is_none());
    }
}
