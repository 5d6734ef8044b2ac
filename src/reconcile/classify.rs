//! Per-side classification: partitioning one side's current and prior
//! listing into new, deleted, common, and modified paths.

use std::collections::BTreeSet;

use crate::config::{Compare, HashFailFallback};
use crate::model::{FileEntry, Listing};

/// `new[S]` / `deleted[S]` / `common[S]` / `modified[S]` for one side.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub new: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub common: BTreeSet<String>,
    pub modified: BTreeSet<String>,
}

/// Whether `curr` differs from `prev` under `compare`.
#[must_use]
pub fn differs(
    curr: &FileEntry,
    prev: &FileEntry,
    compare: Compare,
    dt: f64,
    hash_fail_fallback: HashFailFallback,
) -> bool {
    match compare {
        Compare::Size => curr.size != prev.size,
        Compare::Mtime => match (curr.mtime, prev.mtime) {
            (Some(c), Some(p)) => (c - p).abs() > dt,
            _ => curr.size != prev.size,
        },
        Compare::Hash => match curr.hashes_agree(prev) {
            Some(agree) => !agree,
            None => match hash_fail_fallback {
                HashFailFallback::Size => curr.size != prev.size,
                HashFailFallback::Mtime => match (curr.mtime, prev.mtime) {
                    (Some(c), Some(p)) => (c - p).abs() > dt,
                    _ => curr.size != prev.size,
                },
                HashFailFallback::None => false,
            },
        },
    }
}

/// Partitions `curr`/`prev` by `Path`, then computes `modified` over the
/// `common` subset.
#[must_use]
pub fn classify(
    curr: &Listing,
    prev: &Listing,
    compare: Compare,
    dt: f64,
    hash_fail_fallback: HashFailFallback,
) -> Classification {
    let mut result = Classification::default();

    for path in curr.paths() {
        if prev.contains_path(path) {
            result.common.insert(path.to_string());
        } else {
            result.new.insert(path.to_string());
        }
    }
    for path in prev.paths() {
        if !curr.contains_path(path) {
            result.deleted.insert(path.to_string());
        }
    }

    for path in &result.common {
        let curr_entry = curr
            .get(crate::model::Query::Path(path))
            .expect("path from curr.paths()");
        let prev_entry = prev
            .get(crate::model::Query::Path(path))
            .expect("path confirmed common");
        if differs(curr_entry, prev_entry, compare, dt, hash_fail_fallback) {
            result.modified.insert(path.clone());
        }
    }

    result
}
