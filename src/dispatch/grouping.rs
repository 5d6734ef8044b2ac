//! Move grouping by longest common path suffix: turns a set of `(src, dst)`
//! rename pairs into the fewest `move`/`moveto` agent calls needed to
//! dispatch them.

use std::collections::BTreeMap;

/// One dispatchable move action, chosen from a set of `(src, dst)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveAction {
    /// A single `moveto src dst` call — either the leaf name itself
    /// changed, or this was the only move sharing its directory prefix.
    Single { src: String, dst: String },
    /// One `move src_dir dst_dir --files-from <suffixes>` call covering
    /// every suffix sharing that directory-prefix pair.
    Grouped {
        src_dir: String,
        dst_dir: String,
        suffixes: Vec<String>,
    },
}

fn split_parts(path: &str) -> Vec<&str> {
    path.split('/').collect()
}

fn join_parts(parts: &[&str]) -> String {
    parts.join("/")
}

/// Groups `(src, dst)` move pairs into dispatchable actions: pairs sharing a
/// common directory-prefix-pair are grouped into one `move --files-from`
/// call; everything else (including groups that end up with only one
/// member) becomes a `moveto`.
///
/// Order of `moves` is preserved within a group and across singleton
/// actions, for deterministic dispatch order.
#[must_use]
pub fn group_moves(moves: &[(String, String)]) -> Vec<MoveAction> {
    let mut singles = Vec::new();
    let mut groups: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    let mut group_order: Vec<(String, String)> = Vec::new();

    for (src, dst) in moves {
        let src_parts = split_parts(src);
        let dst_parts = split_parts(dst);

        let mut common = 0;
        let max_len = src_parts.len().max(dst_parts.len());
        for i in 0..max_len {
            let s = src_parts.len().checked_sub(i + 1).map(|idx| src_parts[idx]);
            let d = dst_parts.len().checked_sub(i + 1).map(|idx| dst_parts[idx]);
            if s != d {
                break;
            }
            common += 1;
        }

        if common == 0 {
            singles.push(MoveAction::Single {
                src: src.clone(),
                dst: dst.clone(),
            });
            continue;
        }

        let src_dir = join_parts(&src_parts[..src_parts.len() - common]);
        let dst_dir = join_parts(&dst_parts[..dst_parts.len() - common]);
        let suffix = join_parts(&src_parts[src_parts.len() - common..]);

        let key = (src_dir, dst_dir);
        if !groups.contains_key(&key) {
            group_order.push(key.clone());
        }
        groups.entry(key).or_default().push(suffix);
    }

    let mut actions = singles;
    for key in group_order {
        let suffixes = groups.remove(&key).expect("key was just inserted");
        if suffixes.len() == 1 {
            let (src_dir, dst_dir) = key;
            let suffix = &suffixes[0];
            let src = if src_dir.is_empty() {
                suffix.clone()
            } else {
                format!("{src_dir}/{suffix}")
            };
            let dst = if dst_dir.is_empty() {
                suffix.clone()
            } else {
                format!("{dst_dir}/{suffix}")
            };
            actions.push(MoveAction::Single { src, dst });
        } else {
            let (src_dir, dst_dir) = key;
            actions.push(MoveAction::Grouped {
                src_dir,
                dst_dir,
                suffixes,
            });
        }
    }
    actions
}
