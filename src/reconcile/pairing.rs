//! Cross-side pairing and conflict resolution.

use std::collections::{BTreeSet, HashSet};

use crate::config::{ConflictMode, SyncConfig};
use crate::model::{Listing, Query};
use crate::side::Side;

use super::classify::differs;
use super::plan::{Plan, SidePlan};

/// A path's relationship to its own side's prior state, for cross-side
/// lookups. Distinct from [`super::classify::Classification`] in that it
/// also covers paths untouched on this side (`Unchanged`) and paths this
/// side never had (`Absent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    New,
    Deleted,
    Modified,
    Unchanged,
    Absent,
}

struct SideView<'a> {
    curr: &'a Listing,
    prev: &'a Listing,
    new: &'a BTreeSet<String>,
    deleted: &'a BTreeSet<String>,
    modified: &'a BTreeSet<String>,
}

impl SideView<'_> {
    fn status(&self, path: &str) -> Status {
        if self.new.contains(path) {
            Status::New
        } else if self.deleted.contains(path) {
            Status::Deleted
        } else if self.modified.contains(path) {
            Status::Modified
        } else if self.curr.contains_path(path) && self.prev.contains_path(path) {
            Status::Unchanged
        } else {
            Status::Absent
        }
    }
}

/// The full, mutable pairing state threaded through resolution.
pub struct Resolver<'a> {
    config: &'a SyncConfig,
    a: SideView<'a>,
    b: SideView<'a>,
    plan_a: SidePlan,
    plan_b: SidePlan,
    unresolved_conflicts: BTreeSet<String>,
    resolved: HashSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        config: &'a SyncConfig,
        curr_a: &'a Listing,
        prev_a: &'a Listing,
        new_a: &'a BTreeSet<String>,
        deleted_a: &'a BTreeSet<String>,
        modified_a: &'a BTreeSet<String>,
        curr_b: &'a Listing,
        prev_b: &'a Listing,
        new_b: &'a BTreeSet<String>,
        deleted_b: &'a BTreeSet<String>,
        modified_b: &'a BTreeSet<String>,
    ) -> Self {
        Resolver {
            config,
            a: SideView {
                curr: curr_a,
                prev: prev_a,
                new: new_a,
                deleted: deleted_a,
                modified: modified_a,
            },
            b: SideView {
                curr: curr_b,
                prev: prev_b,
                new: new_b,
                deleted: deleted_b,
                modified: modified_b,
            },
            plan_a: SidePlan::default(),
            plan_b: SidePlan::default(),
            unresolved_conflicts: BTreeSet::new(),
            resolved: HashSet::new(),
        }
    }

    fn side(&self, side: Side) -> &SideView<'a> {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    fn plan_mut(&mut self, side: Side) -> &mut SidePlan {
        match side {
            Side::A => &mut self.plan_a,
            Side::B => &mut self.plan_b,
        }
    }

    /// Applies each side's detected renames, mirroring onto the other side
    /// when it's untouched, transferring when the other side never had or
    /// lost the file, and raising a conflict when the other side
    /// independently modified it.
    pub fn apply_renames(&mut self, side: Side, moves: &[(String, String)]) {
        let other = side.other();
        for (src, dst) in moves {
            self.plan_mut(side).moves.push((src.clone(), dst.clone()));
            self.resolved.insert(src.clone());
            self.resolved.insert(dst.clone());

            match self.side(other).status(src) {
                Status::Unchanged => {
                    self.plan_mut(other).moves.push((src.clone(), dst.clone()));
                    self.resolved.insert(src.clone());
                    self.resolved.insert(dst.clone());
                }
                Status::Deleted => {
                    self.plan_mut(other).transfer_in.insert(dst.clone());
                }
                Status::Modified => {
                    self.raise_conflict(side, dst, other, src);
                }
                Status::Absent => {
                    self.plan_mut(other).transfer_in.insert(dst.clone());
                }
                Status::New => {
                    // The other side independently created a file at the
                    // old path after we renamed it away; treat like a
                    // same-path double-new (compare contents).
                    self.compare_and_resolve_new_new(side, src, other, src);
                }
            }
        }
    }

    fn raise_conflict(&mut self, side_s: Side, path_s: &str, side_o: Side, path_o: &str) {
        self.resolve_conflict(side_s, path_s, side_o, path_o);
    }

    fn compare_and_resolve_new_new(&mut self, side_s: Side, path_s: &str, side_o: Side, path_o: &str) {
        let entry_s = self
            .side(side_s)
            .curr
            .get(Query::Path(path_s))
            .expect("new path present in curr");
        let entry_o = self
            .side(side_o)
            .curr
            .get(Query::Path(path_o))
            .expect("new path present in curr");
        if !differs(
            entry_s,
            entry_o,
            self.config.compare,
            self.config.dt,
            self.config.hash_fail_fallback,
        ) {
            self.resolved.insert(path_o.to_string());
            return;
        }
        self.resolve_conflict(side_s, path_s, side_o, path_o);
    }

    /// The generic per-path cross-side table for every path not already
    /// settled by rename handling.
    pub fn resolve_remaining(&mut self, universe: &BTreeSet<String>) {
        let backup = self.config.backup;
        let paths: Vec<String> = universe
            .iter()
            .filter(|p| !self.resolved.contains(*p))
            .cloned()
            .collect();

        for path in paths {
            let status_a = self.a.status(&path);
            let status_b = self.b.status(&path);
            self.apply_table(&path, status_a, status_b, backup);
        }
    }

    fn apply_table(&mut self, path: &str, status_a: Status, status_b: Status, backup: bool) {
        use Status::{Absent, Deleted, Modified, New, Unchanged};
        match (status_a, status_b) {
            (New, Absent) | (Modified, Absent) => {
                self.plan_b.transfer_in.insert(path.to_string());
                if backup && status_a == Modified && self.b.curr.contains_path(path) {
                    self.plan_b.backup.insert(path.to_string());
                }
            }
            (Absent, New) | (Absent, Modified) => {
                self.plan_a.transfer_in.insert(path.to_string());
                if backup && status_b == Modified && self.a.curr.contains_path(path) {
                    self.plan_a.backup.insert(path.to_string());
                }
            }
            (Modified, Unchanged) => {
                self.plan_b.transfer_in.insert(path.to_string());
                if backup {
                    self.plan_b.backup.insert(path.to_string());
                }
            }
            (Unchanged, Modified) => {
                self.plan_a.transfer_in.insert(path.to_string());
                if backup {
                    self.plan_a.backup.insert(path.to_string());
                }
            }
            (Deleted, Unchanged) => {
                self.plan_b.delete.insert(path.to_string());
                if backup {
                    self.plan_b.backup.insert(path.to_string());
                }
            }
            (Unchanged, Deleted) => {
                self.plan_a.delete.insert(path.to_string());
                if backup {
                    self.plan_a.backup.insert(path.to_string());
                }
            }
            (Deleted, Deleted) | (Deleted, Absent) | (Absent, Deleted) | (Unchanged, Unchanged)
            | (Absent, Absent) | (Unchanged, Absent) | (Absent, Unchanged) => {
                // No action: nothing survives on either side, or both
                // sides already agree.
            }
            (New, New) | (New, Unchanged) | (Unchanged, New) => {
                self.compare_and_resolve_new_new(Side::A, path, Side::B, path);
            }
            (Modified, Modified) | (Deleted, Modified) | (Modified, Deleted) => {
                self.resolve_conflict(Side::A, path, Side::B, path);
            }
            (New, Deleted) | (Deleted, New) | (New, Modified) | (Modified, New) => {
                self.resolve_conflict(Side::A, path, Side::B, path);
            }
        }
    }

    /// Picks a winner per `conflict_mode`, or leaves both sides' files in
    /// place and tags each with the other side's version.
    fn resolve_conflict(&mut self, side_s: Side, path_s: &str, side_o: Side, path_o: &str) {
        self.unresolved_conflicts.insert(path_o.to_string());

        let entry_s = self.side(side_s).curr.get(Query::Path(path_s)).cloned();
        let entry_o = self.side(side_o).curr.get(Query::Path(path_o)).cloned();

        let winner = match self.config.conflict_mode {
            ConflictMode::A => Some(Side::A),
            ConflictMode::B => Some(Side::B),
            ConflictMode::Newer => {
                pick_by(entry_s.as_ref(), side_s, entry_o.as_ref(), side_o, PickDirection::Max, |e| e.mtime)
            }
            ConflictMode::Older => {
                pick_by(entry_s.as_ref(), side_s, entry_o.as_ref(), side_o, PickDirection::Min, |e| e.mtime)
            }
            ConflictMode::Larger => pick_by(entry_s.as_ref(), side_s, entry_o.as_ref(), side_o, PickDirection::Max, |e| {
                Some(e.size as f64)
            }),
            ConflictMode::Smaller => pick_by(entry_s.as_ref(), side_s, entry_o.as_ref(), side_o, PickDirection::Min, |e| {
                Some(e.size as f64)
            }),
            ConflictMode::Tag | ConflictMode::None => None,
        };

        match winner {
            Some(winning_side) => {
                let losing_side = winning_side.other();
                let (losing_path, winning_path) = if losing_side == side_s {
                    (path_s, path_o)
                } else {
                    (path_o, path_s)
                };
                let winning_entry = if winning_side == side_s { entry_s.as_ref() } else { entry_o.as_ref() };

                if winning_entry.is_some() {
                    self.plan_mut(losing_side)
                        .transfer_in
                        .insert(winning_path.to_string());
                    if self.config.backup {
                        self.plan_mut(losing_side).backup.insert(losing_path.to_string());
                    }
                    if self.config.tag_conflict {
                        self.plan_mut(losing_side).tag.insert(losing_path.to_string());
                    }
                } else {
                    // The winning side has no current copy — it deleted the
                    // file. Honor that by removing the loser's copy instead
                    // of transferring a path that doesn't exist.
                    self.plan_mut(losing_side).delete.insert(losing_path.to_string());
                    if self.config.backup {
                        self.plan_mut(losing_side).backup.insert(losing_path.to_string());
                    }
                }
            }
            None => {
                self.plan_mut(side_s).tag.insert(path_s.to_string());
                self.plan_mut(side_o).tag.insert(path_o.to_string());
            }
        }
    }

    pub fn into_plan(self, next_prev_a: Listing, next_prev_b: Listing) -> Plan {
        Plan {
            a: self.plan_a,
            b: self.plan_b,
            unresolved_conflicts: self.unresolved_conflicts,
            next_prev_a,
            next_prev_b,
        }
    }
}

/// Which extreme of the compared attribute wins (`Max` for newer/larger,
/// `Min` for older/smaller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickDirection {
    Max,
    Min,
}

/// Picks whichever of `side_s`/`side_o` has the extremal `attr` value per
/// `direction`. Ties and missing attributes (on either side, or a side
/// missing its `curr` entry entirely) always break to `Side::A`, per
/// spec.md's "breaks to A on tie" — never to whichever side happened to be
/// passed first.
fn pick_by<F>(
    entry_s: Option<&crate::model::FileEntry>,
    side_s: Side,
    entry_o: Option<&crate::model::FileEntry>,
    side_o: Side,
    direction: PickDirection,
    attr: F,
) -> Option<Side>
where
    F: Fn(&crate::model::FileEntry) -> Option<f64>,
{
    let (Some(s), Some(o)) = (entry_s, entry_o) else {
        return Some(Side::A);
    };
    let (Some(sv), Some(ov)) = (attr(s), attr(o)) else {
        return Some(Side::A);
    };
    if sv == ov {
        return Some(Side::A);
    }
    let s_wins = match direction {
        PickDirection::Max => sv > ov,
        PickDirection::Min => sv < ov,
    };
    Some(if s_wins { side_s } else { side_o })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileEntry;
    use crate::reconcile::classify::classify;
    use crate::reconcile::rename::detect_renames;

    fn cfg(extra: &str) -> SyncConfig {
        SyncConfig::parse(&format!(
            "[A]\nremote = \"local:/a\"\n[B]\nremote = \"local:/b\"\n{extra}\n"
        ))
        .unwrap()
    }

    #[test]
    fn one_way_edit_transfers_and_backs_up() {
        let config = cfg("compare = \"hash\"\nbackup = true");
        let prev_a = Listing::from_entries(vec![
            FileEntry::new("x", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let prev_b = prev_a.clone();
        let curr_a = Listing::from_entries(vec![
            FileEntry::new("x", 12, Some(200.0)).with_hash("md5", "bb"),
        ])
        .unwrap();
        let curr_b = prev_b.clone();

        let class_a = classify(&curr_a, &prev_a, config.compare, config.dt, config.hash_fail_fallback);
        let class_b = classify(&curr_b, &prev_b, config.compare, config.dt, config.hash_fail_fallback);

        let mut resolver = Resolver::new(
            &config, &curr_a, &prev_a, &class_a.new, &class_a.deleted, &class_a.modified,
            &curr_b, &prev_b, &class_b.new, &class_b.deleted, &class_b.modified,
        );
        let universe: BTreeSet<String> = ["x".to_string()].into();
        resolver.resolve_remaining(&universe);
        let plan = resolver.into_plan(Listing::empty(), Listing::empty());

        assert!(plan.b.transfer_in.contains("x"));
        assert!(plan.b.backup.contains("x"));
        assert!(plan.a.is_empty());
        assert!(plan.unresolved_conflicts.is_empty());
    }

    #[test]
    fn rename_on_a_mirrors_onto_b() {
        let config = SyncConfig::parse(
            "[A]\nremote = \"local:/a\"\nrenames = \"hash\"\n[B]\nremote = \"local:/b\"\nrenames = \"hash\"\n",
        )
        .unwrap();
        let prev = Listing::from_entries(vec![
            FileEntry::new("a/f.txt", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let curr_a = Listing::from_entries(vec![
            FileEntry::new("b/f.txt", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let curr_b = prev.clone();

        let class_a = classify(&curr_a, &prev, config.compare, config.dt, config.hash_fail_fallback);
        let class_b = classify(&curr_b, &prev, config.compare, config.dt, config.hash_fail_fallback);
        let rename_a = detect_renames(&curr_a, &prev, &class_a.new, &class_a.deleted, config.a.renames_effective(config.compare));

        let mut resolver = Resolver::new(
            &config, &curr_a, &prev, &rename_a.new, &rename_a.deleted, &class_a.modified,
            &curr_b, &prev, &class_b.new, &class_b.deleted, &class_b.modified,
        );
        resolver.apply_renames(Side::A, &rename_a.moves);
        let plan = resolver.into_plan(Listing::empty(), Listing::empty());

        assert_eq!(plan.b.moves, vec![("a/f.txt".to_string(), "b/f.txt".to_string())]);
        assert!(plan.a.transfer_in.is_empty());
        assert!(plan.b.transfer_in.is_empty());
    }

    #[test]
    fn double_modify_conflict_newer_wins() {
        let config = cfg("compare = \"hash\"\nconflict_mode = \"newer\"\ntag_conflict = false");
        let prev = Listing::from_entries(vec![
            FileEntry::new("p", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let curr_a = Listing::from_entries(vec![
            FileEntry::new("p", 11, Some(300.0)).with_hash("md5", "bb"),
        ])
        .unwrap();
        let curr_b = Listing::from_entries(vec![
            FileEntry::new("p", 12, Some(200.0)).with_hash("md5", "cc"),
        ])
        .unwrap();

        let class_a = classify(&curr_a, &prev, config.compare, config.dt, config.hash_fail_fallback);
        let class_b = classify(&curr_b, &prev, config.compare, config.dt, config.hash_fail_fallback);

        let mut resolver = Resolver::new(
            &config, &curr_a, &prev, &class_a.new, &class_a.deleted, &class_a.modified,
            &curr_b, &prev, &class_b.new, &class_b.deleted, &class_b.modified,
        );
        let universe: BTreeSet<String> = ["p".to_string()].into();
        resolver.resolve_remaining(&universe);
        let plan = resolver.into_plan(Listing::empty(), Listing::empty());

        assert!(plan.b.transfer_in.contains("p"));
        assert!(plan.b.backup.contains("p"));
        assert!(plan.a.transfer_in.is_empty());
        assert!(plan.a.tag.is_empty());
        assert_eq!(plan.unresolved_conflicts, BTreeSet::from(["p".to_string()]));
    }

    #[test]
    fn delete_vs_modify_transfers_other_direction() {
        let config = cfg("conflict_mode = \"b\"");
        let prev = Listing::from_entries(vec![FileEntry::new("p", 10, Some(100.0))]).unwrap();
        let curr_a = Listing::empty();
        let curr_b = Listing::from_entries(vec![FileEntry::new("p", 20, Some(300.0))]).unwrap();

        let class_a = classify(&curr_a, &prev, config.compare, config.dt, config.hash_fail_fallback);
        let class_b = classify(&curr_b, &prev, config.compare, config.dt, config.hash_fail_fallback);

        let mut resolver = Resolver::new(
            &config, &curr_a, &prev, &class_a.new, &class_a.deleted, &class_a.modified,
            &curr_b, &prev, &class_b.new, &class_b.deleted, &class_b.modified,
        );
        let universe: BTreeSet<String> = ["p".to_string()].into();
        resolver.resolve_remaining(&universe);
        let plan = resolver.into_plan(Listing::empty(), Listing::empty());

        assert!(plan.a.transfer_in.contains("p"));
        assert!(plan.a.backup.is_empty());
        assert!(plan.a.delete.is_empty());
        assert!(plan.b.delete.is_empty());
    }

    #[test]
    fn delete_vs_modify_winner_deleted_deletes_loser_instead_of_transferring() {
        // prev = {p}; A deletes p, B modifies p; conflict_mode picks A,
        // the side with no current copy. There is nothing to transfer —
        // honoring A's win means removing B's copy instead.
        let config = cfg("conflict_mode = \"a\"\nbackup = true");
        let prev = Listing::from_entries(vec![FileEntry::new("p", 10, Some(100.0))]).unwrap();
        let curr_a = Listing::empty();
        let curr_b = Listing::from_entries(vec![FileEntry::new("p", 20, Some(300.0))]).unwrap();

        let class_a = classify(&curr_a, &prev, config.compare, config.dt, config.hash_fail_fallback);
        let class_b = classify(&curr_b, &prev, config.compare, config.dt, config.hash_fail_fallback);

        let mut resolver = Resolver::new(
            &config, &curr_a, &prev, &class_a.new, &class_a.deleted, &class_a.modified,
            &curr_b, &prev, &class_b.new, &class_b.deleted, &class_b.modified,
        );
        let universe: BTreeSet<String> = ["p".to_string()].into();
        resolver.resolve_remaining(&universe);
        let plan = resolver.into_plan(Listing::empty(), Listing::empty());

        assert!(plan.b.delete.contains("p"));
        assert!(plan.b.backup.contains("p"));
        assert!(!plan.b.transfer_in.contains("p"));
        assert!(plan.a.delete.is_empty());
        assert!(plan.a.transfer_in.is_empty());
    }

    #[test]
    fn conflict_mode_older_picks_the_older_side() {
        let config = cfg("compare = \"hash\"\nconflict_mode = \"older\"\ntag_conflict = false");
        let prev = Listing::from_entries(vec![
            FileEntry::new("p", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let curr_a = Listing::from_entries(vec![
            FileEntry::new("p", 11, Some(100.0)).with_hash("md5", "bb"),
        ])
        .unwrap();
        let curr_b = Listing::from_entries(vec![
            FileEntry::new("p", 12, Some(200.0)).with_hash("md5", "cc"),
        ])
        .unwrap();

        let class_a = classify(&curr_a, &prev, config.compare, config.dt, config.hash_fail_fallback);
        let class_b = classify(&curr_b, &prev, config.compare, config.dt, config.hash_fail_fallback);

        let mut resolver = Resolver::new(
            &config, &curr_a, &prev, &class_a.new, &class_a.deleted, &class_a.modified,
            &curr_b, &prev, &class_b.new, &class_b.deleted, &class_b.modified,
        );
        let universe: BTreeSet<String> = ["p".to_string()].into();
        resolver.resolve_remaining(&universe);
        let plan = resolver.into_plan(Listing::empty(), Listing::empty());

        // A is older (mtime 100 vs B's 200), so A wins: B is the loser and
        // fetches A's copy.
        assert!(plan.b.transfer_in.contains("p"));
        assert!(plan.a.transfer_in.is_empty());
    }

    #[test]
    fn conflict_mode_smaller_picks_the_smaller_side() {
        let config = cfg("compare = \"hash\"\nconflict_mode = \"smaller\"\ntag_conflict = false");
        let prev = Listing::from_entries(vec![
            FileEntry::new("p", 10, Some(100.0)).with_hash("md5", "aa"),
        ])
        .unwrap();
        let curr_a = Listing::from_entries(vec![
            FileEntry::new("p", 50, Some(150.0)).with_hash("md5", "bb"),
        ])
        .unwrap();
        let curr_b = Listing::from_entries(vec![
            FileEntry::new("p", 5, Some(150.0)).with_hash("md5", "cc"),
        ])
        .unwrap();

        let class_a = classify(&curr_a, &prev, config.compare, config.dt, config.hash_fail_fallback);
        let class_b = classify(&curr_b, &prev, config.compare, config.dt, config.hash_fail_fallback);

        let mut resolver = Resolver::new(
            &config, &curr_a, &prev, &class_a.new, &class_a.deleted, &class_a.modified,
            &curr_b, &prev, &class_b.new, &class_b.deleted, &class_b.modified,
        );
        let universe: BTreeSet<String> = ["p".to_string()].into();
        resolver.resolve_remaining(&universe);
        let plan = resolver.into_plan(Listing::empty(), Listing::empty());

        // B is smaller (5 bytes vs A's 50), so B wins: A is the loser and
        // fetches B's copy.
        assert!(plan.a.transfer_in.contains("p"));
        assert!(plan.b.transfer_in.is_empty());
    }

    #[test]
    fn pick_by_breaks_ties_and_missing_data_to_side_a() {
        let entry = FileEntry::new("p", 10, Some(100.0));
        // Equal values: tie breaks to A regardless of which side is passed
        // as `side_s`.
        assert_eq!(
            pick_by(Some(&entry), Side::B, Some(&entry), Side::A, PickDirection::Max, |e| e.mtime),
            Some(Side::A)
        );
        // Missing mtime on either side falls back to A.
        let no_mtime = FileEntry::new("p", 10, None);
        assert_eq!(
            pick_by(Some(&no_mtime), Side::B, Some(&entry), Side::A, PickDirection::Max, |e| e.mtime),
            Some(Side::A)
        );
        // A missing curr entry entirely (e.g. the side deleted the file)
        // also falls back to A.
        assert_eq!(
            pick_by(None, Side::B, Some(&entry), Side::A, PickDirection::Max, |e| e.mtime),
            Some(Side::A)
        );
    }
}
