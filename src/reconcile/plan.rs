//! The reconciliation engine's output.

use std::collections::BTreeSet;

use crate::model::Listing;

/// Per-side action sets, keyed by `Path`. `transfer_in` and `delete` are
/// expected to stay disjoint; `backup` and `tag` may overlap either.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidePlan {
    /// Paths to copy in from the other side.
    pub transfer_in: BTreeSet<String>,
    /// Paths to remove from this side.
    pub delete: BTreeSet<String>,
    /// `(src, dst)` ordered pairs: a server-side rename on this side.
    pub moves: Vec<(String, String)>,
    /// Paths preserved into this run's backup directory before being
    /// overwritten or deleted. May overlap `transfer_in` and `delete`.
    pub backup: BTreeSet<String>,
    /// Paths for which a conflict-tagged copy of the *other* side's content
    /// is written locally.
    pub tag: BTreeSet<String>,
}

impl SidePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfer_in.is_empty()
            && self.delete.is_empty()
            && self.moves.is_empty()
            && self.backup.is_empty()
            && self.tag.is_empty()
    }
}

/// The full plan for one run, plus the listings that become next run's
/// `prev[A]`/`prev[B]` once the dispatcher has applied it.
#[derive(Debug, Clone)]
pub struct Plan {
    pub a: SidePlan,
    pub b: SidePlan,
    /// Paths where neither side picked a winner (`conflict_mode` is `tag`
    /// or `none`): both sides keep their own file.
    pub unresolved_conflicts: BTreeSet<String>,
    /// The listings to persist as next run's `prev[A]`/`prev[B]`, before the
    /// dispatcher folds in the effect of transfers/moves/deletes it actually
    /// executes.
    pub next_prev_a: Listing,
    pub next_prev_b: Listing,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.a.is_empty() && self.b.is_empty() && self.unresolved_conflicts.is_empty()
    }
}
