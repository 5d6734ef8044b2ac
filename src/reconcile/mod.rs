//! Reconciliation Engine: the core, pure algorithm turning four listings
//! into a [`Plan`].

pub mod classify;
pub mod pairing;
pub mod plan;
pub mod rename;

use std::collections::BTreeSet;

use crate::config::SyncConfig;
use crate::model::{Listing, Query};
use crate::side::Side;

pub use plan::{Plan, SidePlan};

/// Runs the full reconciliation algorithm: per-side classification, rename
/// detection, cross-side pairing and conflict resolution, producing a
/// [`Plan`] plus the listings each side should persist as next run's
/// `prev`.
#[must_use]
pub fn reconcile(
    curr_a: &Listing,
    prev_a: &Listing,
    curr_b: &Listing,
    prev_b: &Listing,
    config: &SyncConfig,
) -> Plan {
    let class_a = classify::classify(curr_a, prev_a, config.compare, config.dt, config.hash_fail_fallback);
    let class_b = classify::classify(curr_b, prev_b, config.compare, config.dt, config.hash_fail_fallback);

    let renames_a = rename::detect_renames(
        curr_a,
        prev_a,
        &class_a.new,
        &class_a.deleted,
        config.a.renames_effective(config.compare),
    );
    let renames_b = rename::detect_renames(
        curr_b,
        prev_b,
        &class_b.new,
        &class_b.deleted,
        config.b.renames_effective(config.compare),
    );

    let mut resolver = pairing::Resolver::new(
        config,
        curr_a,
        prev_a,
        &renames_a.new,
        &renames_a.deleted,
        &class_a.modified,
        curr_b,
        prev_b,
        &renames_b.new,
        &renames_b.deleted,
        &class_b.modified,
    );

    resolver.apply_renames(Side::A, &renames_a.moves);
    resolver.apply_renames(Side::B, &renames_b.moves);

    let mut universe = BTreeSet::new();
    universe.extend(renames_a.new.iter().cloned());
    universe.extend(renames_a.deleted.iter().cloned());
    universe.extend(class_a.modified.iter().cloned());
    universe.extend(renames_b.new.iter().cloned());
    universe.extend(renames_b.deleted.iter().cloned());
    universe.extend(class_b.modified.iter().cloned());
    resolver.resolve_remaining(&universe);

    let mut result = resolver.into_plan(Listing::empty(), Listing::empty());
    result.next_prev_a = synthesize_next_prev(curr_a, curr_b, &result.a);
    result.next_prev_b = synthesize_next_prev(curr_b, curr_a, &result.b);
    result
}

/// Derives the listing side `S` should persist as next run's `prev[S]`:
/// `curr[S]` with this run's moves, deletes, and inbound transfers folded
/// in. A side's own detected renames are already reflected in its `curr`
/// (the file already lives at the new path there); only a *mirrored* move
/// (the other side's rename, applied here) still has the file under its old
/// path in `curr[S]`, so the rename step below is a no-op except in that
/// case.
fn synthesize_next_prev(curr_s: &Listing, curr_o: &Listing, plan_s: &SidePlan) -> Listing {
    let mut next = curr_s.clone();

    for (src, dst) in &plan_s.moves {
        if let Some(mut entry) = next.remove(src) {
            entry.path = dst.clone();
            let _ = next.insert(entry);
        }
    }
    for path in &plan_s.delete {
        next.remove(path);
    }
    for path in &plan_s.transfer_in {
        if let Some(other_entry) = curr_o.get(Query::Path(path)) {
            let mut entry = other_entry.clone();
            entry.path = path.clone();
            next.remove(path);
            let _ = next.insert(entry);
        }
    }

    next
}


// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------
