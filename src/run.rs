//! Run Orchestrator: ties listing acquisition, reconciliation, and dispatch
//! into one job execution: lock both sides, acquire listings, reconcile,
//! optionally confirm, dispatch, then always release the lock.

use crate::acquire::{self, SideListings};
use crate::agent::{Agent, lock_acquire, lock_release};
use crate::config::SyncConfig;
use crate::dispatch;
use crate::error::SyncError;
use crate::reconcile::{self, Plan};
use crate::side::Side;

/// Which side(s) `--break-lock` should forcibly unlock before this run
/// proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakLockTarget {
    A,
    B,
    Both,
}

impl BreakLockTarget {
    fn covers(self, side: Side) -> bool {
        matches!((self, side), (BreakLockTarget::Both, _) | (BreakLockTarget::A, Side::A) | (BreakLockTarget::B, Side::B))
    }
}

/// Run-time flags that don't belong in the persisted job config (those go
/// through [`SyncConfig::apply_override`] instead).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub interactive: bool,
    pub break_lock: Option<BreakLockTarget>,
}

/// What a completed call to [`run`] produced.
#[derive(Debug)]
pub enum RunOutcome {
    /// The plan was computed and dispatched.
    Dispatched(Plan),
    /// `--dry-run` was set: the plan was computed but nothing was executed.
    DryRun(Plan),
    /// Interactive confirmation declined the plan; nothing was executed.
    Declined(Plan),
}

fn extra_flags(config: &SyncConfig, side: Side) -> Vec<String> {
    let sc = match side {
        Side::A => &config.a,
        Side::B => &config.b,
    };
    config.rclone_flags.iter().chain(&sc.rclone_flags).cloned().collect()
}

fn workdir(config: &SyncConfig, side: Side) -> String {
    match side {
        Side::A => config.a.effective_workdir(),
        Side::B => config.b.effective_workdir(),
    }
}

/// Checks both sides are unlocked (breaking the lock first where
/// `--break-lock` covers that side), refusing to proceed if either lock is
/// still held. Runs before any listing is acquired on either side.
fn ensure_unlocked(agent: &Agent, config: &SyncConfig, options: &RunOptions) -> Result<(), SyncError> {
    for side in Side::ALL {
        let wd = workdir(config, side);
        let flags = extra_flags(config, side);
        if options.break_lock.is_some_and(|t| t.covers(side)) {
            lock_release(agent, &wd, config.job_name(), &flags)?;
            continue;
        }
        if !crate::agent::is_unlocked(agent, &wd, config.job_name(), &flags)? {
            return Err(SyncError::LockedRemoteError {
                side,
                path: format!("{wd}/LOCK/LOCK_{}", config.job_name()),
            });
        }
    }
    Ok(())
}

fn acquire_locks(agent: &Agent, config: &SyncConfig, run_id: &str) -> Result<(), SyncError> {
    for side in Side::ALL {
        lock_acquire(agent, &workdir(config, side), config.job_name(), run_id, &extra_flags(config, side))?;
    }
    Ok(())
}

fn release_locks(agent: &Agent, config: &SyncConfig) {
    for side in Side::ALL {
        if let Err(e) = lock_release(agent, &workdir(config, side), config.job_name(), &extra_flags(config, side)) {
            tracing::warn!(%side, error = %e, "failed to release lock on {side}; next run may need --break-lock");
        }
    }
}

fn acquire_both(agent: &Agent, config: &SyncConfig) -> Result<(SideListings, SideListings), SyncError> {
    let mut result_a = None;
    let mut result_b = None;
    std::thread::scope(|scope| {
        let handle_a = scope.spawn(|| acquire::acquire(agent, config, Side::A));
        let handle_b = scope.spawn(|| acquire::acquire(agent, config, Side::B));
        result_a = Some(handle_a.join().unwrap_or_else(|_| {
            Err(SyncError::ListingError {
                side: Side::A,
                message: "listing acquisition thread panicked".to_string(),
            })
        }));
        result_b = Some(handle_b.join().unwrap_or_else(|_| {
            Err(SyncError::ListingError {
                side: Side::B,
                message: "listing acquisition thread panicked".to_string(),
            })
        }));
    });
    Ok((
        result_a.expect("thread scope joined")?,
        result_b.expect("thread scope joined")?,
    ))
}

/// Runs one full job execution: lock → acquire → reconcile → (confirm) →
/// (dispatch) → release lock.
///
/// `confirm` is only invoked when `options.interactive` is set; it receives
/// the computed plan and returns whether to proceed.
///
/// # Errors
/// Any fatal condition from locking, listing acquisition, or dispatch. The
/// lock is always released before returning, on every path including this
/// one — a failed run never requires `--break-lock` on the next attempt.
pub fn run(
    agent: &Agent,
    config: &SyncConfig,
    run_id: &str,
    options: &RunOptions,
    confirm: impl FnOnce(&Plan) -> bool,
) -> Result<RunOutcome, SyncError> {
    ensure_unlocked(agent, config, options)?;
    acquire_locks(agent, config, run_id)?;

    let outcome = (|| -> Result<RunOutcome, SyncError> {
        let (a, b) = acquire_both(agent, config)?;
        let plan = reconcile::reconcile(&a.curr, &a.prev, &b.curr, &b.prev, config);

        if plan.is_empty() {
            return Ok(RunOutcome::Dispatched(plan));
        }

        if options.interactive && !confirm(&plan) {
            return Ok(RunOutcome::Declined(plan));
        }

        if options.dry_run {
            return Ok(RunOutcome::DryRun(plan));
        }

        dispatch::dispatch(agent, config, &plan, &a.curr, &b.curr, run_id)?;
        Ok(RunOutcome::Dispatched(plan))
    })();

    release_locks(agent, config);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_lock_target_covers_matches_expected_sides() {
        assert!(BreakLockTarget::Both.covers(Side::A));
        assert!(BreakLockTarget::Both.covers(Side::B));
        assert!(BreakLockTarget::A.covers(Side::A));
        assert!(!BreakLockTarget::A.covers(Side::B));
        assert!(BreakLockTarget::B.covers(Side::B));
        assert!(!BreakLockTarget::B.covers(Side::A));
    }
}
