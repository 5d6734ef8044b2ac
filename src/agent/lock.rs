//! Advisory lock sentinel operations ("Locking discipline", spec.md §5).
//!
//! The lock is a plain file uploaded to `workdir/LOCK/LOCK_<job-name>`
//! containing the run-id; there is no fencing token, matching the Python
//! source's `Rclone.lock`/`check_lock` in
//! `original_source/syncrclone/rclone.py`.

use super::{Agent, IoMode};
use crate::error::SyncError;
use crate::pathutil::pathjoin;

/// Exit codes meaning "target not found" (spec.md §6.2).
const NOT_FOUND: &[i32] = &[3, 4];

fn lock_path(workdir: &str, job_name: &str) -> String {
    pathjoin(&pathjoin(workdir, "LOCK"), &format!("LOCK_{job_name}"))
}

/// Whether the lock sentinel is absent on `remote` (safe to proceed).
pub fn is_unlocked(
    agent: &Agent,
    workdir: &str,
    job_name: &str,
    extra_flags: &[String],
) -> Result<bool, SyncError> {
    let dest = lock_path(workdir, job_name);
    let mut args = vec!["--retries".to_string(), "1".to_string(), "lsf".to_string()];
    args.extend(extra_flags.iter().cloned());
    args.push(dest);
    let out = agent.call(&args, IoMode::Capture, NOT_FOUND)?;
    Ok(NOT_FOUND.contains(&out.exit_code))
}

/// Writes the lock sentinel (containing `run_id`) to `workdir`.
pub fn acquire(
    agent: &Agent,
    workdir: &str,
    job_name: &str,
    run_id: &str,
    extra_flags: &[String],
) -> Result<(), SyncError> {
    let dest = lock_path(workdir, job_name);
    let tmp = tempfile::NamedTempFile::new()?;
    std::fs::write(tmp.path(), run_id)?;

    let mut args = vec!["copyto".to_string()];
    args.extend(extra_flags.iter().cloned());
    args.push(tmp.path().display().to_string());
    args.push(dest);
    agent.call(&args, IoMode::Stream, &[])?;
    Ok(())
}

/// Deletes the lock sentinel. Tolerates "not found" — breaking an
/// already-broken lock, or releasing at the end of a normal run, is a
/// no-op rather than an error.
pub fn release_or_break(
    agent: &Agent,
    workdir: &str,
    job_name: &str,
    extra_flags: &[String],
) -> Result<(), SyncError> {
    let dest = lock_path(workdir, job_name);
    let mut args = vec![
        "delete".to_string(),
        "--retries".to_string(),
        "1".to_string(),
    ];
    args.extend(extra_flags.iter().cloned());
    args.push(dest);
    agent.call(&args, IoMode::Stream, NOT_FOUND)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_joins_workdir_and_job_name() {
        assert_eq!(
            lock_path("remote:wd", "myjob"),
            "remote:wd/LOCK/LOCK_myjob"
        );
    }
}
