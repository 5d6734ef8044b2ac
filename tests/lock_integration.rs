//! Integration coverage for the run orchestrator's locking discipline
//! (spec.md §5, §8 scenario S8): a lock held on either side aborts the run
//! before any listing is acquired, and `--break-lock` clears it first.
//!
//! There's no real `rclone` binary in this environment, so these tests
//! stand a tiny fake agent script in for it — the same "typed wrapper
//! around *a* subprocess binary" seam the real `Agent` uses, pointed at a
//! script that answers exactly the handful of commands `run::run` issues
//! before giving up and failing loudly on anything else. If reconciliation
//! ever reached an `lsjson` call in the locked case, the fake would refuse
//! it and the test would fail with an `AgentCallError` instead of the
//! `LockedRemoteError` being asserted.

use std::fs;
use std::os::unix::fs::PermissionsExt;

use syncrclone::agent::Agent;
use syncrclone::config::SyncConfig;
use syncrclone::error::SyncError;
use syncrclone::run::{self, RunOptions};

/// Writes an executable fake-`rclone` shell script to `dir` that:
/// - answers a bare `--version` call with a recent version string,
/// - answers any invocation whose args include `lsf` (the lock-check
///   call, which `is_unlocked` issues as `--retries 1 lsf <path>`) by
///   reporting the lock file present (exit 0) when `locked` is true, or
///   absent (exit 3) otherwise,
/// - answers any invocation whose args include `delete` (lock release /
///   break-lock) with success,
/// - fails loudly on anything else, so a test calling more than expected
///   fails with a distinctive message rather than hanging or no-opping.
fn fake_agent(dir: &std::path::Path, locked: bool) -> std::path::PathBuf {
    let lock_exit = if locked { 0 } else { 3 };
    let script = format!(
        r#"#!/bin/sh
args=" $* "
if [ "$1" = "--version" ] && [ "$#" -eq 1 ]; then
  echo "rclone v1.65.0"
  exit 0
fi
case "$args" in
  *" lsf "*)
    exit {lock_exit}
    ;;
  *" delete "*)
    exit 0
    ;;
  *)
    echo "fake-agent: unexpected command: $*" >&2
    exit 1
    ;;
esac
"#
    );
    let path = dir.join("fake-rclone.sh");
    fs::write(&path, script).expect("write fake agent script");
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn minimal_config(tmp: &std::path::Path) -> SyncConfig {
    let a = tmp.join("a");
    let b = tmp.join("b");
    fs::create_dir_all(&a).unwrap();
    fs::create_dir_all(&b).unwrap();
    SyncConfig::parse(&format!(
        "[A]\nremote = \"local:{}\"\n[B]\nremote = \"local:{}\"\n",
        a.display(),
        b.display(),
    ))
    .expect("minimal config is valid")
}

#[test]
fn s8_lock_held_aborts_before_any_listing() {
    let tmp = tempfile::tempdir().unwrap();
    let config = minimal_config(tmp.path());
    let binary = fake_agent(tmp.path(), true);
    let agent = Agent::new(binary, "1.50").expect("fake agent version gate passes");

    let result = run::run(&agent, &config, "20260101T000000Z", &RunOptions::default(), |_| true);

    match result {
        Err(SyncError::LockedRemoteError { .. }) => {}
        other => panic!("expected LockedRemoteError, got {other:?}"),
    }
}

#[test]
fn unlocked_remote_passes_the_lock_check() {
    let tmp = tempfile::tempdir().unwrap();
    let config = minimal_config(tmp.path());
    let binary = fake_agent(tmp.path(), false);
    let agent = Agent::new(binary, "1.50").expect("fake agent version gate passes");

    // With the lock absent, `ensure_unlocked` should succeed; the run then
    // proceeds to acquire locks (a `copyto`) and listings (`lsjson`), which
    // the fake agent doesn't implement, so it fails loudly there instead —
    // proving the lock check itself was not the thing that stopped the run.
    let result = run::run(&agent, &config, "20260101T000000Z", &RunOptions::default(), |_| true);

    match result {
        Err(SyncError::LockedRemoteError { .. }) => {
            panic!("lock check should have passed with no lock file present")
        }
        Err(SyncError::AgentCallError { .. }) => {}
        other => panic!("expected the run to fail past the lock check, got {other:?}"),
    }
}
