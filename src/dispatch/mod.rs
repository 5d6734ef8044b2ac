//! Action Dispatcher: consumes a [`crate::reconcile::Plan`] and drives the
//! agent, in a strict per-side ordering (delete-with-backup, moves,
//! conflict tags, explicit backups, plain deletes, then transfers).

pub mod grouping;
pub mod pool;

use std::collections::BTreeSet;
use std::io::Write as _;

use tempfile::NamedTempFile;

use crate::agent::{Agent, IoMode};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::model::Listing;
use crate::pathutil::pathjoin;
use crate::reconcile::{Plan, SidePlan};
use crate::side::Side;
use crate::state;

use grouping::{MoveAction, group_moves};

const RETRY_DESTRUCTIVE: &[&str] = &["--retries", "4"];

fn write_files_from(paths: impl Iterator<Item = impl AsRef<str>>) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    let body = paths.map(|p| p.as_ref().to_string()).collect::<Vec<_>>().join("\n");
    file.write_all(body.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn side_config(config: &SyncConfig, side: Side) -> &crate::config::SideConfig {
    match side {
        Side::A => &config.a,
        Side::B => &config.b,
    }
}

fn extra_flags(config: &SyncConfig, side: Side) -> Vec<String> {
    config
        .rclone_flags
        .iter()
        .chain(&side_config(config, side).rclone_flags)
        .cloned()
        .collect()
}

/// Base flags shared by every destructive/mutating call. `retries` is set
/// on the calls most worth not losing to a transient failure
/// (delete-with-backup, backups, deletes).
fn write_base_args(retried: bool) -> Vec<String> {
    let mut cmd = vec![
        "-v".to_string(),
        "--stats-one-line".to_string(),
        "--no-check-dest".to_string(),
        "--ignore-times".to_string(),
        "--no-traverse".to_string(),
    ];
    if retried {
        cmd.push("--retries".to_string());
        cmd.push("4".to_string());
    }
    cmd
}

/// Backup directory for this run on `side`.
fn backup_path(workdir: &str, run_id: &str, job_name: &str, side: Side) -> String {
    pathjoin(workdir, &format!("backups/{run_id}_{job_name}_{side}"))
}

/// Deletes scheduled through the backup tree vs. scheduled without one:
/// `backup[S]` may co-occur with `delete[S]`.
fn split_deletes(plan_side: &SidePlan) -> (BTreeSet<String>, BTreeSet<String>) {
    let with_backup: BTreeSet<String> = plan_side.delete.intersection(&plan_side.backup).cloned().collect();
    let without_backup: BTreeSet<String> = plan_side.delete.difference(&plan_side.backup).cloned().collect();
    (with_backup, without_backup)
}

/// Paths backed up because they're about to be overwritten by a transfer,
/// as opposed to backed up because they're being deleted.
fn transfer_backups(plan_side: &SidePlan) -> BTreeSet<String> {
    plan_side.backup.intersection(&plan_side.transfer_in).cloned().collect()
}

/// Collapses a set of paths down to their ancestor-deduplicated parent
/// directories: if `a/b` and `a/b/c` are both present, only `a/b` is kept.
#[must_use]
pub fn dedup_parent_dirs(paths: &BTreeSet<String>) -> BTreeSet<String> {
    let mut dirs: BTreeSet<String> = paths
        .iter()
        .filter_map(|p| p.rsplit_once('/').map(|(dir, _)| dir.to_string()))
        .collect();
    let all: Vec<String> = dirs.iter().cloned().collect();
    dirs.retain(|d| !all.iter().any(|other| other != d && d.starts_with(&format!("{other}/"))));
    dirs
}

/// Splits an inbound transfer set into paths whose size differs from the
/// receiving side's current copy (`diff_size`, forced with `--size-only`)
/// and paths whose size already matches (`matched_size`, left to the
/// agent's normal comparison).
#[must_use]
pub fn split_transfer_sizes(
    transfer_in: &BTreeSet<String>,
    dest_curr: &Listing,
    src_curr: &Listing,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut diff_size = BTreeSet::new();
    let mut matched_size = BTreeSet::new();
    for path in transfer_in {
        let src_entry = src_curr.get(crate::model::Query::Path(path));
        let dest_entry = dest_curr.get(crate::model::Query::Path(path));
        let matches = match (src_entry, dest_entry) {
            (Some(s), Some(d)) => s.size == d.size,
            _ => false,
        };
        if matches {
            matched_size.insert(path.clone());
        } else {
            diff_size.insert(path.clone());
        }
    }
    (diff_size, matched_size)
}

/// Runs delete-with-backup, moves, backups, and deletes-without-backup for
/// one side, in that order.
fn dispatch_side_local_actions(
    agent: &Agent,
    config: &SyncConfig,
    side: Side,
    plan_side: &SidePlan,
    run_id: &str,
) -> Result<(), SyncError> {
    let sc = side_config(config, side);
    let remote = &sc.remote;
    let workdir = sc.effective_workdir();
    let flags = extra_flags(config, side);
    let backup_dir = backup_path(&workdir, run_id, config.job_name(), side);

    let (dels_with_backup, dels_without_backup) = split_deletes(plan_side);

    // Step 1: delete-with-backup.
    if !dels_with_backup.is_empty() {
        let files_from = write_files_from(dels_with_backup.iter())?;
        let mut args = write_base_args(true);
        args.extend(flags.iter().cloned());
        args.insert(0, "move".to_string());
        args.push("--files-from".to_string());
        args.push(files_from.path().display().to_string());
        args.push(remote.clone());
        args.push(backup_dir.clone());
        agent.call(&args, IoMode::Stream, &[])?;
    }

    // Step 2: moves.
    let actions = group_moves(&plan_side.moves);
    let singles: Vec<(String, String)> = actions
        .iter()
        .filter_map(|a| match a {
            MoveAction::Single { src, dst } => Some((src.clone(), dst.clone())),
            MoveAction::Grouped { .. } => None,
        })
        .collect();
    let grouped: Vec<(String, String, Vec<String>)> = actions
        .into_iter()
        .filter_map(|a| match a {
            MoveAction::Grouped { src_dir, dst_dir, suffixes } => Some((src_dir, dst_dir, suffixes)),
            MoveAction::Single { .. } => None,
        })
        .collect();

    if !singles.is_empty() {
        let base = write_base_args(false);
        pool::run_bounded(&singles, config.action_threads(), |(src, dst)| {
            let mut args = base.clone();
            args.extend(flags.iter().cloned());
            args.insert(0, "moveto".to_string());
            args.push(pathjoin(remote, src));
            args.push(pathjoin(remote, dst));
            agent.call(&args, IoMode::Stream, &[])
        })
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;
    }

    for (src_dir, dst_dir, suffixes) in &grouped {
        let files_from = write_files_from(suffixes.iter())?;
        let mut args = write_base_args(false);
        args.extend(flags.iter().cloned());
        args.insert(0, "move".to_string());
        args.push(pathjoin(remote, src_dir));
        args.push(pathjoin(remote, dst_dir));
        args.push("--files-from".to_string());
        args.push(files_from.path().display().to_string());
        agent.call(&args, IoMode::Stream, &[])?;
    }

    // Step 3: backups for soon-to-be-overwritten paths.
    let backups = transfer_backups(plan_side);
    if !backups.is_empty() {
        let use_copy = match config.backup_with_copy {
            Some(forced) => forced,
            None => agent.features(remote).copy,
        };
        let files_from = write_files_from(backups.iter())?;
        let mut args = write_base_args(true);
        args.extend(flags.iter().cloned());
        args.insert(0, if use_copy { "copy".to_string() } else { "move".to_string() });
        args.push("--files-from".to_string());
        args.push(files_from.path().display().to_string());
        args.push(remote.clone());
        args.push(backup_dir);
        agent.call(&args, IoMode::Stream, &[])?;
    }

    // Step 4: deletes without backup.
    if !dels_without_backup.is_empty() {
        let files_from = write_files_from(dels_without_backup.iter())?;
        let mut args = write_base_args(true);
        args.extend(flags.iter().cloned());
        args.insert(0, "delete".to_string());
        args.push("--files-from".to_string());
        args.push(files_from.path().display().to_string());
        args.push(remote.clone());
        agent.call(&args, IoMode::Stream, &[])?;
    }

    Ok(())
}

/// Transfers the paths in `transfer_in[dest]`, reading from `src`'s remote.
/// Runs once per direction.
fn dispatch_transfer(
    agent: &Agent,
    config: &SyncConfig,
    src_side: Side,
    dest_side: Side,
    transfer_in: &BTreeSet<String>,
    src_curr: &Listing,
    dest_curr: &Listing,
) -> Result<(), SyncError> {
    if transfer_in.is_empty() {
        return Ok(());
    }
    let src = &side_config(config, src_side).remote;
    let dest = &side_config(config, dest_side).remote;
    let flags = extra_flags(config, src_side);

    let (diff_size, matched_size) = split_transfer_sizes(transfer_in, dest_curr, src_curr);

    for (files, extra_args) in [
        (&diff_size, vec!["--size-only".to_string()]),
        (
            &matched_size,
            if config.compare == crate::config::Compare::Hash {
                vec!["--checksum".to_string()]
            } else {
                Vec::new()
            },
        ),
    ] {
        if files.is_empty() {
            continue;
        }
        let files_from = write_files_from(files.iter())?;
        let mut args = vec!["-v".to_string(), "--stats-one-line".to_string()];
        args.extend(flags.iter().cloned());
        args.extend(extra_args);
        if files.len() <= 100 {
            args.push("--no-traverse".to_string());
        }
        args.insert(0, "copy".to_string());
        args.push("--files-from".to_string());
        args.push(files_from.path().display().to_string());
        args.push(src.clone());
        args.push(dest.clone());
        agent.call(&args, IoMode::Stream, &[])?;
    }
    Ok(())
}

/// Splits `side`'s `tag` set into paths this side preserves its own content
/// for (about to be overwritten by a transfer) and paths this side pulls a
/// tagged copy of the other side's content for (kept untouched otherwise).
#[must_use]
fn split_tags(plan_side: &SidePlan) -> (BTreeSet<String>, BTreeSet<String>) {
    let preserve = plan_side.tag.intersection(&plan_side.transfer_in).cloned().collect();
    let pull = plan_side.tag.difference(&plan_side.transfer_in).cloned().collect();
    (preserve, pull)
}

/// Writes conflict-tagged copies for `side`'s `tag` set: when no winner is
/// chosen, each side writes a tagged copy of the other's file; when
/// `tag_conflict` picks a winner, the loser's file is additionally
/// preserved under a tagged name before being overwritten.
///
/// The two cases are distinguished by whether the tagged path also appears
/// in this side's `transfer_in`: if it does, this side is the conflict's
/// loser and about to be overwritten, so its own current content is
/// preserved under the tagged name before that happens. Otherwise this side
/// keeps its own file untouched and pulls a tagged copy of the other side's
/// conflicting content.
fn dispatch_tags(
    agent: &Agent,
    config: &SyncConfig,
    side: Side,
    plan_side: &SidePlan,
    other_remote: &str,
    run_id: &str,
) -> Result<(), SyncError> {
    if plan_side.tag.is_empty() {
        return Ok(());
    }
    let sc = side_config(config, side);
    let remote = &sc.remote;
    let flags = extra_flags(config, side);
    let base = write_base_args(true);

    let (preserve, pull) = split_tags(plan_side);
    let preserve: Vec<String> = preserve.into_iter().collect();
    let pull: Vec<String> = pull.into_iter().collect();

    pool::run_bounded(&preserve, config.action_threads(), |path| {
        let mut args = base.clone();
        args.extend(flags.iter().cloned());
        args.insert(0, "copyto".to_string());
        args.push(pathjoin(remote, path));
        args.push(pathjoin(remote, &crate::pathutil::tagged_path(path, side, run_id)));
        agent.call(&args, IoMode::Stream, &[])
    })
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    pool::run_bounded(&pull, config.action_threads(), |path| {
        let mut args = base.clone();
        args.extend(flags.iter().cloned());
        args.insert(0, "copyto".to_string());
        args.push(pathjoin(other_remote, path));
        args.push(pathjoin(remote, &crate::pathutil::tagged_path(path, side, run_id)));
        agent.call(&args, IoMode::Stream, &[])
    })
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    Ok(())
}

/// Cleans up now-empty parent directories on `side`, skipped entirely when
/// the side's feature probe reports no empty-directory support.
fn dispatch_empty_dirs(agent: &Agent, config: &SyncConfig, side: Side, touched: &BTreeSet<String>) -> Result<(), SyncError> {
    let sc = side_config(config, side);
    if !agent.features(&sc.remote).can_have_empty_directories {
        return Ok(());
    }
    let dirs = dedup_parent_dirs(touched);
    if dirs.is_empty() {
        return Ok(());
    }
    let flags = extra_flags(config, side);
    let roots: Vec<String> = dirs.into_iter().collect();
    pool::run_bounded(&roots, config.action_threads(), |dir| {
        let mut args = vec!["rmdirs".to_string()];
        args.extend(flags.iter().cloned());
        args.push(pathjoin(&sc.remote, dir));
        agent.call(&args, IoMode::Stream, &[])
    })
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

/// Drives the full dispatch sequence for one run: per-side delete/move/
/// backup/delete, both transfer directions, empty-directory cleanup, and
/// state push.
///
/// # Errors
/// Aborts on the first agent failure; the caller must not push state when
/// this returns `Err` so the next run re-reconciles from the last
/// consistent `prev`.
pub fn dispatch(
    agent: &Agent,
    config: &SyncConfig,
    plan: &Plan,
    curr_a: &Listing,
    curr_b: &Listing,
    run_id: &str,
) -> Result<(), SyncError> {
    dispatch_side_local_actions(agent, config, Side::A, &plan.a, run_id)?;
    dispatch_side_local_actions(agent, config, Side::B, &plan.b, run_id)?;

    let remote_a = side_config(config, Side::A).remote.clone();
    let remote_b = side_config(config, Side::B).remote.clone();
    dispatch_tags(agent, config, Side::A, &plan.a, &remote_b, run_id)?;
    dispatch_tags(agent, config, Side::B, &plan.b, &remote_a, run_id)?;

    dispatch_transfer(agent, config, Side::B, Side::A, &plan.a.transfer_in, curr_b, curr_a)?;
    dispatch_transfer(agent, config, Side::A, Side::B, &plan.b.transfer_in, curr_a, curr_b)?;

    let touched_a: BTreeSet<String> = plan
        .a
        .delete
        .iter()
        .chain(plan.a.moves.iter().map(|(src, _)| src))
        .cloned()
        .collect();
    let touched_b: BTreeSet<String> = plan
        .b
        .delete
        .iter()
        .chain(plan.b.moves.iter().map(|(src, _)| src))
        .cloned()
        .collect();
    dispatch_empty_dirs(agent, config, Side::A, &touched_a)?;
    dispatch_empty_dirs(agent, config, Side::B, &touched_b)?;

    let workdir_a = side_config(config, Side::A).effective_workdir();
    let workdir_b = side_config(config, Side::B).effective_workdir();
    state::push(agent, &workdir_a, Side::A, config.job_name(), &plan.next_prev_a, &extra_flags(config, Side::A))?;
    state::push(agent, &workdir_b, Side::B, config.job_name(), &plan.next_prev_b, &extra_flags(config, Side::B))?;

    Ok(())
}
