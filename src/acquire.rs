//! Listing Acquisition: fetches `curr[S]`/`prev[S]` for one side, reusing
//! hashes from `prev` by identity triple and back-filling the rest with a
//! second, restricted `lsjson` call.

use tempfile::NamedTempFile;
use std::io::Write as _;

use crate::agent::{Agent, IoMode, ListJsonOptions, build_lsjson_args, parse_lsjson};
use crate::config::{Compare, ConflictMode, SyncConfig};
use crate::error::SyncError;
use crate::model::{Listing, Query};
use crate::side::Side;
use crate::state;

/// The two listings acquired for one side.
#[derive(Debug, Clone)]
pub struct SideListings {
    pub curr: Listing,
    pub prev: Listing,
}

/// Whether `compare`/`renames[S]`/`conflict_mode` require hash computation
/// from the agent.
fn needs_hashes(compare: Compare, renames: crate::config::RenameAttr) -> bool {
    compare == Compare::Hash || renames == crate::config::RenameAttr::Hash
}

/// Whether `mtime` must be requested from the agent.
fn needs_mtime(config: &SyncConfig, renames: crate::config::RenameAttr) -> bool {
    config.always_get_mtime
        || config.compare == Compare::Mtime
        || renames == crate::config::RenameAttr::Mtime
        || matches!(config.conflict_mode, ConflictMode::Newer | ConflictMode::Older)
}

/// Acquires `curr[S]` and `prev[S]` for one side, performing the reuse-hash
/// backfill pass when hashes are needed.
///
/// # Errors
/// Returns [`SyncError::ListingError`] if the agent's `lsjson` output fails
/// to parse or contains a duplicate `Path`; any other non-tolerated agent
/// failure propagates as [`SyncError::AgentCallError`]. A missing or
/// unreadable prior listing only errors when `require_prior_state` is set
/// — see [`state::pull`].
pub fn acquire(agent: &Agent, config: &SyncConfig, side: Side) -> Result<SideListings, SyncError> {
    let side_config = match side {
        Side::A => &config.a,
        Side::B => &config.b,
    };
    let renames = side_config.renames_effective(config.compare);
    let compute_hashes = needs_hashes(config.compare, renames);
    let reuse = compute_hashes && side_config.reuse_hashes_effective();

    let workdir = side_config.effective_workdir();
    let opts = ListJsonOptions {
        compute_hashes: compute_hashes && !reuse,
        get_mtime: needs_mtime(config, renames),
        files_from: None,
        workdir_rel: crate::pathutil::workdir_relative(&side_config.remote, &workdir).map(str::to_string),
    };
    let extra_flags: Vec<String> = config
        .rclone_flags
        .iter()
        .chain(&side_config.rclone_flags)
        .cloned()
        .collect();
    let args = build_lsjson_args(&side_config.remote, &config.filter_flags, &extra_flags, &opts);
    let out = agent.call(&args, IoMode::Capture, &[])?;

    let entries = parse_lsjson(&out.stdout).map_err(|message| SyncError::ListingError {
        side,
        message,
    })?;
    let mut curr = Listing::from_entries(entries).map_err(|_| SyncError::ListingError {
        side,
        message: "duplicate Path in current listing".to_string(),
    })?;
    let prev = if config.reset_state {
        tracing::debug!(%side, "reset_state: treating prior listing as empty");
        Listing::empty()
    } else {
        state::pull(
            agent,
            &workdir,
            side,
            config.job_name(),
            &extra_flags,
            config.require_prior_state,
        )?
    };

    if compute_hashes && !reuse {
        return Ok(SideListings { curr, prev });
    }

    // Reuse pass: for each curr entry, look up an identity-triple match in
    // prev with a non-empty Hashes map, and copy it across.
    let mut gaps = Vec::new();
    let paths: Vec<String> = curr.iterate().map(|e| e.path.clone()).collect();
    for path in &paths {
        let (size, mtime) = {
            let entry = curr.get(Query::Path(path)).expect("path just listed");
            (entry.size, entry.mtime)
        };
        let Some(mtime) = mtime else {
            gaps.push(path.clone());
            continue;
        };
        match prev.get(Query::Identity(path, size, mtime)) {
            Some(prev_entry) if !prev_entry.hashes.is_empty() => {
                let mut entry = curr.remove(path).expect("path just looked up");
                entry.hashes = prev_entry.hashes.clone();
                curr.insert(entry).expect("path just removed");
            }
            _ => gaps.push(path.clone()),
        }
    }

    if gaps.is_empty() {
        return Ok(SideListings { curr, prev });
    }

    let mut files_from = NamedTempFile::new()?;
    files_from.write_all(gaps.join("\n").as_bytes())?;
    files_from.flush()?;

    let restricted_opts = ListJsonOptions {
        compute_hashes: true,
        get_mtime: opts.get_mtime,
        files_from: Some(files_from.path().display().to_string()),
        workdir_rel: None,
    };
    let restricted_args =
        build_lsjson_args(&side_config.remote, &config.filter_flags, &extra_flags, &restricted_opts);
    let restricted_out = agent.call(&restricted_args, IoMode::Capture, &[])?;
    let backfilled = parse_lsjson(&restricted_out.stdout).map_err(|message| SyncError::ListingError {
        side,
        message,
    })?;

    for fresh in backfilled {
        if fresh.hashes.is_empty() {
            continue;
        }
        if let Some(mut entry) = curr.remove(&fresh.path) {
            entry.hashes = fresh.hashes;
            curr.insert(entry).expect("path just removed");
        }
    }

    Ok(SideListings { curr, prev })
}
