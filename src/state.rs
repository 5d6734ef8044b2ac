//! Persisted prior-listing state: XZ-compressed JSON under each side's
//! workdir.

use std::io::{Read, Write};

use tempfile::NamedTempFile;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::agent::{Agent, IoMode};
use crate::error::SyncError;
use crate::model::{FileEntry, Listing};
use crate::pathutil::pathjoin;
use crate::side::Side;

/// Exit codes meaning "target not found".
const NOT_FOUND: &[i32] = &[3, 4];

fn state_path(workdir: &str, side: Side, job_name: &str) -> String {
    pathjoin(workdir, &format!("{side}-{job_name}_fl.json.xz"))
}

/// Compresses `listing` to the `.json.xz` wire form.
///
/// # Errors
/// Returns an error if JSON serialization or XZ compression fails.
pub fn compress(listing: &Listing) -> Result<Vec<u8>, SyncError> {
    let entries = listing.to_json_array();
    let json = serde_json::to_vec(&entries).map_err(|e| SyncError::ListingError {
        side: Side::A,
        message: format!("failed to serialize listing: {e}"),
    })?;
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decompresses and deserializes a `.json.xz` payload into file entries.
///
/// # Errors
/// Returns an error message (never a fatal [`SyncError`] — callers treat a
/// failure here as "no prior state") if decompression or deserialization
/// fails.
pub fn decompress(raw: &[u8]) -> Result<Vec<FileEntry>, String> {
    let mut decoder = XzDecoder::new(raw);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| format!("xz decompression failed: {e}"))?;
    serde_json::from_slice(&json).map_err(|e| format!("invalid prior listing JSON: {e}"))
}

/// Uploads the new `prev[S]` to become next run's prior state.
///
/// # Errors
/// Propagates any non-tolerated agent failure.
pub fn push(
    agent: &Agent,
    workdir: &str,
    side: Side,
    job_name: &str,
    listing: &Listing,
    extra_flags: &[String],
) -> Result<(), SyncError> {
    let dest = state_path(workdir, side, job_name);
    let bytes = compress(listing)?;

    let mut tmp = NamedTempFile::new()?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;

    let mut args = vec!["copyto".to_string()];
    args.extend(extra_flags.iter().cloned());
    args.push(tmp.path().display().to_string());
    args.push(dest);
    agent.call(&args, IoMode::Stream, &[])?;
    Ok(())
}

/// Downloads and decodes `prev[S]`. Tolerates "target not found" (codes 3/4)
/// and decode failures alike by returning an empty listing with a
/// `tracing::warn!` — unless `require_prior_state` is set, in which case a
/// genuinely absent listing (not a corrupt one) is reported as
/// [`SyncError::MissingPriorState`] instead of silently resetting.
///
/// # Errors
/// When the agent invocation fails with an exit code outside the tolerated
/// "not found" set, or when `require_prior_state` is set and no prior
/// listing exists.
pub fn pull(
    agent: &Agent,
    workdir: &str,
    side: Side,
    job_name: &str,
    extra_flags: &[String],
    require_prior_state: bool,
) -> Result<Listing, SyncError> {
    let src = state_path(workdir, side, job_name);
    let tmp = NamedTempFile::new()?;
    let dst_path = tmp.path().display().to_string();

    let mut args = vec!["--retries".to_string(), "1".to_string(), "copyto".to_string()];
    args.extend(extra_flags.iter().cloned());
    args.push(src);
    args.push(dst_path.clone());

    let out = agent.call(&args, IoMode::Capture, NOT_FOUND)?;
    if NOT_FOUND.contains(&out.exit_code) {
        if require_prior_state {
            return Err(SyncError::MissingPriorState { side });
        }
        tracing::warn!(%side, "no previous list on {side}; resetting state");
        return Ok(Listing::empty());
    }

    let bytes = match std::fs::read(&dst_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            if require_prior_state {
                return Err(SyncError::MissingPriorState { side });
            }
            tracing::warn!(%side, error = %e, "missing previous state file on {side}; resetting");
            return Ok(Listing::empty());
        }
    };

    match decompress(&bytes) {
        Ok(entries) => match Listing::from_entries(entries) {
            Ok(listing) => Ok(listing),
            Err(_) => {
                tracing::warn!(%side, "duplicate path in previous state on {side}; resetting");
                Ok(Listing::empty())
            }
        },
        Err(msg) => {
            tracing::warn!(%side, error = %msg, "unreadable previous state on {side}; resetting");
            Ok(Listing::empty())
        }
    }
}
