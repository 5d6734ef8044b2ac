//! `lsjson` argument construction and response parsing.

use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::model::FileEntry;

/// Controls which `lsjson` flags get added beyond the hard-wired workdir
/// filters and `-R --no-mimetype --files-only`.
#[derive(Debug, Clone, Default)]
pub struct ListJsonOptions {
    /// Pass `--hash` so the agent computes content digests itself.
    pub compute_hashes: bool,
    /// Omit `--no-modtime` when `true` (the `always_get_mtime`/compare/
    /// renames/conflict_mode gate).
    pub get_mtime: bool,
    /// Restrict to an explicit file list (the second, hash-backfill call)
    /// instead of a recursive listing of the whole remote. When set, the
    /// workdir filters and `filter_flags` are not applied, matching the
    /// restricted hash-backfill call the two-pass hash-reuse scheme needs.
    pub files_from: Option<String>,
    /// The side's workdir, relative to `remote` (e.g. `.syncrclone`), used
    /// to build the hard-wired "include the lock directory, exclude
    /// everything else under the workdir" filter pair. `None` when the
    /// workdir isn't nested under `remote` at all, in which case nothing
    /// needs excluding.
    pub workdir_rel: Option<String>,
}

/// Builds the `lsjson` argument vector for one listing call.
///
/// `filter_flags` and `extra_flags` are the user-supplied flags from
/// `SyncConfig` (global `rclone_flags` + the side's own); both are skipped
/// when `opts.files_from` is set.
#[must_use]
pub fn build_args(
    remote: &str,
    filter_flags: &[String],
    extra_flags: &[String],
    opts: &ListJsonOptions,
) -> Vec<String> {
    let mut cmd = vec!["lsjson".to_string()];

    if let Some(files_from) = &opts.files_from {
        cmd.push("--hash".to_string());
        cmd.push("--files-from".to_string());
        cmd.push(files_from.clone());
        cmd.extend(extra_flags.iter().cloned());
    } else {
        if let Some(rel) = &opts.workdir_rel {
            cmd.push("--filter".to_string());
            cmd.push(format!("+ /{rel}/LOCK/*"));
            cmd.push("--filter".to_string());
            cmd.push(format!("- /{rel}/**"));
        }

        if opts.compute_hashes {
            cmd.push("--hash".to_string());
        }
        if !opts.get_mtime {
            cmd.push("--no-modtime".to_string());
        }

        cmd.extend(extra_flags.iter().cloned());
        cmd.extend(filter_flags.iter().cloned());
    }

    cmd.push("-R".to_string());
    cmd.push("--no-mimetype".to_string());
    cmd.push("--files-only".to_string());
    cmd.push(remote.to_string());
    cmd
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Size")]
    size: u64,
    #[serde(rename = "ModTime", default)]
    mod_time: Option<String>,
    #[serde(rename = "Hashes", default)]
    hashes: std::collections::BTreeMap<String, String>,
}

/// Parses one `lsjson` response into [`FileEntry`]s, converting `ModTime`
/// (RFC3339) into seconds-since-epoch and dropping the fields the core
/// never needs (`IsDir`, `Name`, `ID`, `Tier`).
///
/// # Errors
/// Returns an error message if the payload isn't a JSON array of file
/// objects, or a `ModTime` string fails to parse as RFC3339.
pub fn parse_response(raw: &str) -> Result<Vec<FileEntry>, String> {
    let entries: Vec<RawEntry> =
        serde_json::from_str(raw).map_err(|e| format!("invalid lsjson output: {e}"))?;

    entries
        .into_iter()
        .map(|e| {
            let mtime = match e.mod_time {
                Some(s) => Some(rfc3339_to_unix(&s)?),
                None => None,
            };
            let mut entry = FileEntry::new(e.path, e.size, mtime);
            entry.hashes = e.hashes;
            Ok(entry)
        })
        .collect()
}

fn rfc3339_to_unix(s: &str) -> Result<f64, String> {
    let dt = OffsetDateTime::parse(s, &Rfc3339).map_err(|e| format!("invalid ModTime {s:?}: {e}"))?;
    Ok(dt.unix_timestamp() as f64 + f64::from(dt.nanosecond()) / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_listing_includes_workdir_filters() {
        let opts = ListJsonOptions {
            compute_hashes: false,
            get_mtime: true,
            files_from: None,
            workdir_rel: Some(".syncrclone".to_string()),
        };
        let args = build_args("remote:path", &[], &[], &opts);
        assert!(args.contains(&"+ /.syncrclone/LOCK/*".to_string()));
        assert!(args.contains(&"- /.syncrclone/**".to_string()));
        assert!(!args.contains(&"--no-modtime".to_string()));
    }

    #[test]
    fn no_workdir_rel_skips_workdir_filters() {
        let opts = ListJsonOptions {
            compute_hashes: false,
            get_mtime: true,
            files_from: None,
            workdir_rel: None,
        };
        let args = build_args("remote:path", &[], &[], &opts);
        assert!(!args.iter().any(|a| a.contains("LOCK")));
    }

    #[test]
    fn custom_workdir_rel_is_used_in_filter() {
        let opts = ListJsonOptions {
            compute_hashes: false,
            get_mtime: true,
            files_from: None,
            workdir_rel: Some("state/dir".to_string()),
        };
        let args = build_args("remote:path", &[], &[], &opts);
        assert!(args.contains(&"+ /state/dir/LOCK/*".to_string()));
        assert!(args.contains(&"- /state/dir/**".to_string()));
    }

    #[test]
    fn no_modtime_flag_added_when_not_needed() {
        let opts = ListJsonOptions {
            compute_hashes: false,
            get_mtime: false,
            files_from: None,
            workdir_rel: None,
        };
        let args = build_args("remote:path", &[], &[], &opts);
        assert!(args.contains(&"--no-modtime".to_string()));
    }

    #[test]
    fn restricted_call_skips_filters_and_forces_hash() {
        let opts = ListJsonOptions {
            compute_hashes: false,
            get_mtime: true,
            files_from: Some("tmp/list.txt".to_string()),
            workdir_rel: Some(".syncrclone".to_string()),
        };
        let args = build_args("remote:path", &["--exclude=*.tmp".to_string()], &[], &opts);
        assert!(args.contains(&"--hash".to_string()));
        assert!(args.contains(&"--files-from".to_string()));
        assert!(!args.contains(&"--exclude=*.tmp".to_string()));
        assert!(!args.contains(&"+ /.syncrclone/LOCK/*".to_string()));
    }

    #[test]
    fn parses_entries_and_converts_modtime() {
        let raw = r#"[{"Path":"a.txt","Size":5,"ModTime":"2024-01-01T00:00:00Z","Hashes":{"md5":"abc"},"IsDir":false}]"#;
        let entries = parse_response(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "a.txt");
        assert_eq!(entries[0].size, 5);
        assert!(entries[0].mtime.is_some());
        assert_eq!(entries[0].hashes.get("md5"), Some(&"abc".to_string()));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_response("not json").is_err());
    }
}
