//! Path joining for agent remotes, which may be local paths or
//! `remote:path` strings (see GLOSSARY: "Remote").

/// Joins `base` and `suffix` the way rclone remote paths are joined: a
/// trailing `:` (bare remote root, e.g. `"myremote:"`) or `/` needs no
/// separator inserted; otherwise one `/` is inserted.
#[must_use]
pub fn pathjoin(base: &str, suffix: &str) -> String {
    if base.is_empty() {
        return suffix.to_string();
    }
    if base.ends_with(':') || base.ends_with('/') {
        format!("{base}{suffix}")
    } else {
        format!("{base}/{suffix}")
    }
}

/// The side's workdir path relative to its own `remote`, for building the
/// lsjson workdir-exclusion filter. Returns `None` when `workdir` isn't
/// nested under `remote` as a plain string prefix (e.g. a workdir pointed
/// at an entirely different remote), in which case nothing needs excluding
/// from that remote's listing.
#[must_use]
pub fn workdir_relative<'a>(remote: &str, workdir: &'a str) -> Option<&'a str> {
    workdir.strip_prefix(remote).map(|rest| rest.trim_start_matches('/'))
}

/// Disambiguates `path` for a conflict-tagged copy, inserting
/// `.sync-conflict-<side>-<run_id>` before the file's extension, or
/// appending it if the leaf has none.
#[must_use]
pub fn tagged_path(path: &str, side: crate::side::Side, run_id: &str) -> String {
    let (dir, leaf) = match path.rsplit_once('/') {
        Some((dir, leaf)) => (Some(dir), leaf),
        None => (None, path),
    };
    let tagged_leaf = match leaf.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            format!("{stem}.sync-conflict-{side}-{run_id}.{ext}")
        }
        _ => format!("{leaf}.sync-conflict-{side}-{run_id}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{tagged_leaf}"),
        None => tagged_leaf,
    }
}
