//! Job configuration: a single validated, immutable record.
//!
//! Deliberately not an executable config-as-code format — dynamic attribute
//! access and runtime code evaluation are exactly what this avoids.
//! `SyncConfig` is loaded from TOML with `deny_unknown_fields`, so a typo
//! in a job file is a load-time error rather than a silently-ignored
//! option.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How two entries are compared to decide whether a file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compare {
    Size,
    Mtime,
    Hash,
}

/// Attribute used for rename detection, or `None` to disable it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameAttr {
    Size,
    Mtime,
    Hash,
    None,
}

/// Fallback when `compare = "hash"` but no algorithm is shared between two
/// entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFailFallback {
    Size,
    Mtime,
    None,
}

/// Conflict winner selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    A,
    B,
    Newer,
    Older,
    Larger,
    Smaller,
    Tag,
    None,
}

impl ConflictMode {
    /// The deprecated `*_tag` spellings (`newer_tag`, `older_tag`, ...) are
    /// accepted and rewritten to the base mode plus `tag_conflict = true`,
    /// for backward compatibility with older job files.
    fn from_legacy_str(raw: &str) -> Option<(Self, bool)> {
        let base = raw.strip_suffix("_tag")?;
        let mode = match base {
            "a" => ConflictMode::A,
            "b" => ConflictMode::B,
            "newer" => ConflictMode::Newer,
            "older" => ConflictMode::Older,
            "larger" => ConflictMode::Larger,
            "smaller" => ConflictMode::Smaller,
            _ => return None,
        };
        Some((mode, true))
    }

    fn as_toml_str(self) -> &'static str {
        match self {
            ConflictMode::A => "a",
            ConflictMode::B => "b",
            ConflictMode::Newer => "newer",
            ConflictMode::Older => "older",
            ConflictMode::Larger => "larger",
            ConflictMode::Smaller => "smaller",
            ConflictMode::Tag => "tag",
            ConflictMode::None => "none",
        }
    }
}

/// Rewrites a deprecated `conflict_mode = "newer_tag"`-style value in place
/// to `{conflict_mode = "newer", tag_conflict = true}`, matching how older
/// job files spelled a tagging conflict mode before the two were split into
/// separate fields.
fn rewrite_legacy_conflict_mode(value: &mut toml::Value) {
    let toml::Value::Table(table) = value else {
        return;
    };
    let Some(toml::Value::String(raw)) = table.get("conflict_mode") else {
        return;
    };
    let Some((mode, tag)) = ConflictMode::from_legacy_str(raw) else {
        return;
    };
    tracing::warn!(
        old = %raw,
        new = mode.as_toml_str(),
        "conflict_mode '{raw}' is deprecated; use conflict_mode = \"{}\" and tag_conflict = true",
        mode.as_toml_str()
    );
    table.insert(
        "conflict_mode".to_string(),
        toml::Value::String(mode.as_toml_str().to_string()),
    );
    if tag {
        table.insert("tag_conflict".to_string(), toml::Value::Boolean(true));
    }
}

fn default_dt() -> f64 {
    1.0
}

fn default_action_threads() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Per-side overrides layered on top of the shared defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct SideConfig {
    pub remote: String,
    pub workdir: Option<String>,
    pub renames: Option<RenameAttr>,
    pub reuse_hashes: Option<bool>,
    pub rclone_flags: Vec<String>,
}

impl SideConfig {
    /// The side's workdir, defaulting to a `.syncrclone` subdirectory of
    /// the remote when not overridden.
    #[must_use]
    pub fn effective_workdir(&self) -> String {
        self.workdir
            .clone()
            .unwrap_or_else(|| crate::pathutil::pathjoin(&self.remote, ".syncrclone"))
    }

    /// Rename-detection attribute, defaulting to the same attribute used for
    /// `compare` when the side doesn't override it.
    #[must_use]
    pub fn renames_effective(&self, compare: Compare) -> RenameAttr {
        self.renames.unwrap_or(match compare {
            Compare::Size => RenameAttr::Size,
            Compare::Mtime => RenameAttr::Mtime,
            Compare::Hash => RenameAttr::Hash,
        })
    }

    /// Whether hashes computed for one entry may be reused for another entry
    /// sharing its `(path, size, mtime)` identity triple. Defaults to `true`.
    #[must_use]
    pub fn reuse_hashes_effective(&self) -> bool {
        self.reuse_hashes.unwrap_or(true)
    }
}

/// The full job configuration, as loaded from a TOML job file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(rename = "A")]
    pub a: SideConfig,
    #[serde(rename = "B")]
    pub b: SideConfig,

    #[serde(default = "default_compare")]
    pub compare: Compare,
    #[serde(default)]
    pub hash_fail_fallback: HashFailFallback,
    #[serde(default = "default_conflict_mode")]
    pub conflict_mode: ConflictMode,
    #[serde(default)]
    pub tag_conflict: bool,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_action_threads")]
    pub action_threads: usize,
    #[serde(default = "default_true")]
    pub backup: bool,
    /// `None` means "auto, per feature probe"; `Some(true)` forces copy.
    #[serde(default)]
    pub backup_with_copy: Option<bool>,
    #[serde(default)]
    pub always_get_mtime: bool,
    #[serde(default)]
    pub avoid_relist: bool,
    #[serde(default)]
    pub reset_state: bool,
    /// Treat an absent prior listing as fatal instead of a first-run union.
    /// Off by default; set via `--require-prior-state`.
    #[serde(default)]
    pub require_prior_state: bool,
    #[serde(default)]
    pub sync_backups: bool,
    #[serde(default)]
    pub filter_flags: Vec<String>,
    #[serde(default)]
    pub rclone_flags: Vec<String>,
    #[serde(default = "default_min_rclone_version")]
    pub min_rclone_version: String,
    #[serde(default)]
    pub job_name: Option<String>,
}

fn default_compare() -> Compare {
    Compare::Mtime
}

fn default_conflict_mode() -> ConflictMode {
    ConflictMode::Tag
}

fn default_min_rclone_version() -> String {
    "1.50.0".to_string()
}

impl Default for HashFailFallback {
    fn default() -> Self {
        HashFailFallback::Mtime
    }
}

/// A config load or validation failure, with enough location information to
/// point the user at the offending line when it's known.
#[derive(Debug)]
pub struct ConfigError {
    pub path: Option<PathBuf>,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.line) {
            (Some(path), Some(line)) => {
                write!(f, "{}:{}: {}", path.display(), line, self.message)
            }
            (Some(path), None) => write!(f, "{}: {}", path.display(), self.message),
            (None, _) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        ConfigError {
            path: None,
            line: None,
            message: message.into(),
        }
    }

    fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

impl SyncConfig {
    /// Load and validate a job config from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("failed to read config: {e}")).with_path(path)
        })?;
        Self::parse(&raw).map_err(|e| e.with_path(path))
    }

    /// Parse and validate a job config from an in-memory TOML string.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut value: toml::Value = toml::from_str(raw).map_err(|e| {
            let line = e.span().and_then(|span| line_number(raw, span.start));
            ConfigError {
                path: None,
                line,
                message: e.message().to_string(),
            }
        })?;
        rewrite_legacy_conflict_mode(&mut value);

        let config: SyncConfig = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::new(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.a.remote.is_empty() {
            return Err(ConfigError::new("A.remote is required"));
        }
        if self.b.remote.is_empty() {
            return Err(ConfigError::new("B.remote is required"));
        }
        if self.sync_backups && (self.a.workdir.is_some() || self.b.workdir.is_some()) {
            return Err(ConfigError::new(
                "sync_backups cannot be combined with a user-supplied workdir",
            ));
        }
        for flag in &self.filter_flags {
            if self.rclone_flags.contains(flag)
                || self.a.rclone_flags.contains(flag)
                || self.b.rclone_flags.contains(flag)
            {
                return Err(ConfigError::new(format!(
                    "filter flag {flag:?} must not also appear in rclone_flags"
                )));
            }
        }
        Ok(())
    }

    /// Effective action-thread count, clamped to at least 1 rather than
    /// rejecting a non-positive value outright.
    #[must_use]
    pub fn action_threads(&self) -> usize {
        self.action_threads.max(1)
    }

    /// Job name used in workdir file names and lock sentinels; falls back to
    /// a stable default when the config doesn't name one explicitly.
    #[must_use]
    pub fn job_name(&self) -> &str {
        self.job_name.as_deref().unwrap_or("syncrclone")
    }

    /// Apply a single `KEY=VALUE` override as parsed from `--override`,
    /// re-running validation afterward.
    pub fn apply_override(&mut self, raw: &str) -> Result<(), ConfigError> {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            ConfigError::new(format!("invalid --override {raw:?}, expected KEY=VALUE"))
        })?;
        let patch = format!("{key} = {value}\n");
        let patch_table: toml::Table = toml::from_str(&patch)
            .map_err(|e| ConfigError::new(format!("invalid override value: {e}")))?;

        let mut doc = toml::Value::try_from(&*self)
            .map_err(|e| ConfigError::new(format!("internal: {e}")))?;
        if let toml::Value::Table(doc_table) = &mut doc {
            for (k, v) in patch_table {
                doc_table.insert(k, v);
            }
        }
        *self = doc
            .try_into()
            .map_err(|e| ConfigError::new(format!("override produced invalid config: {e}")))?;
        self.validate()
    }
}

fn line_number(text: &str, byte_offset: usize) -> Option<usize> {
    text.get(..byte_offset)
        .map(|prefix| prefix.lines().count().max(1))
}

/// A fully-commented starter config, written verbatim by `--new` rather
/// than generated from an executable template.
pub const TEMPLATE: &str = r#"# syncrclone job configuration

[A]
remote = "remoteA:path"
# workdir = "remoteA:path/.syncrclone"

[B]
remote = "remoteB:path"
# workdir = "remoteB:path/.syncrclone"

compare = "mtime"        # size | mtime | hash
conflict_mode = "tag"    # A | B | newer | older | larger | smaller | tag | none
tag_conflict = false
dt = 1.0
action_threads = 4
backup = true
"#;
