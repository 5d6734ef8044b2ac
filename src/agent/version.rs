//! Version string parsing and comparison for the version gate.

use regex::Regex;
use std::sync::OnceLock;

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"rclone\s+v?(\d[\d.]*)").expect("valid regex"))
}

/// Extracts the dotted version number from `rclone --version` output, e.g.
/// `"rclone v1.65.2\n..."` -> `"1.65.2"`.
#[must_use]
pub fn parse_version(version_output: &str) -> Option<String> {
    version_regex()
        .captures(version_output)
        .map(|caps| caps[1].to_string())
}

fn parts(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|p| p.parse::<u64>().unwrap_or(0))
        .collect()
}

/// Whether `found` is strictly older than `minimum`, comparing dotted
/// numeric components left to right (missing trailing components count as
/// zero).
#[must_use]
pub fn is_older(found: &str, minimum: &str) -> bool {
    let found = parts(found);
    let minimum = parts(minimum);
    let len = found.len().max(minimum.len());
    for i in 0..len {
        let f = found.get(i).copied().unwrap_or(0);
        let m = minimum.get(i).copied().unwrap_or(0);
        if f != m {
            return f < m;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_version_line() {
        assert_eq!(
            parse_version("rclone v1.65.2\n- os/version: ubuntu\n"),
            Some("1.65.2".to_string())
        );
    }

    #[test]
    fn parse_fails_on_garbage() {
        assert_eq!(parse_version("not a version string"), None);
    }

    #[test]
    fn older_version_detected() {
        assert!(is_older("1.50.0", "1.60.0"));
        assert!(!is_older("1.60.0", "1.50.0"));
        assert!(!is_older("1.60.0", "1.60.0"));
    }

    #[test]
    fn compares_with_missing_components() {
        assert!(is_older("1.9", "1.10.0"));
        assert!(!is_older("1.10", "1.9.9"));
    }
}
