//! Environment scrubbing and credential redaction for agent invocations.

/// Environment variable name patterns never forwarded to a debug log in
/// clear text, regardless of whether they're forwarded to the child
/// process itself — a general suffix rule covering `RCLONE_CONFIG_PASS`
/// and its siblings rather than a single hardcoded name.
const REDACT_SUFFIXES: &[&str] = &["_PASS", "_TOKEN", "_SECRET", "_KEY"];

/// Whether an environment variable's name should be redacted when logged.
#[must_use]
pub fn is_credential_key(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    REDACT_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

/// The environment handed to a child `rclone` process: the parent's
/// environment, unfiltered for the child itself (rclone legitimately needs
/// `RCLONE_CONFIG_PASS` et al. to function) — scrubbing only ever applies
/// to what gets *logged*, never to what the child receives.
#[must_use]
pub fn scrubbed_env() -> Vec<(String, String)> {
    std::env::vars().collect()
}

/// Redacts credential-bearing assignments (`KEY=value`) inside a rendered
/// command line before it's logged at debug level.
#[must_use]
pub fn redact_command_line(line: &str) -> String {
    line.split(' ')
        .map(|token| match token.split_once('=') {
            Some((key, _value)) if is_credential_key(key) => format!("{key}=<redacted>"),
            _ => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_credential_suffixes() {
        assert!(is_credential_key("RCLONE_CONFIG_PASS"));
        assert!(is_credential_key("AWS_SECRET_ACCESS_KEY"));
        assert!(is_credential_key("API_TOKEN"));
        assert!(!is_credential_key("RCLONE_CONFIG_DIR"));
    }

    #[test]
    fn redacts_command_line_assignments() {
        let line = "rclone RCLONE_CONFIG_PASS=hunter2 lsjson remote:";
        let redacted = redact_command_line(line);
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("RCLONE_CONFIG_PASS=<redacted>"));
    }
}
