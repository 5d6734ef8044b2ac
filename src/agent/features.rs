//! Backend capability probe (`rclone backend features`).

use serde::Deserialize;

use super::{Agent, IoMode};

/// A remote's relevant capabilities, with conservative defaults used
/// whenever the probe can't be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    pub copy: bool,
    pub move_: bool,
    pub can_have_empty_directories: bool,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            copy: false,
            move_: false,
            can_have_empty_directories: true,
        }
    }
}

#[derive(Deserialize)]
struct FeaturesResponse {
    #[serde(rename = "Features")]
    features: FeaturesBlock,
}

#[derive(Deserialize, Default)]
struct FeaturesBlock {
    #[serde(rename = "Copy", default)]
    copy: bool,
    #[serde(rename = "Move", default)]
    move_: bool,
    #[serde(rename = "CanHaveEmptyDirectories", default = "default_true")]
    can_have_empty_directories: bool,
}

fn default_true() -> bool {
    true
}

pub(super) fn probe(agent: &Agent, remote: &str) -> Features {
    let args = vec!["backend".to_string(), "features".to_string(), remote.to_string()];
    let output = match agent.call(&args, IoMode::Capture, &[]) {
        Ok(out) => out,
        Err(_) => return Features::default(),
    };
    match serde_json::from_str::<FeaturesResponse>(&output.stdout) {
        Ok(parsed) => Features {
            copy: parsed.features.copy,
            move_: parsed.features.move_,
            can_have_empty_directories: parsed.features.can_have_empty_directories,
        },
        Err(_) => Features::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let f = Features::default();
        assert!(!f.copy);
        assert!(!f.move_);
        assert!(f.can_have_empty_directories);
    }

    #[test]
    fn parses_features_response() {
        let raw = r#"{"Features":{"Copy":true,"Move":false,"CanHaveEmptyDirectories":false}}"#;
        let parsed: FeaturesResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.features.copy);
        assert!(!parsed.features.move_);
        assert!(!parsed.features.can_have_empty_directories);
    }
}
