//! Deployment stage classification.

use serde::{Deserialize, Serialize};

/// Stage names that are development-like regardless of suffix.
const DEVELOPMENT_STAGES: [&str; 3] = ["dev", "development", "feature"];

/// Prefix marking per-feature stages (`feature-login`, `FEATURE-42`, ...).
const FEATURE_PREFIX: &str = "feature-";

/// Class of a deployment stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageClass {
    /// Non-production stage; reserved concurrency gets removed.
    DevelopmentLike,

    /// Anything else; the plugin stays inert.
    Other,
}

impl StageClass {
    /// Classify a stage name.
    pub fn of(stage: &str) -> Self {
        if is_development_like(stage) {
            StageClass::DevelopmentLike
        } else {
            StageClass::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageClass::DevelopmentLike => "development_like",
            StageClass::Other => "other",
        }
    }
}

/// Whether `stage` is a development-like stage.
///
/// Case-insensitive: true for `dev`, `development`, `feature`, and anything
/// starting with `feature-`.
pub fn is_development_like(stage: &str) -> bool {
    let stage = stage.to_lowercase();
    DEVELOPMENT_STAGES.contains(&stage.as_str()) || stage.starts_with(FEATURE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_development_stages() {
        for stage in ["dev", "development", "feature", "DEV", "Development", "FeAtUrE"] {
            assert!(is_development_like(stage), "{stage} should be development-like");
        }
    }

    #[test]
    fn test_feature_prefix() {
        assert!(is_development_like("feature-login"));
        assert!(is_development_like("Feature-XYZ"));
        assert!(is_development_like("FEATURE-"));
    }

    #[test]
    fn test_other_stages() {
        for stage in [
            "production",
            "prod",
            "staging",
            "",
            "devel",
            "features",
            "feature_x",
            "my-feature-x",
            " dev",
        ] {
            assert!(!is_development_like(stage), "{stage:?} should not be development-like");
        }
    }

    #[test]
    fn test_stage_class() {
        assert_eq!(StageClass::of("dev"), StageClass::DevelopmentLike);
        assert_eq!(StageClass::of("production"), StageClass::Other);
        assert_eq!(StageClass::DevelopmentLike.name(), "development_like");
    }
}
