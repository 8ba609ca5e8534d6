use std::time::Duration;

use brandlens_classify::ClassifyOptions;
use brandlens_extract::ExtractorConfig;
use brandlens_score::{ScoreTable, ScoreTableError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid score table: {0}")]
    Score(#[from] ScoreTableError),

    #[error("Assisted extraction timeout must be greater than zero")]
    ZeroTimeout,

    #[error("max_candidate_tokens must be at least 1")]
    ZeroCandidateTokens,
}

/// Settings for the assisted strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    /// Upper bound on one completion call, retries included
    pub timeout_ms: u64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self { timeout_ms: 20_000 }
    }
}

impl AssistConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything the engine can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extractor: ExtractorConfig,
    pub score: ScoreTable,
    pub classify: ClassifyOptions,
    pub assist: AssistConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.score.validate()?;
        if self.assist.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.extractor.max_candidate_tokens == 0 {
            return Err(ConfigError::ZeroCandidateTokens);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.assist.timeout(), Duration::from_secs(20));
        assert_eq!(config.extractor.max_candidates, 15);
    }

    #[test]
    fn test_partial_json_config() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "extractor": {"max_candidates": 5},
                "classify": {"known_competitors": ["HubSpot"]},
                "assist": {"timeout_ms": 1500}
            }"#,
        )
        .unwrap();
        assert_eq!(config.extractor.max_candidates, 5);
        assert_eq!(config.extractor.max_candidate_tokens, 3);
        assert_eq!(config.classify.known_competitors, vec!["HubSpot"]);
        assert_eq!(config.assist.timeout(), Duration::from_millis(1500));
        assert_eq!(config.score, ScoreTable::default());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = EngineConfig::default();
        config.assist.timeout_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));

        let mut config = EngineConfig::default();
        config.score.min = 20.0;
        assert!(matches!(config.validate(), Err(ConfigError::Score(_))));
    }
}
