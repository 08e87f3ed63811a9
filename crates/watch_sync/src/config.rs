use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tunables for the engine. Every field has a default, so a config file only
/// needs the keys it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Seconds of playback after which a video counts as watched.
    pub watched_floor_secs: f64,
    /// Fraction of the duration that counts as watched for short videos.
    pub watched_ratio: f64,
    pub watched_class: String,
    pub badge_class: String,
    pub badge_text: String,
    pub header_badge_id: String,
    pub progress_style_id: String,
    pub hide_progress_css: String,
    /// Upper bound on observer delivery rounds per `pump`.
    pub max_delivery_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watched_floor_secs: 10.0,
            watched_ratio: 0.5,
            watched_class: "yourect-watched-marker".into(),
            badge_class: "yourect-watched-badge".into(),
            badge_text: "WATCHED".into(),
            header_badge_id: "yourect-header-badge".into(),
            progress_style_id: "yourect-hide-progress".into(),
            hide_progress_css: "ytd-thumbnail-overlay-resume-playback-renderer { display:none; }".into(),
            max_delivery_rounds: 64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.watched_floor_secs.is_finite() && self.watched_floor_secs >= 0.0) {
            return Err(ConfigError::Invalid("watched_floor_secs must be a non-negative number"));
        }
        if !(self.watched_ratio > 0.0 && self.watched_ratio <= 1.0) {
            return Err(ConfigError::Invalid("watched_ratio must be in (0, 1]"));
        }
        if self.watched_class.split_ascii_whitespace().count() != 1
            || self.badge_class.split_ascii_whitespace().count() != 1
        {
            return Err(ConfigError::Invalid("class names must be single tokens"));
        }
        if self.max_delivery_rounds == 0 {
            return Err(ConfigError::Invalid("max_delivery_rounds must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str("watched_floor_secs = 30.0\nbadge_text = \"SEEN\"").unwrap();
        assert_eq!(config.watched_floor_secs, 30.0);
        assert_eq!(config.badge_text, "SEEN");
        assert_eq!(config.watched_ratio, 0.5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("watched_flor_secs = 3.0"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn out_of_range_ratio_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("watched_ratio = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EngineConfig::load(Path::new("/nonexistent/watchmark.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/watchmark.toml"));
    }
}
