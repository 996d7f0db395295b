//! Configuration for the touch analyzer.

use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Columns every input CSV must carry
pub const DEFAULT_REQUIRED_COLUMNS: [&str; 4] = ["Time(ms)", "TouchX", "TouchY", "Layer Name"];

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the per-user log folders
    pub data_dir: PathBuf,

    /// Header names that must be present in every CSV
    pub required_columns: Vec<String>,

    /// Collapse rows repeated verbatim across the combined files
    pub drop_duplicate_rows: bool,

    /// Screen size in touch coordinates
    pub screen_width: f64,
    pub screen_height: f64,

    pub cache: CacheConfig,

    pub heatmap: HeatmapConfig,

    /// Number of touch layers listed in the text report
    pub top_layers: usize,

    /// Number of swipe layers listed in the text report
    pub top_swipe_layers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data_log"),
            required_columns: DEFAULT_REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            drop_duplicate_rows: true,
            screen_width: 3840.0,
            screen_height: 850.0,
            cache: CacheConfig::default(),
            heatmap: HeatmapConfig::default(),
            top_layers: 10,
            top_swipe_layers: 5,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, AnalyzerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON text; omitted fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, AnalyzerError> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| AnalyzerError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), AnalyzerError> {
        let io_err = |source| AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), AnalyzerError> {
        if self.required_columns.is_empty() {
            return Err(AnalyzerError::Config(
                "required_columns must not be empty".to_string(),
            ));
        }
        if !(self.screen_width > 0.0 && self.screen_height > 0.0) {
            return Err(AnalyzerError::Config(format!(
                "screen size must be positive, got {}x{}",
                self.screen_width, self.screen_height
            )));
        }
        self.heatmap.validate()
    }

    /// Heatmap bin counts `(x, y)` for the given number of points
    pub fn adaptive_bins(&self, point_count: usize) -> (usize, usize) {
        self.heatmap.bins_for(point_count)
    }
}

/// Result cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Adaptive heatmap binning.
///
/// `density = point_count / data_density_threshold + 1`, then each axis gets
/// `density * multiplier` bins clamped to `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub data_density_threshold: usize,
    pub bins_multiplier_x: usize,
    pub bins_multiplier_y: usize,
    pub min_bins_x: usize,
    pub max_bins_x: usize,
    pub min_bins_y: usize,
    pub max_bins_y: usize,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            data_density_threshold: 1000,
            bins_multiplier_x: 27,
            bins_multiplier_y: 5,
            min_bins_x: 53,
            max_bins_x: 133,
            min_bins_y: 13,
            max_bins_y: 27,
        }
    }
}

impl HeatmapConfig {
    pub fn bins_for(&self, point_count: usize) -> (usize, usize) {
        let density = point_count / self.data_density_threshold.max(1) + 1;
        let x = (density * self.bins_multiplier_x).clamp(self.min_bins_x, self.max_bins_x);
        let y = (density * self.bins_multiplier_y).clamp(self.min_bins_y, self.max_bins_y);
        (x, y)
    }

    fn validate(&self) -> Result<(), AnalyzerError> {
        if self.min_bins_x == 0 || self.min_bins_y == 0 {
            return Err(AnalyzerError::Config("heatmap bins must be at least 1".to_string()));
        }
        if self.min_bins_x > self.max_bins_x || self.min_bins_y > self.max_bins_y {
            return Err(AnalyzerError::Config(
                "heatmap min bins exceed max bins".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde support for Duration as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("data_log"));
        assert_eq!(config.required_columns.len(), 4);
        assert_eq!(config.screen_width, 3840.0);
        assert_eq!(config.screen_height, 850.0);
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"screen_width": 1920, "cache": {"ttl": 60}}"#).unwrap();
        assert_eq!(config.screen_width, 1920.0);
        assert_eq!(config.screen_height, 850.0);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.max_entries, 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Config::from_json(r#"{"required_columns": []}"#),
            Err(AnalyzerError::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"screen_width": 0}"#),
            Err(AnalyzerError::Config(_))
        ));
        assert!(matches!(Config::from_json("not json"), Err(AnalyzerError::Config(_))));
    }

    #[test]
    fn test_adaptive_bins() {
        let config = Config::default();
        // Sparse data sits on the minimum
        assert_eq!(config.adaptive_bins(0), (53, 13));
        assert_eq!(config.adaptive_bins(999), (53, 13));
        // density 3 -> 81 x 15
        assert_eq!(config.adaptive_bins(2500), (81, 15));
        // Dense data is capped
        assert_eq!(config.adaptive_bins(100_000), (133, 27));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("touch-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");

        let mut config = Config::default();
        config.top_layers = 3;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);

        let missing = Config::load(&dir.join("nope.json")).unwrap();
        assert_eq!(missing, Config::default());

        std::fs::remove_dir_all(&dir).ok();
    }
}
