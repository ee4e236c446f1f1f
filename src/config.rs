//! Run configuration (can be loaded from YAML)

use crate::tiling::MAX_BLOCK_EDGE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compute backend: "auto", "cuda", "wgpu", or "cpu"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Initial grid
    pub grid: GridConfig,
    /// Stepping and pacing
    pub simulation: SimConfig,
    /// Console output
    pub render: RenderConfig,
    /// Per-generation statistics
    #[serde(default)]
    pub metrics: MetricsSettings,
}

fn default_backend() -> String {
    "auto".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    /// Text grid to load (empty = random grid)
    pub input_file: String,
    /// Character marking a living cell in `input_file`
    pub living_mark: char,
    /// Living cells placed on a random grid
    pub living_cells: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Stop after N steps (0 = run until interrupted)
    pub max_steps: u64,
    /// Pause between steps in milliseconds
    pub step_delay_ms: u64,
    /// Largest tile edge handed to the backend (1..=32)
    pub max_block_edge: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub living_mark: char,
    pub dead_mark: char,
    /// Clear the console before each frame
    pub clear_console: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    /// Collect metrics every N steps
    pub interval: u64,
    /// Path to CSV output file (optional, metrics also logged)
    pub output_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            grid: GridConfig::default(),
            simulation: SimConfig::default(),
            render: RenderConfig::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 32,
            input_file: String::new(),
            living_mark: '#',
            living_cells: 512,
            seed: 42,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_steps: 0,
            step_delay_ms: 100,
            max_block_edge: MAX_BLOCK_EDGE,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            living_mark: '#',
            dead_mark: '.',
            clear_console: true,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 1,
            output_file: String::new(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn from_yaml(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a YAML file
    pub fn to_yaml(&self, path: &str) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Generate a template config file
    pub fn write_template(path: &str) -> Result<(), ConfigError> {
        Config::default().to_yaml(path)
    }

    /// Validate configuration. Returns warnings, or Err on fatal problems.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = Vec::new();

        if let Err(e) = self.backend.parse::<crate::engine::Backend>() {
            return Err(ConfigError::Invalid(e));
        }

        let from_file = !self.grid.input_file.is_empty();
        if !from_file {
            if self.grid.width == 0 || self.grid.height == 0 {
                return Err(ConfigError::Invalid("Grid dimensions must be non-zero".to_string()));
            }
            let capacity = self.grid.width.checked_mul(self.grid.height).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "grid too large ({}x{} cells)",
                    self.grid.width, self.grid.height
                ))
            })?;
            if self.grid.living_cells > capacity {
                return Err(ConfigError::Invalid(format!(
                    "living_cells {} exceeds grid capacity {} ({}x{})",
                    self.grid.living_cells, capacity, self.grid.width, self.grid.height
                )));
            }
            if self.grid.living_cells == 0 {
                warnings.push("living_cells is 0, the grid starts (and stays) empty".to_string());
            }
        }

        if self.simulation.max_block_edge == 0 || self.simulation.max_block_edge > MAX_BLOCK_EDGE {
            return Err(ConfigError::Invalid(format!(
                "max_block_edge must be between 1 and {} (got {})",
                MAX_BLOCK_EDGE, self.simulation.max_block_edge
            )));
        }

        if self.render.living_mark == self.render.dead_mark {
            return Err(ConfigError::Invalid(format!(
                "living and dead marks are both '{}'",
                self.render.living_mark
            )));
        }

        if self.metrics.enabled && self.metrics.interval == 0 {
            warnings.push("metrics interval is 0, will be treated as 1".to_string());
        }

        if !self.render.enabled && !self.metrics.enabled && self.simulation.max_steps == 0 {
            warnings.push("rendering and metrics are disabled and max_steps is 0: the run produces no output".to_string());
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let warnings = Config::default().validate().unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "backend: cpu\ngrid:\n  width: 10\n  height: 5\n  living_cells: 7\nrender:\n  dead_mark: ' '\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backend, "cpu");
        assert_eq!((config.grid.width, config.grid.height), (10, 5));
        assert_eq!(config.grid.living_cells, 7);
        assert_eq!(config.grid.seed, 42);
        assert_eq!(config.render.dead_mark, ' ');
        assert_eq!(config.render.living_mark, '#');
        assert_eq!(config.simulation.max_block_edge, MAX_BLOCK_EDGE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_template_round_trip() {
        let path = std::env::temp_dir().join("gpu_life_config_test.yaml");
        let path = path.to_string_lossy().to_string();
        Config::write_template(&path).unwrap();
        let loaded = Config::from_yaml(&path).unwrap();
        assert_eq!(loaded.backend, "auto");
        assert_eq!(loaded.grid.width, GridConfig::default().width);
        assert_eq!(loaded.simulation.step_delay_ms, SimConfig::default().step_delay_ms);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_fatal_errors() {
        let mut config = Config::default();
        config.grid.width = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.grid.living_cells = config.grid.width * config.grid.height + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.simulation.max_block_edge = 64;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.render.dead_mark = '#';
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.backend = "opencl".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_oversized_grid_is_invalid() {
        let mut config = Config::default();
        config.grid.width = usize::MAX;
        config.grid.height = 2;
        config.grid.living_cells = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_file_input_skips_random_checks() {
        let mut config = Config::default();
        config.grid.input_file = "glider.txt".to_string();
        config.grid.width = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            Config::from_yaml("/nonexistent/gpu_life/config.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
