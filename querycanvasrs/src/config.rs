//! Configuration for the query canvas.
//!
//! TOML-based, every section optional. Defaults mirror the canvas and history
//! limits of the visual builder.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dialect::SqlDialect;
use crate::error::{QueryCanvasError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryCanvasConfig {
    pub canvas: CanvasConfig,
    pub history: HistoryConfig,
    pub executor: ExecutorConfig,
    pub sql: SqlConfig,
}

/// Canvas geometry used for table placement and drop clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Canvas width in pixels (default: 800).
    pub width: i32,
    /// Canvas height in pixels (default: 600).
    pub height: i32,
    /// Footprint of a placed table card (default: 200).
    pub table_width: i32,
    pub table_height: i32,
    /// Gap kept between auto-placed tables (default: 20).
    pub margin: i32,
}

/// Query history configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained entries, oldest dropped first (default: 100).
    pub max_entries: usize,
}

/// Query execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Execution timeout in milliseconds (0 = no timeout).
    pub timeout_ms: u64,
    /// Simulated executor latency bounds in milliseconds.
    pub simulated_latency_min_ms: u64,
    pub simulated_latency_max_ms: u64,
}

/// SQL rendering configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Dialect used by new sessions (default: generic).
    pub default_dialect: SqlDialect,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            table_width: 200,
            table_height: 200,
            margin: 20,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 100 }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            simulated_latency_min_ms: 500,
            simulated_latency_max_ms: 2_500,
        }
    }
}

impl QueryCanvasConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QueryCanvasError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(toml_str)
            .map_err(|e| QueryCanvasError::Config(format!("failed to parse config: {e}")))?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `QUERYCANVAS_CONFIG` environment variable
    /// 2. `./querycanvas.toml` (current directory)
    /// 3. `~/.config/querycanvas/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("QUERYCANVAS_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from QUERYCANVAS_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring QUERYCANVAS_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("querycanvas.toml") {
            tracing::info!("loaded config from ./querycanvas.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("querycanvas").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    fn check(&self) -> Result<()> {
        let canvas = &self.canvas;
        if canvas.width <= 0 || canvas.height <= 0 {
            return Err(QueryCanvasError::Config(format!(
                "canvas must have a positive size, got {}x{}",
                canvas.width, canvas.height
            )));
        }
        if canvas.table_width <= 0 || canvas.table_height <= 0 || canvas.margin < 0 {
            return Err(QueryCanvasError::Config(
                "table size must be positive and margin non-negative".to_string(),
            ));
        }
        if self.executor.simulated_latency_min_ms > self.executor.simulated_latency_max_ms {
            return Err(QueryCanvasError::Config(
                "simulated_latency_min_ms exceeds simulated_latency_max_ms".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = QueryCanvasConfig::default();
        assert_eq!(cfg.canvas.width, 800);
        assert_eq!(cfg.canvas.height, 600);
        assert_eq!(cfg.canvas.table_width, 200);
        assert_eq!(cfg.canvas.margin, 20);
        assert_eq!(cfg.history.max_entries, 100);
        assert_eq!(cfg.executor.timeout_ms, 30_000);
        assert_eq!(cfg.sql.default_dialect, SqlDialect::Generic);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[canvas]
width = 1200
height = 900

[history]
max_entries = 10

[sql]
default_dialect = "postgresql"
"#;
        let cfg = QueryCanvasConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.canvas.width, 1200);
        assert_eq!(cfg.canvas.height, 900);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.canvas.table_height, 200);
        assert_eq!(cfg.history.max_entries, 10);
        assert_eq!(cfg.sql.default_dialect, SqlDialect::PostgreSql);
    }

    #[test]
    fn test_rejects_degenerate_canvas() {
        let err = QueryCanvasConfig::from_toml("[canvas]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, QueryCanvasError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("querycanvas.toml");
        std::fs::write(&path, "[executor]\ntimeout_ms = 0\n").unwrap();
        let cfg = QueryCanvasConfig::from_file(&path).unwrap();
        assert_eq!(cfg.executor.timeout_ms, 0);
    }
}
