//! Engine configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Tuning knobs shared by every session of one engine instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads per session pipeline stage.
    pub workers: usize,
    /// Density threshold of a quadtree cell, in weighted points.
    pub max_points: u32,
    /// Minimum quadtree cell width, in degrees; splitting stops below it.
    pub min_cell_x: f64,
    /// Minimum quadtree cell height, in degrees.
    pub min_cell_y: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { workers: 4, max_points: 40, min_cell_x: 0.005, min_cell_y: 0.005 }
    }
}

impl EngineConfig {
    /// Reads a config from a TOML file and validates it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: EngineConfig =
            toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers < 1 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.max_points < 1 {
            return Err(Error::Config("max_points must be at least 1".to_string()));
        }
        if !(self.min_cell_x > 0.0) || !(self.min_cell_y > 0.0) {
            return Err(Error::Config("minimum cell size must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_from_toml() {
        let cfg: EngineConfig =
            toml::from_str("workers = 8\nmax_points = 25\n").unwrap();
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.max_points, 25);
        assert!((cfg.min_cell_x - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cfg = EngineConfig { workers: 0, ..EngineConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = EngineConfig { max_points: 0, ..EngineConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
