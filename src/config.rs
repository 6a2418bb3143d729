use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

pub use crate::calibrate::SolverConfig;

/// Run configuration. Every field has a production default, so a JSON file
/// only needs to name the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationConfig,
    pub horizon: HorizonConfig,
}

/// Target tolerance and regularization schedule.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Half-width of the band around 1.0 within which an achieved/expected ratio hits its target.
    pub target_ratio_tolerance: f64,
    /// List every target's deviation in the diagnostic log, not just the histogram.
    pub dump_all_target_deviations: bool,
    /// Regularization strength for the first loop.
    pub delta_init: f64,
    /// Maximum number of regularization loops.
    pub delta_max_loops: usize,
    /// Deltas below this snap to zero.
    pub delta_floor: f64,
    pub solver: SolverConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_ratio_tolerance: 0.0005,
            dump_all_target_deviations: false,
            delta_init: 1.0e-9,
            delta_max_loops: 5,
            delta_floor: 1.0e-20,
            solver: SolverConfig::default(),
        }
    }
}

impl CalibrationConfig {
    /// Amount by which delta shrinks after each loop that still misses targets.
    pub fn delta_decrement(&self) -> f64 {
        if self.delta_max_loops > 1 {
            self.delta_init / (self.delta_max_loops - 1) as f64
        } else {
            0.0
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.target_ratio_tolerance > 0.0 && self.target_ratio_tolerance.is_finite(),
            "[config] target_ratio_tolerance must be positive, got {}", self.target_ratio_tolerance);
        ensure!(self.delta_max_loops > 0, "[config] delta_max_loops must be at least 1");
        ensure!(self.delta_init >= 0.0 && self.delta_init.is_finite(),
            "[config] delta_init must be non-negative, got {}", self.delta_init);
        ensure!(self.delta_floor >= 0.0, "[config] delta_floor must be non-negative, got {}", self.delta_floor);
        ensure!(self.solver.max_iter > 0, "[config] solver.max_iter must be at least 1");
        ensure!(self.solver.ftol >= 0.0 && self.solver.gtol >= 0.0,
            "[config] solver tolerances must be non-negative");
        Ok(())
    }
}

/// Extrapolation horizon and weights-file scaling.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    pub first_year: i32,
    pub last_year: i32,
    /// Multiplier applied to area weights before they are written.
    pub weight_file_scale: f64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self { first_year: 2021, last_year: 2034, weight_file_scale: 100.0 }
    }
}

impl HorizonConfig {
    pub fn years(&self) -> std::ops::RangeInclusive<i32> { self.first_year..=self.last_year }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.first_year <= self.last_year,
            "[config] first_year {} is after last_year {}", self.first_year, self.last_year);
        ensure!(self.weight_file_scale > 0.0 && self.weight_file_scale.is_finite(),
            "[config] weight_file_scale must be positive, got {}", self.weight_file_scale);
        Ok(())
    }
}

impl Config {
    /// Read a (possibly partial) JSON configuration file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let config: Self = crate::io::read_json(path)
            .with_context(|| format!("[config] failed to load configuration from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.calibration.validate()?;
        self.horizon.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_constants() {
        let config = Config::default();
        assert_eq!(config.calibration.target_ratio_tolerance, 0.0005);
        assert_eq!(config.calibration.delta_init, 1e-9);
        assert_eq!(config.calibration.delta_max_loops, 5);
        assert_eq!(config.calibration.delta_decrement(), 1e-9 / 4.0);
        assert_eq!(config.calibration.solver.max_iter, 5000);
        assert_eq!(config.horizon.years().count(), 14);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let config: Config = serde_json::from_str(r#"{
            "calibration": { "delta_max_loops": 1, "solver": { "max_iter": 10 } },
            "horizon": { "last_year": 2023 }
        }"#).unwrap();
        assert_eq!(config.calibration.delta_max_loops, 1);
        assert_eq!(config.calibration.delta_decrement(), 0.0);
        assert_eq!(config.calibration.solver.max_iter, 10);
        assert_eq!(config.calibration.solver.history, 10);
        assert_eq!(config.calibration.target_ratio_tolerance, 0.0005);
        assert_eq!(config.horizon.years(), 2021..=2023);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.calibration.target_ratio_tolerance = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.calibration.delta_max_loops = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.calibration.delta_init = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.horizon.first_year = 2040;
        assert!(config.validate().is_err());
    }
}
