//! Weight creation for one area, from input files to the weights file.

use std::{fs::File, io::{BufWriter, Write}, path::{Path, PathBuf}};

use anyhow::{Context, Result, bail};

use crate::{
    area::AreaCode,
    calibrate::{Calibration, TargetMatrix, WeightCalibrator, diagnostics::{sci, target_rmse}},
    common::{ensure_dir_exists, remove_stale_file},
    config::{CalibrationConfig, Config},
    data::{Microdata, TargetSpec},
    extrapolate::YearlyWeights,
    io,
};

/// Where inputs live, where outputs go, and which outputs to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Directory holding `<area>_targets.csv` files.
    pub targets_dir: PathBuf,
    /// Directory receiving weights files and logs.
    pub weights_dir: PathBuf,
    /// National microdata CSV (optionally gzipped).
    pub microdata: PathBuf,
    /// Population forecast JSON.
    pub forecast: PathBuf,
    /// Precomputed adjusted gross income to use instead of the microdata column.
    pub agi_cache: Option<PathBuf>,
    /// Save the adjusted gross income in use to this file.
    pub write_agi_cache: Option<PathBuf>,
    /// Write the diagnostic log to `<weights_dir>/<area>.log` rather than stdout.
    pub write_log: bool,
    /// Write the weights file; otherwise only do the calculations.
    pub write_file: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            targets_dir: PathBuf::from("targets"),
            weights_dir: PathBuf::from("weights"),
            microdata: PathBuf::from("tmd.csv.gz"),
            forecast: PathBuf::from("cbo_population_forecast.json"),
            agi_cache: None,
            write_agi_cache: None,
            write_log: false,
            write_file: true,
        }
    }
}

/// Calibration of one area's weights, with the scale it started from.
#[derive(Debug, Clone)]
pub struct AreaCalibration {
    /// Area population target over the weighted national population.
    pub initial_weight_scale: f64,
    pub calibration: Calibration,
}

/// Everything produced by [`create_area_weights`].
#[derive(Debug, Clone)]
pub struct AreaWeights {
    pub area: AreaCode,
    pub calibration: AreaCalibration,
    /// Extrapolated weights, when a weights file was requested.
    pub yearly: Option<YearlyWeights>,
    /// Path of the written weights file.
    pub weights_file: Option<PathBuf>,
}

/// Locate the target file for `area`, failing if it is absent.
pub fn target_file(area: &AreaCode, targets_dir: &Path) -> Result<PathBuf> {
    let name = area.targets_file_name();
    let path = targets_dir.join(&name);
    if !path.is_file() {
        bail!("{name} file not in {} folder", targets_dir.display());
    }
    Ok(path)
}

/// Build the target matrix for `spec` and calibrate area weights, writing the
/// diagnostic log to `out`.
///
/// The proportionally scaled national weights are reported before optimizing.
pub fn calibrate_area(
    data: &Microdata,
    spec: &TargetSpec,
    config: &CalibrationConfig,
    out: &mut dyn Write,
    timings: bool,
) -> Result<AreaCalibration> {
    let matrix = TargetMatrix::build(data, spec)?;
    let initial_weight_scale = matrix.initial_weight_scale();
    tracing::info!(records = data.len(), targets = matrix.num_targets(), initial_weight_scale,
        "[pipeline] built target matrix for {}", spec.label());

    let calibrator = WeightCalibrator::new(&matrix, data.weights(), *config)?;

    writeln!(out, "INITIAL WEIGHTS STATISTICS:")?;
    writeln!(out, "sum of national weights = {}", sci(data.total_weight(), 6))?;
    writeln!(out, "area weights_scale = {}", sci(initial_weight_scale, 6))?;
    writeln!(out, "USING {}_targets.csv FILE WITH {} TARGETS", spec.label(), matrix.num_targets())?;

    let report = target_rmse(calibrator.scaled_weights(), &matrix, config.target_ratio_tolerance,
        None, config.dump_all_target_deviations);
    write!(out, "{report}")?;
    writeln!(out, "US_PROPORTIONALLY_SCALED_TARGET_RMSE= {}", sci(report.rmse, 9))?;
    writeln!(out, "target_matrix sparsity ratio = {:.3}", matrix.sparsity())?;

    let calibration = calibrator.calibrate(out, timings)?;
    Ok(AreaCalibration { initial_weight_scale, calibration })
}

/// Create the weights file for `area`.
///
/// Removes any earlier weights file and log for the area, reads the targets and
/// microdata, calibrates, and (unless `options.write_file` is off) extrapolates the
/// weights over the configured horizon and writes them.
pub fn create_area_weights(area: &AreaCode, options: &RunOptions, config: &Config) -> Result<AreaWeights> {
    config.validate()?;
    let targets_path = target_file(area, &options.targets_dir)?;

    ensure_dir_exists(&options.weights_dir)?;
    let weights_path = options.weights_dir.join(area.weights_file_name());
    let log_path = options.weights_dir.join(area.log_file_name());
    remove_stale_file(&weights_path)?;
    remove_stale_file(&log_path)?;

    let mut out: Box<dyn Write> = if options.write_log {
        let file = File::create(&log_path)
            .with_context(|| format!("[pipeline] Failed to create log {}", log_path.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(std::io::stdout().lock())
    };

    if options.write_file {
        writeln!(out, "CREATING WEIGHTS FILE FOR AREA {area} ...")?;
    } else {
        writeln!(out, "DOING JUST WEIGHTS FILE CALCS FOR AREA {area} ...")?;
    }

    let spec = io::read_targets(&targets_path, area.as_str())?;
    let variables = spec.rows().iter().map(|row| row.varname.as_str()).collect::<Vec<_>>();
    let data = io::read_microdata(&options.microdata, options.agi_cache.as_deref(), &variables)?;

    if let Some(cache) = &options.write_agi_cache {
        io::write_agi_cache(data.agi(), cache)?;
        tracing::info!("[pipeline] wrote AGI cache {}", cache.display());
    }

    let calibration = calibrate_area(&data, &spec, &config.calibration, &mut *out, !options.write_log)?;
    out.flush().context("[pipeline] Failed to flush diagnostic log")?;
    drop(out);

    if !options.write_file {
        return Ok(AreaWeights { area: area.clone(), calibration, yearly: None, weights_file: None });
    }

    let forecast = io::read_forecast(&options.forecast)?;
    let yearly = YearlyWeights::extrapolate(calibration.calibration.area_weights.view(), &forecast, &config.horizon)?;
    io::write_weights(&yearly, &weights_path)?;
    tracing::info!(years = yearly.len(), "[pipeline] wrote {}", weights_path.display());

    Ok(AreaWeights { area: area.clone(), calibration, yearly: Some(yearly), weights_file: Some(weights_path) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_target_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let area = AreaCode::parse("zz").unwrap();
        let err = target_file(&area, dir.path()).unwrap_err();
        assert_eq!(err.to_string(), format!("zz_targets.csv file not in {} folder", dir.path().display()));

        std::fs::write(dir.path().join("zz_targets.csv"), "").unwrap();
        assert_eq!(target_file(&area, dir.path()).unwrap(), dir.path().join("zz_targets.csv"));
    }
}
