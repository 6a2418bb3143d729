use anyhow::{Context, Result};
use areaweights::{AreaCode, Config, RunOptions, create_area_weights};

pub fn run(cli: &crate::cli::Cli) -> Result<()> {
    let area = AreaCode::parse(&cli.area)?;

    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    let options = RunOptions {
        targets_dir: cli.targets_dir.clone(),
        weights_dir: cli.weights_dir.clone(),
        microdata: cli.microdata.clone(),
        forecast: cli.forecast.clone(),
        agi_cache: cli.agi_cache.clone(),
        write_agi_cache: cli.write_agi_cache.clone(),
        write_log: cli.log,
        write_file: !cli.no_write,
    };

    tracing::info!(area = %area, "[create] creating area weights");
    let result = create_area_weights(&area, &options, &config)
        .with_context(|| format!("[create] failed to create weights for area {area}"))?;

    let calibration = &result.calibration.calibration;
    if calibration.misses > 0 || !calibration.solver.success {
        tracing::warn!(misses = calibration.misses, success = calibration.solver.success,
            "[create] area {area} calibrated with target misses");
    }
    if let Some(path) = &result.weights_file {
        tracing::info!("[create] wrote {}", path.display());
    }

    Ok(())
}
