use std::path::PathBuf;

/// Area weight calibration CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "areaweights", version, about)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Area code: a lower-case state (e.g. mn) or state plus district (e.g. mn03)
    pub area: String,

    /// Directory holding <area>_targets.csv files
    #[arg(long, default_value = "targets", value_hint = clap::ValueHint::DirPath)]
    pub targets_dir: PathBuf,

    /// Directory receiving the weights file and log
    #[arg(long, default_value = "weights", value_hint = clap::ValueHint::DirPath)]
    pub weights_dir: PathBuf,

    /// National microdata CSV, optionally gzipped
    #[arg(long, default_value = "tmd.csv.gz", value_hint = clap::ValueHint::FilePath)]
    pub microdata: PathBuf,

    /// Population forecast JSON (year -> population)
    #[arg(long, default_value = "cbo_population_forecast.json", value_hint = clap::ValueHint::FilePath)]
    pub forecast: PathBuf,

    /// Precomputed adjusted gross income (one-column c00100 CSV)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub agi_cache: Option<PathBuf>,

    /// Save the adjusted gross income in use to this file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub write_agi_cache: Option<PathBuf>,

    /// JSON file overriding calibration and horizon settings
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Write the diagnostic log to <weights-dir>/<area>.log instead of stdout
    #[arg(long)]
    pub log: bool,

    /// Do the calculations without writing a weights file
    #[arg(long)]
    pub no_write: bool,
}
