//! File formats for the data contracts around the calibration core.
//!
//! - `csv` - microdata, target files, the AGI cache and the gzipped weights file
//! - `json` - population forecast and configuration files

mod csv;
mod json;

pub use csv::{read_agi_cache, read_microdata, read_targets, write_agi_cache, write_weights};
pub use json::{read_forecast, read_json};
