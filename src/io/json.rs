//! JSON reading operations.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::data::PopulationForecast;

/// Deserialize a value from the JSON file at `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("[io::json] Failed to open JSON file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("[io::json] Failed to parse JSON from {}", path.display()))
}

/// Read a population forecast: a JSON object mapping years to populations,
/// e.g. `{"2021": 335.0, "2022": 337.1}`.
pub fn read_forecast(path: &Path) -> Result<PopulationForecast> {
    let raw: BTreeMap<String, f64> = read_json(path)?;
    let by_year = raw.into_iter()
        .map(|(year, population)| {
            let year = year.trim().parse::<i32>()
                .with_context(|| format!("[io::json] forecast key '{year}' in {} is not a year", path.display()))?;
            Ok((year, population))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    PopulationForecast::new(by_year)
}
