//! CSV writing operations.

use std::{fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use flate2::{Compression, write::GzEncoder};
use ndarray::ArrayView1;
use polars::{frame::DataFrame, io::SerWriter, prelude::{Column, CsvWriter, NamedFrom}, series::Series};

use crate::{data::columns, extrapolate::YearlyWeights};

/// Write a DataFrame to a CSV file.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))
}

/// Write a DataFrame to CSV bytes.
pub(crate) fn write_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(df)
        .context("[io::csv::write] Failed to write CSV to bytes")?;
    Ok(out)
}

/// Write a DataFrame to a gzip-compressed CSV file.
pub(crate) fn write_csv_gz(df: &mut DataFrame, path: &Path) -> Result<()> {
    let bytes = write_csv_bytes(df)?;
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create {}", path.display()))?;

    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&bytes)
        .with_context(|| format!("[io::csv::write] Failed to compress CSV to {}", path.display()))?;
    encoder.finish()
        .with_context(|| format!("[io::csv::write] Failed to finish compression of {}", path.display()))?;
    Ok(())
}

/// Write a weights file: one `WT<year>` column per year, integer weights rounded
/// half-to-even, rows in microdata order.
pub fn write_weights(weights: &YearlyWeights, path: &Path) -> Result<()> {
    let columns = weights.iter()
        .map(|(year, values)| {
            let rounded = values.iter().map(|&w| w.round_ties_even() as i64).collect::<Vec<_>>();
            Series::new(YearlyWeights::column_name(year).into(), rounded).into()
        })
        .collect::<Vec<Column>>();

    let mut df = DataFrame::new(columns)?;
    write_csv_gz(&mut df, path)
}

/// Save an adjusted-gross-income column so later runs can skip recomputing it.
pub fn write_agi_cache(agi: ArrayView1<f64>, path: &Path) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Series::new(columns::AGI.into(), agi.to_vec()).into(),
    ])?;
    write_csv(&mut df, path)
}
