//! CSV reading operations.

use std::{collections::HashMap, fs::File, io::{Cursor, Read}, path::Path};

use anyhow::{Context, Result, ensure};
use flate2::read::GzDecoder;
use ndarray::Array1;
use polars::{frame::DataFrame, io::SerReader, prelude::{CsvReadOptions, DataType}};

use crate::data::{Microdata, TargetRow, TargetSpec, columns};

/// Target file columns, in file order.
const TARGET_COLUMNS: [&str; 7] = ["varname", "count", "scope", "agilo", "agihi", "fstatus", "target"];

/// Whether `path` names a gzip-compressed file.
fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Reads a CSV file from `path` into a Polars DataFrame, decompressing `.gz` files.
/// Column types are inferred from every row.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let mut file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;

    let mut bytes = Vec::new();
    if is_gzip(path) {
        GzDecoder::new(file).read_to_end(&mut bytes)
            .with_context(|| format!("[io::csv::read] Failed to decompress {}", path.display()))?;
    } else {
        file.read_to_end(&mut bytes)
            .with_context(|| format!("[io::csv::read] Failed to read {}", path.display()))?;
    }

    read_csv_bytes(&bytes)
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Read a DataFrame from CSV bytes.
pub(crate) fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .context("[io::csv::read] Failed to parse CSV")
}

/// A complete numeric column as `f64`.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let column = df.column(name)
        .with_context(|| format!("[io::csv::read] missing column '{name}'"))?;
    let values = column.cast(&DataType::Float64)?;
    ensure!(values.null_count() == 0, "[io::csv::read] column '{name}' has missing or non-numeric values");
    Ok(values.f64()?.into_no_null_iter().collect())
}

/// A complete integer column as `i64`.
fn integer_column(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = df.column(name)
        .with_context(|| format!("[io::csv::read] missing column '{name}'"))?;
    let values = column.cast(&DataType::Int64)?;
    ensure!(values.null_count() == 0, "[io::csv::read] column '{name}' has missing or non-integer values");
    Ok(values.i64()?.into_no_null_iter().collect())
}

/// Read national microdata from a (possibly gzipped) CSV file.
///
/// Only the fixed columns and the named `variables` are kept; names absent from the
/// file are skipped, so that target validation can report them against a target line.
/// When `agi_cache` is given, adjusted gross income is taken from it instead of the
/// `c00100` column.
pub fn read_microdata(path: &Path, agi_cache: Option<&Path>, variables: &[&str]) -> Result<Microdata> {
    let df = read_csv(path)?;
    tracing::debug!(rows = df.height(), columns = df.width(), "[io::csv::read] read microdata {}", path.display());

    let weights = numeric_column(&df, columns::WEIGHT)?;
    let agi = match agi_cache {
        Some(cache) => read_agi_cache(cache)?,
        None => numeric_column(&df, columns::AGI)
            .context("[io::csv::read] microdata has no adjusted income; supply an AGI cache")?,
    };
    let filing_status = integer_column(&df, columns::FILING_STATUS)?;
    let data_source = integer_column(&df, columns::DATA_SOURCE)?;

    let mut named = HashMap::from([(columns::PERSONS.to_string(), numeric_column(&df, columns::PERSONS)?)]);
    for &name in variables {
        if named.contains_key(name) || name == columns::WEIGHT || name == columns::AGI {
            continue;
        }
        if df.column(name).is_ok() {
            named.insert(name.to_string(), numeric_column(&df, name)?);
        }
    }

    Microdata::new(weights, agi, filing_status, data_source, named)
        .with_context(|| format!("[io::csv::read] invalid microdata in {}", path.display()))
}

/// Read an area target file. `label` prefixes line references in later errors.
pub fn read_targets(path: &Path, label: &str) -> Result<TargetSpec> {
    let df = read_csv(path)?;
    for name in TARGET_COLUMNS {
        ensure!(df.column(name).is_ok(),
            "[io::csv::read] {} lacks column '{name}' (expected header {})", path.display(), TARGET_COLUMNS.join(","));
    }

    let varname = df.column("varname")?;
    ensure!(varname.null_count() == 0, "[io::csv::read] {} has an empty varname", path.display());
    let varname = varname.str()?;

    let count = integer_column(&df, "count")?;
    let scope = integer_column(&df, "scope")?;
    let agilo = numeric_column(&df, "agilo")?;
    let agihi = numeric_column(&df, "agihi")?;
    let fstatus = integer_column(&df, "fstatus")?;
    let target = numeric_column(&df, "target")?;

    let rows = varname.into_no_null_iter().enumerate()
        .map(|(i, name)| TargetRow {
            varname: name.trim().to_string(),
            count: count[i],
            scope: scope[i],
            agilo: agilo[i],
            agihi: agihi[i],
            fstatus: fstatus[i],
            target: target[i],
        })
        .collect();

    TargetSpec::new(label, rows)
}

/// Read a precomputed adjusted-gross-income column (`c00100`) saved by [`write_agi_cache`](super::write_agi_cache).
pub fn read_agi_cache(path: &Path) -> Result<Array1<f64>> {
    let df = read_csv(path)?;
    numeric_column(&df, columns::AGI)
        .with_context(|| format!("[io::csv::read] invalid AGI cache {}", path.display()))
}
