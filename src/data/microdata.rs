use std::collections::HashMap;

use anyhow::{Result, anyhow, ensure};
use ndarray::{Array1, ArrayView1};

/// Column names used by the national microdata file.
pub mod columns {
    /// National sampling weight.
    pub const WEIGHT: &str = "s006";
    /// Total persons on the return.
    pub const PERSONS: &str = "XTOT";
    /// Filing status code (1..=5).
    pub const FILING_STATUS: &str = "MARS";
    /// Source population indicator (1 = PUF, 0 = CPS).
    pub const DATA_SOURCE: &str = "data_source";
    /// Adjusted gross income computed by the tax simulation.
    pub const AGI: &str = "c00100";
}

/// National microdata: one record per tax unit, in file order.
///
/// Immutable once constructed. Every record carries a strictly positive national weight,
/// an adjusted-income value used for income-band masks, a filing status, a source flag,
/// and any number of named numeric variables.
#[derive(Debug, Clone)]
pub struct Microdata {
    weights: Array1<f64>,
    agi: Array1<f64>,
    filing_status: Vec<i64>,
    data_source: Vec<i64>,
    variables: HashMap<String, Array1<f64>>,
}

impl Microdata {
    pub fn new(
        weights: Array1<f64>,
        agi: Array1<f64>,
        filing_status: Vec<i64>,
        data_source: Vec<i64>,
        variables: HashMap<String, Array1<f64>>,
    ) -> Result<Self> {
        let len = weights.len();
        ensure!(agi.len() == len, "[data::microdata] agi has {} values, expected {len}", agi.len());
        ensure!(filing_status.len() == len,
            "[data::microdata] filing status has {} values, expected {len}", filing_status.len());
        ensure!(data_source.len() == len,
            "[data::microdata] data source has {} values, expected {len}", data_source.len());
        for (name, values) in &variables {
            ensure!(values.len() == len,
                "[data::microdata] variable '{name}' has {} values, expected {len}", values.len());
        }
        ensure!(weights.iter().all(|&w| w > 0.0), "[data::microdata] Not all weights are positive");

        Ok(Self { weights, agi, filing_status, data_source, variables })
    }

    /// Number of records.
    #[inline] pub fn len(&self) -> usize { self.weights.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.weights.is_empty() }

    /// National weights, one per record.
    #[inline] pub fn weights(&self) -> ArrayView1<'_, f64> { self.weights.view() }

    /// Adjusted gross income, one per record.
    #[inline] pub fn agi(&self) -> ArrayView1<'_, f64> { self.agi.view() }

    #[inline] pub fn filing_status(&self) -> &[i64] { &self.filing_status }

    #[inline] pub fn data_source(&self) -> &[i64] { &self.data_source }

    /// Look up a named variable.
    pub fn variable(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        match name {
            columns::WEIGHT => Ok(self.weights.view()),
            columns::AGI => Ok(self.agi.view()),
            _ => self.variables.get(name)
                .map(|v| v.view())
                .ok_or_else(|| anyhow!("[data::microdata] variable '{name}' not found in microdata")),
        }
    }

    /// Whether `name` can be resolved by [`Microdata::variable`].
    pub fn has_variable(&self, name: &str) -> bool {
        name == columns::WEIGHT || name == columns::AGI || self.variables.contains_key(name)
    }

    /// Sum of national weights.
    pub fn total_weight(&self) -> f64 { self.weights.sum() }

    /// Weighted count of persons in the nation.
    pub fn national_population(&self) -> Result<f64> {
        Ok(self.weights.dot(&self.variable(columns::PERSONS)?))
    }
}
