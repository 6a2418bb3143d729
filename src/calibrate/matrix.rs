//! Target matrix construction.
//!
//! Each target row becomes one column of a records x targets matrix: the target's
//! variable (or its positivity indicator), masked to the records the target applies to,
//! and divided by the target amount so that every scaled target equals one. The matrix
//! is stored transposed, one sparse row per target, since most targets touch only a
//! narrow slice of the records.

use anyhow::{Result, bail, ensure};
use ndarray::{Array1, Array2, ArrayView1};

use crate::data::{Microdata, Scope, TargetRow, TargetSpec};
use super::sparse::CsrMatrix;

/// Largest valid filing-status filter code.
const MAX_FILING_STATUS: i64 = 5;

/// Scaled target matrix, target vector and initial weight scale for one area.
#[derive(Debug, Clone)]
pub struct TargetMatrix {
    /// One row per target, one column per record.
    columns: CsrMatrix,
    targets: Array1<f64>,
    initial_weight_scale: f64,
}

impl TargetMatrix {
    /// Build the target matrix for `spec` over `data`.
    ///
    /// Fails if any row carries an out-of-range count, scope or filing-status code, names
    /// a variable missing from `data`, or if the first row is not the area population target.
    pub fn build(data: &Microdata, spec: &TargetSpec) -> Result<Self> {
        let national_population = data.national_population()?;
        ensure!(national_population > 0.0,
            "[calibrate::matrix] national population must be positive, got {national_population}");

        let mut rows = Vec::with_capacity(spec.len());
        let mut targets = Array1::zeros(spec.len());
        let mut initial_weight_scale = f64::NAN;

        for (index, row) in spec.rows().iter().enumerate() {
            let line = spec.line(index);
            ensure!(row.target.is_finite(), "target value {} is not finite on {line}", row.target);

            // A zero target cannot be used as a divisor; it is floored to one.
            let unscaled_target = if row.target == 0.0 { 1.0 } else { row.target };
            targets[index] = 1.0;

            if index == TargetSpec::POPULATION_ROW {
                ensure!(row.is_population_target(), "{line} does not contain the area population target");
                initial_weight_scale = row.target / national_population;
            }

            rows.push(target_column(data, row, 1.0 / unscaled_target, &line)?);
        }

        Ok(Self {
            columns: CsrMatrix::from_rows(data.len(), rows)?,
            targets,
            initial_weight_scale,
        })
    }

    /// Number of records (rows of the conceptual records x targets matrix).
    #[inline] pub fn num_records(&self) -> usize { self.columns.ncols() }

    /// Number of targets.
    #[inline] pub fn num_targets(&self) -> usize { self.columns.nrows() }

    /// Scaled target amounts (all equal to one).
    #[inline] pub fn targets(&self) -> ArrayView1<'_, f64> { self.targets.view() }

    /// Area population target divided by the weighted national population.
    #[inline] pub fn initial_weight_scale(&self) -> f64 { self.initial_weight_scale }

    /// The target columns, stored as rows of a sparse targets x records matrix.
    #[inline] pub fn columns(&self) -> &CsrMatrix { &self.columns }

    /// Fraction of zero entries in the matrix.
    pub fn sparsity(&self) -> f64 { 1.0 - self.columns.density() }

    /// National weights rescaled to the area's population.
    pub fn area_scaled_weights(&self, national_weights: ArrayView1<f64>) -> Array1<f64> {
        &national_weights * self.initial_weight_scale
    }

    /// Scaled target amounts achieved by `weights`.
    pub fn achieved(&self, weights: ArrayView1<f64>) -> Array1<f64> {
        self.columns.dot(&weights)
    }

    /// The calibration design matrix: targets x records, each column scaled by its weight.
    pub fn weighted(&self, weights: ArrayView1<f64>) -> CsrMatrix {
        self.columns.scale_columns(&weights)
    }

    /// Dense records x targets copy.
    pub fn to_dense(&self) -> Array2<f64> {
        self.columns.to_dense().reversed_axes()
    }
}

/// Sparse entries of one scaled, masked target column.
fn target_column(data: &Microdata, row: &TargetRow, scale: f64, line: &str) -> Result<Vec<(u32, f64)>> {
    let count = match row.count {
        0 => false,
        1 => true,
        other => bail!("count value {other} not in [0,1] range on {line}"),
    };
    let Some(scope) = Scope::from_code(row.scope) else {
        bail!("scope value {} not in [0,2] range on {line}", row.scope)
    };
    if !(0..=MAX_FILING_STATUS).contains(&row.fstatus) {
        bail!("fstatus value {} not in [0,{MAX_FILING_STATUS}] range on {line}", row.fstatus);
    }

    if !data.has_variable(&row.varname) {
        bail!("variable '{}' not found in microdata on {line}", row.varname);
    }
    let values = data.variable(&row.varname)?;
    let agi = data.agi();
    let filing_status = data.filing_status();
    let data_source = data.data_source();

    let entries = (0..data.len())
        .filter(|&i| scope.includes(data_source[i]))
        .filter(|&i| agi[i] >= row.agilo && agi[i] < row.agihi)
        .filter(|&i| row.fstatus == 0 || filing_status[i] == row.fstatus)
        .filter_map(|i| {
            let value = if count { if values[i] > 0.0 { 1.0 } else { 0.0 } } else { values[i] };
            (value != 0.0).then(|| (i as u32, value * scale))
        })
        .collect();

    Ok(entries)
}
