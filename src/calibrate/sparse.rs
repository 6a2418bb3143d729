use anyhow::{Result, ensure};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

/// A real matrix in compressed sparse row format.
///
/// Target matrices are stored one row per target and one column per record, so a row
/// holds the (few) records a target applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    ncols: usize,
    offsets: Vec<usize>,
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Construct a matrix from per-row `(column, value)` entries.
    /// Columns within a row must be strictly increasing and less than `ncols`.
    pub fn from_rows(ncols: usize, rows: Vec<Vec<(u32, f64)>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            ensure!(row.windows(2).all(|w| w[0].0 < w[1].0),
                "[calibrate::sparse] row {i}: column indices must be strictly increasing");
            if let Some(&(last, _)) = row.last() {
                ensure!((last as usize) < ncols,
                    "[calibrate::sparse] row {i}: column {last} out of range for {ncols} columns");
            }
        }

        Ok(Self::assemble(ncols, rows))
    }

    /// Construct a matrix from a dense array, dropping exact zeros.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let rows = dense.rows().into_iter()
            .map(|row| row.iter().enumerate()
                .filter(|&(_, &v)| v != 0.0)
                .map(|(j, &v)| (j as u32, v))
                .collect())
            .collect::<Vec<Vec<_>>>();

        Self::assemble(dense.ncols(), rows)
    }

    fn assemble(ncols: usize, rows: Vec<Vec<(u32, f64)>>) -> Self {
        Self {
            ncols,
            offsets: std::iter::once(0).chain(
                rows.iter()
                    .map(|row| row.len())
                    .scan(0, |acc, len| { *acc += len; Some(*acc) })
            ).collect(),
            indices: rows.iter().flatten().map(|&(j, _)| j).collect(),
            values: rows.iter().flatten().map(|&(_, v)| v).collect(),
        }
    }

    #[inline] pub fn nrows(&self) -> usize { self.offsets.len() - 1 }

    #[inline] pub fn ncols(&self) -> usize { self.ncols }

    /// Number of stored (non-zero) entries.
    #[inline] pub fn nnz(&self) -> usize { self.values.len() }

    /// Fraction of entries that are stored.
    pub fn density(&self) -> f64 {
        let size = self.nrows() * self.ncols;
        if size == 0 { 0.0 } else { self.nnz() as f64 / size as f64 }
    }

    #[inline]
    fn range(&self, row: usize) -> std::ops::Range<usize> {
        self.offsets[row]..self.offsets[row + 1]
    }

    /// Iterator over the stored `(column, value)` entries of a row.
    #[inline]
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.range(row).map(move |k| (self.indices[k] as usize, self.values[k]))
    }

    /// Matrix-vector product `A·x`.
    pub fn dot(&self, x: &ArrayView1<f64>) -> Array1<f64> {
        debug_assert_eq!(x.len(), self.ncols, "x length must equal column count");
        (0..self.nrows()).into_par_iter()
            .map(|i| self.row(i).map(|(j, v)| v * x[j]).sum::<f64>())
            .collect::<Vec<_>>()
            .into()
    }

    /// Transposed product `Aᵗ·y`.
    pub fn tr_dot(&self, y: &ArrayView1<f64>) -> Array1<f64> {
        debug_assert_eq!(y.len(), self.nrows(), "y length must equal row count");
        let mut out = Array1::zeros(self.ncols);
        for i in 0..self.nrows() {
            let yi = y[i];
            if yi == 0.0 { continue }
            for (j, v) in self.row(i) { out[j] += v * yi }
        }
        out
    }

    /// Copy of this matrix with column `j` multiplied by `scale[j]`.
    pub fn scale_columns(&self, scale: &ArrayView1<f64>) -> Self {
        debug_assert_eq!(scale.len(), self.ncols, "scale length must equal column count");
        Self {
            ncols: self.ncols,
            offsets: self.offsets.clone(),
            indices: self.indices.clone(),
            values: self.indices.iter().zip(&self.values)
                .map(|(&j, &v)| v * scale[j as usize])
                .collect(),
        }
    }

    /// Sum of squared entries in each column (the diagonal of `AᵗA`).
    pub fn column_sq_norms(&self) -> Array1<f64> {
        let mut out = Array1::zeros(self.ncols);
        for (&j, &v) in self.indices.iter().zip(&self.values) {
            out[j as usize] += v * v;
        }
        out
    }

    /// Dense copy, mostly for inspection and tests.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.nrows(), self.ncols));
        for i in 0..self.nrows() {
            for (j, v) in self.row(i) { dense[[i, j]] = v }
        }
        dense
    }
}
