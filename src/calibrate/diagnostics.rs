//! Observational reports on a weight vector: target misses, target RMSE and
//! ratio distributions. Nothing here mutates calibration state; every report
//! renders itself through `Display` for the diagnostic log.

use std::fmt;

use ndarray::{Array1, ArrayView1};

use super::matrix::TargetMatrix;

/// Column header shared by the distribution tables.
const TABLE_HEADER: &str = "low bin ratio    high bin ratio    bin #    cum #     bin %     cum %";

/// Bin edges for achieved/expected target ratios, before the tolerance band is inserted.
const TARGET_RATIO_EDGES: [f64; 14] = [
    0.0, 0.4, 0.8, 0.9, 0.99, 1.01, 1.1, 1.2, 1.6, 2.0, 3.0, 4.0, 5.0, f64::INFINITY,
];

/// Bin edges for area/national weight ratios.
const WEIGHT_RATIO_EDGES: [f64; 22] = [
    0.0, 1e-6, 0.1, 0.2, 0.5, 0.8, 0.85, 0.9, 0.95, 1.0, 1.05, 1.1, 1.15, 1.2,
    2.0, 5.0, 1e1, 1e2, 1e3, 1e4, 1e5, f64::INFINITY,
];

/// Format `value` in C-style scientific notation (`1.000000e-09`), with a signed
/// exponent of at least two digits.
pub fn sci(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return if value.is_nan() { "nan".into() } else if value > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let formatted = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = formatted.split_once('e') else { return formatted };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

/// Achieved over expected, per target.
fn target_ratios(achieved: &Array1<f64>, expected: ArrayView1<f64>) -> Array1<f64> {
    achieved / &expected
}

/// Tolerance band `[1 − tol, 1 + tol)`.
#[inline]
fn band(tolerance: f64) -> (f64, f64) { (1.0 - tolerance, 1.0 + tolerance) }

#[inline]
fn is_miss(ratio: f64, (lob, hib): (f64, f64)) -> bool { ratio < lob || ratio >= hib }

/// Number of ratios outside `[1 − tol, 1 + tol)`. NaN ratios are never counted.
pub fn count_misses(ratios: ArrayView1<f64>, tolerance: f64) -> usize {
    let band = band(tolerance);
    ratios.iter().filter(|&&r| is_miss(r, band)).count()
}

/// One target outside the tolerance band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetMiss {
    /// Zero-based target index.
    pub index: usize,
    pub ratio: f64,
}

/// Targets whose achieved/expected ratio falls outside the tolerance band.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMisses {
    lob: f64,
    hib: f64,
    misses: Vec<TargetMiss>,
}

impl TargetMisses {
    #[inline] pub fn count(&self) -> usize { self.misses.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.misses.is_empty() }

    #[inline] pub fn misses(&self) -> &[TargetMiss] { &self.misses }

    /// Lower and upper edge of the tolerance band.
    #[inline] pub fn band(&self) -> (f64, f64) { (self.lob, self.hib) }
}

impl fmt::Display for TargetMisses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for miss in &self.misses {
            writeln!(f, "  ::::TARGET{:03}:ACT/EXP,lob,hib=  {:.6}  {:.6}  {:.6}",
                miss.index + 1, miss.ratio, self.lob, self.hib)?;
        }
        Ok(())
    }
}

/// Find the targets missed by the area `weights`.
pub fn target_misses(weights: ArrayView1<f64>, matrix: &TargetMatrix, tolerance: f64) -> TargetMisses {
    let ratios = target_ratios(&matrix.achieved(weights), matrix.targets());
    let (lob, hib) = band(tolerance);
    let misses = ratios.iter().enumerate()
        .filter(|&(_, &ratio)| is_miss(ratio, (lob, hib)))
        .map(|(index, &ratio)| TargetMiss { index, ratio })
        .collect();
    TargetMisses { lob, hib, misses }
}

/// Binned distribution of ratios, with half-open `[lo, hi)` bins.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioHistogram {
    title: String,
    delta: Option<f64>,
    edges: Vec<f64>,
    counts: Vec<usize>,
    total: usize,
}

impl RatioHistogram {
    /// Bin `values` into consecutive edges. Edges are sorted and deduplicated first;
    /// values outside every bin (including NaN) are left out of the counts but still
    /// contribute to the total.
    pub fn new(title: impl Into<String>, edges: &[f64], values: ArrayView1<f64>, delta: Option<f64>) -> Self {
        let mut edges = edges.to_vec();
        edges.sort_by(f64::total_cmp);
        edges.dedup();

        let mut counts = vec![0; edges.len().saturating_sub(1)];
        for &value in values {
            // first edge strictly greater than the value closes its bin
            let upper = edges.partition_point(|&edge| edge <= value);
            if upper > 0 && upper < edges.len() {
                counts[upper - 1] += 1;
            }
        }

        Self { title: title.into(), delta, edges, counts, total: values.len() }
    }

    #[inline] pub fn total(&self) -> usize { self.total }

    /// `(lo, hi, count)` for every bin, in increasing order.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.edges.windows(2).zip(&self.counts).map(|(w, &n)| (w[0], w[1], n))
    }
}

impl fmt::Display for RatioHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DISTRIBUTION OF {} (n={}):", self.title, self.total)?;
        if let Some(delta) = self.delta {
            writeln!(f, "  with REGULARIZATION_DELTA= {}", sci(delta, 6))?;
        }
        writeln!(f, "{TABLE_HEADER}")?;

        let total = self.total.max(1) as f64;
        let mut cum = 0;
        for (lo, hi, num) in self.bins() {
            cum += num;
            if cum == 0 { continue }
            writeln!(f, ">={lo:13.6}, <{hi:13.6}:  {num:6}   {cum:6}   {:6.2}%   {:6.2}%",
                100.0 * num as f64 / total, 100.0 * cum as f64 / total)?;
            if cum == self.total { break }
        }
        Ok(())
    }
}

/// Target deviations for one weight vector.
#[derive(Debug, Clone)]
pub struct TargetReport {
    /// Root-mean-square of achieved minus expected (scaled) targets.
    pub rmse: f64,
    /// Per-target `(ACT − EXP, ACT/EXP)`, kept only when requested.
    deviations: Option<Vec<(f64, f64)>>,
    histogram: RatioHistogram,
}

impl TargetReport {
    #[inline] pub fn histogram(&self) -> &RatioHistogram { &self.histogram }

    #[inline] pub fn deviations(&self) -> Option<&[(f64, f64)]> { self.deviations.as_deref() }
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (diff, ratio)) in self.deviations.iter().flatten().enumerate() {
            writeln!(f, "TARGET{:03}:ACT-EXP,ACT/EXP= {:>16}, {ratio:.3}", index + 1, sci(*diff, 9))?;
        }
        write!(f, "{}", self.histogram)
    }
}

/// RMSE of the target deviations and the distribution of achieved/expected ratios.
///
/// The ratio bins include the tolerance band edges; `delta` is echoed in the table
/// header when given. With `dump_all`, every target's deviation is listed too.
pub fn target_rmse(
    weights: ArrayView1<f64>,
    matrix: &TargetMatrix,
    tolerance: f64,
    delta: Option<f64>,
    dump_all: bool,
) -> TargetReport {
    let achieved = matrix.achieved(weights);
    let expected = matrix.targets();
    let diff = &achieved - &expected;
    let ratios = target_ratios(&achieved, expected);

    let rmse = diff.mapv(|d| d * d).mean().unwrap_or(0.0).sqrt();

    let deviations = dump_all.then(|| diff.iter().copied().zip(ratios.iter().copied()).collect());

    let (lob, hib) = band(tolerance);
    let mut edges = TARGET_RATIO_EDGES.to_vec();
    edges.extend([lob, hib]);
    let histogram = RatioHistogram::new("TARGET ACT/EXP RATIOS", &edges, ratios.view(), delta);

    TargetReport { rmse, deviations, histogram }
}

/// Distribution of optimized area/national weight ratios.
#[derive(Debug, Clone)]
pub struct WeightRatioReport {
    /// `Σ (ratio − 1)²`, a measure of the distortion introduced by calibration.
    pub ssq_deviation: f64,
    histogram: RatioHistogram,
}

impl WeightRatioReport {
    #[inline] pub fn histogram(&self) -> &RatioHistogram { &self.histogram }
}

impl fmt::Display for WeightRatioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.histogram)?;
        writeln!(f, "SUM OF SQUARED AREA/US WEIGHT RATIO DEVIATIONS= {}", sci(self.ssq_deviation, 6))
    }
}

pub fn weight_ratio_distribution(ratios: ArrayView1<f64>, delta: f64) -> WeightRatioReport {
    WeightRatioReport {
        ssq_deviation: ratios.iter().map(|&r| (r - 1.0) * (r - 1.0)).sum(),
        histogram: RatioHistogram::new("AREA/US WEIGHT RATIO", &WEIGHT_RATIO_EDGES, ratios, Some(delta)),
    }
}
