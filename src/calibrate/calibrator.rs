use std::io::Write;
use std::time::Instant;

use anyhow::{Result, ensure};
use ndarray::{Array1, ArrayView1};

use crate::config::CalibrationConfig;
use super::{
    diagnostics::{sci, target_misses, target_rmse, weight_ratio_distribution},
    matrix::TargetMatrix,
    objective::RegularizedObjective,
    solver::{ProjectedLbfgs, SolverResult},
    sparse::CsrMatrix,
};

/// Outcome of the regularization loop for one area.
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Optimized area/national weight ratios, one per record.
    pub multipliers: Array1<f64>,
    /// Area weights: multipliers times the area-scaled national weights.
    pub area_weights: Array1<f64>,
    /// Regularization strength of the final solve.
    pub delta: f64,
    /// Number of regularization loops run.
    pub loops: usize,
    /// Targets missed by the final weights.
    pub misses: usize,
    /// Solver report for the final solve.
    pub solver: SolverResult,
}

/// Solves for per-record weight multipliers under a shrinking regularization schedule.
///
/// Owns the weight-scaled design matrix; each solve builds its own objective, so
/// separate calibrators never share state.
#[derive(Debug, Clone)]
pub struct WeightCalibrator<'a> {
    matrix: &'a TargetMatrix,
    scaled_weights: Array1<f64>,
    design: CsrMatrix,
    config: CalibrationConfig,
}

impl<'a> WeightCalibrator<'a> {
    /// Prepare a calibrator for `matrix` starting from the national weights.
    pub fn new(matrix: &'a TargetMatrix, national_weights: ArrayView1<f64>, config: CalibrationConfig) -> Result<Self> {
        ensure!(national_weights.len() == matrix.num_records(),
            "[calibrate::calibrator] {} weights for {} records", national_weights.len(), matrix.num_records());
        config.validate()?;

        let scaled_weights = matrix.area_scaled_weights(national_weights);
        let design = matrix.weighted(scaled_weights.view());
        Ok(Self { matrix, scaled_weights, design, config })
    }

    /// National weights scaled to the area population.
    #[inline] pub fn scaled_weights(&self) -> ArrayView1<'_, f64> { self.scaled_weights.view() }

    #[inline] pub fn config(&self) -> &CalibrationConfig { &self.config }

    /// Objective for regularization strength `delta`.
    pub fn objective(&self, delta: f64) -> Result<RegularizedObjective<'_>> {
        RegularizedObjective::new(&self.design, self.matrix.targets(), delta)
    }

    /// One bounded solve at `delta`, always starting from the neutral multipliers `x = 1`.
    pub fn solve(&self, delta: f64) -> Result<SolverResult> {
        let objective = self.objective(delta)?;
        let x0 = Array1::ones(self.matrix.num_records());
        Ok(ProjectedLbfgs::new(self.config.solver).minimize(&objective, x0, 0.0))
    }

    /// Run the regularization loop, writing its progress and final diagnostics to `out`.
    ///
    /// The loop stops when every target is hit, when a solve fails to converge, or after
    /// `delta_max_loops` solves. Non-convergence is reported, not returned as an error.
    /// With `timings`, per-loop execution seconds are included in the log.
    pub fn calibrate(&self, out: &mut dyn Write, timings: bool) -> Result<Calibration> {
        let config = &self.config;
        writeln!(out, "OPTIMIZE WEIGHT RATIOS IN A REGULARIZATION LOOP")?;
        writeln!(out, "  where REGULARIZATION DELTA starts at {}", sci(config.delta_init, 6))?;
        writeln!(out, "  and where target_matrix.shape= ({}, {})", self.matrix.num_records(), self.matrix.num_targets())?;

        let decrement = config.delta_decrement();
        let mut delta = config.delta_init;
        let mut loops = 0;
        let (solver, solved_delta, seconds) = loop {
            loops += 1;
            let start = Instant::now();
            let result = self.solve(delta)?;
            let seconds = start.elapsed().as_secs_f64();

            let area_weights = &result.x * &self.scaled_weights;
            let misses = target_misses(area_weights.view(), self.matrix, config.target_ratio_tolerance);

            if timings {
                writeln!(out, "  ::loop,delta,misses,exectime(secs):   {loops}   {}   {}   {seconds:.1}",
                    sci(delta, 6), misses.count())?;
            } else {
                writeln!(out, "  ::loop,delta,misses:   {loops}   {}   {}", sci(delta, 6), misses.count())?;
            }
            tracing::debug!(loops, delta, misses = misses.count(), nit = result.nit, nfev = result.nfev,
                "[calibrate] regularization loop finished");

            if misses.is_empty() || !result.success {
                break (result, delta, seconds);
            }
            write!(out, "{misses}")?;

            if loops >= config.delta_max_loops {
                break (result, delta, seconds);
            }
            delta -= decrement;
            if delta < config.delta_floor { delta = 0.0 }
        };

        if !solver.success {
            tracing::warn!(nit = solver.nit, termination = %solver.termination,
                "[calibrate] solver did not converge; keeping best iterate");
        }

        if timings {
            writeln!(out, ">>> final delta loop exectime= {seconds:.1} secs  iterations={}  success={}",
                solver.nit, solver.success)?;
        } else {
            writeln!(out, ">>> final delta loop iterations={}  success={}", solver.nit, solver.success)?;
        }
        writeln!(out, ">>> message: {}", solver.message())?;
        writeln!(out, ">>> optimized objective function value: {}", sci(solver.fun, 9))?;

        let multipliers = solver.x.clone();
        let area_weights = &multipliers * &self.scaled_weights;
        let misses = target_misses(area_weights.view(), self.matrix, config.target_ratio_tolerance).count();
        writeln!(out, "AREA-OPTIMIZED_TARGET_MISSES= {misses}")?;

        let report = target_rmse(area_weights.view(), self.matrix, config.target_ratio_tolerance,
            Some(solved_delta), config.dump_all_target_deviations);
        write!(out, "{report}")?;
        writeln!(out, "AREA-OPTIMIZED_TARGET_RMSE= {}", sci(report.rmse, 9))?;
        write!(out, "{}", weight_ratio_distribution(multipliers.view(), solved_delta))?;

        tracing::info!(loops, misses, rmse = report.rmse, "[calibrate] calibration finished");

        Ok(Calibration { multipliers, area_weights, delta: solved_delta, loops, misses, solver })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ndarray::array;

    use super::*;
    use crate::calibrate::SolverConfig;
    use crate::data::{Microdata, TargetRow, TargetSpec, columns};

    fn row(varname: &str, target: f64) -> TargetRow {
        TargetRow { varname: varname.into(), count: 0, scope: 0, agilo: -9e99, agihi: 9e99, fstatus: 0, target }
    }

    /// Four unit-weight single-person records; targets: population 4, `v` total 3
    /// where `v` is one on the first two records.
    fn fixture() -> (Microdata, TargetMatrix) {
        let data = Microdata::new(
            Array1::ones(4),
            Array1::zeros(4),
            vec![1; 4],
            vec![0; 4],
            HashMap::from([
                (columns::PERSONS.to_string(), Array1::ones(4)),
                ("v".to_string(), array![1.0, 1.0, 0.0, 0.0]),
            ]),
        ).unwrap();
        let spec = TargetSpec::new("zz", vec![row("XTOT", 4.0), row("v", 3.0)]).unwrap();
        let matrix = TargetMatrix::build(&data, &spec).unwrap();
        (data, matrix)
    }

    #[test]
    fn feasible_targets_are_hit_in_first_loop() {
        let (data, matrix) = fixture();
        let calibrator = WeightCalibrator::new(&matrix, data.weights(), CalibrationConfig::default()).unwrap();
        let mut log = Vec::new();
        let calibration = calibrator.calibrate(&mut log, false).unwrap();

        assert_eq!(calibration.misses, 0);
        assert_eq!(calibration.loops, 1);
        assert_eq!(calibration.delta, 1e-9);
        assert!(calibration.multipliers.iter().all(|&x| x >= 0.0));
        // v records share 3, the others share the remaining 1
        assert!((calibration.area_weights[0] - 1.5).abs() < 1e-3);
        assert!((calibration.area_weights[3] - 0.5).abs() < 1e-3);

        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("  where REGULARIZATION DELTA starts at 1.000000e-09\n"));
        assert!(log.contains("  and where target_matrix.shape= (4, 2)\n"));
        assert!(log.contains("  ::loop,delta,misses:   1   1.000000e-09   0\n"));
        assert!(log.contains("AREA-OPTIMIZED_TARGET_MISSES= 0\n"));
        assert!(log.contains("SUM OF SQUARED AREA/US WEIGHT RATIO DEVIATIONS= "));
    }

    #[test]
    fn non_convergence_stops_the_loop() {
        let (data, matrix) = fixture();
        let config = CalibrationConfig {
            solver: SolverConfig { max_iter: 1, ..SolverConfig::default() },
            ..CalibrationConfig::default()
        };
        let calibrator = WeightCalibrator::new(&matrix, data.weights(), config).unwrap();
        let mut log = Vec::new();
        let calibration = calibrator.calibrate(&mut log, true).unwrap();

        assert!(!calibration.solver.success);
        assert_eq!(calibration.loops, 1);
        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("::loop,delta,misses,exectime(secs):   1   "));
        assert!(log.contains(">>> message: STOP: TOTAL NO. OF ITERATIONS REACHED LIMIT\n"));
    }

    #[test]
    fn fit_error_shrinks_as_delta_decreases() {
        let (data, matrix) = fixture();
        let config = CalibrationConfig {
            solver: SolverConfig { ftol: 1e-15, gtol: 1e-11, ..SolverConfig::default() },
            ..CalibrationConfig::default()
        };
        let calibrator = WeightCalibrator::new(&matrix, data.weights(), config).unwrap();

        let mut previous = f64::INFINITY;
        for delta in [1.0, 0.3, 0.1, 0.01, 0.001, 0.0] {
            let result = calibrator.solve(delta).unwrap();
            let fit = calibrator.objective(delta).unwrap().fit_error(&result.x.view());
            assert!(fit <= previous + 1e-9, "delta {delta}: fit {fit} > {previous}");
            previous = fit;
        }
        assert!(previous < 1e-8);
    }

    #[test]
    fn solves_are_independent_of_earlier_solves() {
        let (data, matrix) = fixture();
        let calibrator = WeightCalibrator::new(&matrix, data.weights(), CalibrationConfig::default()).unwrap();
        let first = calibrator.solve(0.5).unwrap();
        calibrator.solve(0.0).unwrap();
        let again = calibrator.solve(0.5).unwrap();
        assert_eq!(first.x, again.x);
    }

    #[test]
    fn rejects_mismatched_weights() {
        let (_, matrix) = fixture();
        let weights = Array1::ones(3);
        assert!(WeightCalibrator::new(&matrix, weights.view(), CalibrationConfig::default()).is_err());
    }
}
