// Integration tests for calibrating area weights on small synthetic microdata:
//   target matrix -> regularization loop -> diagnostics -> extrapolation

use std::collections::HashMap;

use areaweights::{
    Calibration, TargetMatrix, WeightCalibrator, YearlyWeights, calibrate_area,
    config::{CalibrationConfig, HorizonConfig},
    data::{Microdata, PopulationForecast, TargetRow, TargetSpec},
};
use ndarray::{Array1, array};

fn row(varname: &str, target: f64) -> TargetRow {
    TargetRow { varname: varname.into(), count: 0, scope: 0, agilo: -9e99, agihi: 9e99, fstatus: 0, target }
}

/// Five records with national weight 1 and one person each; `subset` is one on the
/// first two records.
fn five_records() -> Microdata {
    Microdata::new(
        Array1::ones(5),
        array![10.0, 20.0, 30.0, 40.0, 50.0],
        vec![1, 2, 1, 2, 1],
        vec![1, 1, 0, 0, 0],
        HashMap::from([
            ("XTOT".to_string(), Array1::ones(5)),
            ("subset".to_string(), array![1.0, 1.0, 0.0, 0.0, 0.0]),
        ]),
    ).unwrap()
}

fn calibrate(data: &Microdata, spec: &TargetSpec) -> Calibration {
    let matrix = TargetMatrix::build(data, spec).unwrap();
    let calibrator = WeightCalibrator::new(&matrix, data.weights(), CalibrationConfig::default()).unwrap();
    calibrator.calibrate(&mut std::io::sink(), false).unwrap()
}

fn assert_targets_hit(weights: &Array1<f64>, expected: &[(Array1<f64>, f64)], tolerance: f64) {
    for (variable, target) in expected {
        let ratio = weights.dot(variable) / target;
        assert!(ratio >= 1.0 - tolerance && ratio < 1.0 + tolerance, "ratio {ratio} for target {target}");
    }
}

#[test]
fn population_and_subset_targets_are_hit() {
    let data = five_records();
    let spec = TargetSpec::new("zz", vec![row("XTOT", 5.0), row("subset", 2.0)]).unwrap();
    let calibration = calibrate(&data, &spec);

    assert_eq!(calibration.misses, 0);
    assert!(calibration.solver.success);
    let tolerance = CalibrationConfig::default().target_ratio_tolerance;
    assert_targets_hit(&calibration.area_weights, &[
        (Array1::ones(5), 5.0),
        (array![1.0, 1.0, 0.0, 0.0, 0.0], 2.0),
    ], tolerance);
    assert!((calibration.area_weights.sum() - 5.0).abs() <= 5.0 * tolerance);
}

#[test]
fn subset_target_above_national_share_moves_weight() {
    let data = five_records();
    let spec = TargetSpec::new("zz", vec![row("XTOT", 5.0), row("subset", 3.0)]).unwrap();
    let calibration = calibrate(&data, &spec);

    assert_eq!(calibration.misses, 0);
    let w = &calibration.area_weights;
    assert!((w.sum() - 5.0).abs() < 5.0 * 5e-4);
    // least distortion: the subset shares 3 evenly, the rest share 2 evenly
    for i in 0..2 { assert!((w[i] - 1.5).abs() < 1e-3, "{w}") }
    for i in 2..5 { assert!((w[i] - 2.0 / 3.0).abs() < 1e-3, "{w}") }
}

#[test]
fn area_scale_follows_population_target() {
    let data = five_records();
    // an area a fifth the size of the nation, with a proportional subset
    let spec = TargetSpec::new("zz", vec![row("XTOT", 1.0), row("subset", 0.4)]).unwrap();

    let mut log = Vec::new();
    let result = calibrate_area(&data, &spec, &CalibrationConfig::default(), &mut log, false).unwrap();
    assert!((result.initial_weight_scale - 0.2).abs() < 1e-15);
    assert_eq!(result.calibration.misses, 0);
    assert!(result.calibration.multipliers.iter().all(|&x| (x - 1.0).abs() < 1e-6));

    let log = String::from_utf8(log).unwrap();
    let labels = [
        "INITIAL WEIGHTS STATISTICS:",
        "sum of national weights = 5.000000e+00",
        "area weights_scale = 2.000000e-01",
        "USING zz_targets.csv FILE WITH 2 TARGETS",
        "US_PROPORTIONALLY_SCALED_TARGET_RMSE= ",
        "target_matrix sparsity ratio = 0.300",
        "OPTIMIZE WEIGHT RATIOS IN A REGULARIZATION LOOP",
        "  ::loop,delta,misses:   1   1.000000e-09   0",
        ">>> final delta loop iterations=",
        ">>> message: ",
        "AREA-OPTIMIZED_TARGET_MISSES= 0",
        "AREA-OPTIMIZED_TARGET_RMSE= ",
        "DISTRIBUTION OF AREA/US WEIGHT RATIO (n=5):",
        "SUM OF SQUARED AREA/US WEIGHT RATIO DEVIATIONS= ",
    ];
    let mut position = 0;
    for label in labels {
        let found = log[position..].find(label).unwrap_or_else(|| panic!("missing {label:?} in\n{log}"));
        position += found + label.len();
    }
}

#[test]
fn infeasible_targets_report_misses_after_every_loop() {
    let data = five_records();
    // the subset cannot exceed the population
    let spec = TargetSpec::new("zz", vec![row("XTOT", 5.0), row("subset", 50.0)]).unwrap();
    let matrix = TargetMatrix::build(&data, &spec).unwrap();
    let config = CalibrationConfig { delta_max_loops: 3, ..CalibrationConfig::default() };
    let calibrator = WeightCalibrator::new(&matrix, data.weights(), config).unwrap();

    let mut log = Vec::new();
    let calibration = calibrator.calibrate(&mut log, false).unwrap();
    assert!(calibration.misses > 0);
    assert!(calibration.multipliers.iter().all(|&x| x >= 0.0));

    let log = String::from_utf8(log).unwrap();
    assert!(calibration.solver.success, "{}", calibration.solver.message());
    assert_eq!(calibration.loops, 3);
    assert_eq!(calibration.delta, 0.0);
    assert!(log.contains("  ::loop,delta,misses:   2   5.000000e-10   "));
    assert!(log.contains("  ::::TARGET002:ACT/EXP,lob,hib=  "));
}

#[test]
fn calibrated_weights_extrapolate_with_growth() {
    let data = five_records();
    let spec = TargetSpec::new("zz", vec![row("XTOT", 5.0), row("subset", 3.0)]).unwrap();
    let calibration = calibrate(&data, &spec);

    let forecast = PopulationForecast::from_iter([(2021, 100.0), (2022, 110.0), (2023, 121.0)]);
    let horizon = HorizonConfig { first_year: 2021, last_year: 2023, weight_file_scale: 100.0 };
    let yearly = YearlyWeights::extrapolate(calibration.area_weights.view(), &forecast, &horizon).unwrap();

    let base = yearly.get(2021).unwrap().to_owned();
    assert_eq!(base, &calibration.area_weights * 100.0);
    for (year, factor) in [(2022, 1.1), (2023, 1.21)] {
        let weights = yearly.get(year).unwrap();
        for (w, b) in weights.iter().zip(base.iter()) {
            assert!((w - b * factor).abs() <= 1e-12 * b * factor);
        }
    }
}
