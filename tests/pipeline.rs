// Integration tests for creating an area weights file from input files on disk.

use std::{fs::{self, File}, io::Read, path::Path};

use areaweights::{AreaCode, Config, RunOptions, config::HorizonConfig, create_area_weights};
use flate2::read::GzDecoder;
use tempfile::TempDir;

const MICRODATA: &str = "\
s006,XTOT,MARS,data_source,c00100,subset
1,1,1,1,10,1
1,1,2,1,20,1
1,1,1,0,30,0
1,1,2,0,40,0
1,1,1,0,50,0
";

const TARGETS: &str = "\
varname,count,scope,agilo,agihi,fstatus,target
XTOT,0,0,-9e99,9e99,0,5
subset,0,0,-9e99,9e99,0,3
";

fn setup(targets: &str) -> (TempDir, RunOptions) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("targets")).unwrap();
    fs::write(root.join("targets").join("zz_targets.csv"), targets).unwrap();
    fs::write(root.join("tmd.csv"), MICRODATA).unwrap();
    fs::write(root.join("pop.json"), r#"{"2021": 100.0, "2022": 110.0}"#).unwrap();

    let options = RunOptions {
        targets_dir: root.join("targets"),
        weights_dir: root.join("weights"),
        microdata: root.join("tmd.csv"),
        forecast: root.join("pop.json"),
        write_log: true,
        ..RunOptions::default()
    };
    (dir, options)
}

fn config() -> Config {
    Config {
        horizon: HorizonConfig { first_year: 2021, last_year: 2022, weight_file_scale: 100.0 },
        ..Config::default()
    }
}

fn read_gz(path: &Path) -> String {
    let mut text = String::new();
    GzDecoder::new(File::open(path).unwrap()).read_to_string(&mut text).unwrap();
    text
}

#[test]
fn writes_weights_file_and_log() {
    let (_dir, options) = setup(TARGETS);
    let area = AreaCode::parse("zz").unwrap();
    let result = create_area_weights(&area, &options, &config()).unwrap();

    assert_eq!(result.calibration.calibration.misses, 0);
    let path = result.weights_file.unwrap();
    assert_eq!(path, options.weights_dir.join("zz_tmd_weights.csv.gz"));
    assert_eq!(read_gz(&path), "WT2021,WT2022\n150,165\n150,165\n67,73\n67,73\n67,73\n");

    let log = fs::read_to_string(options.weights_dir.join("zz.log")).unwrap();
    assert!(log.starts_with("CREATING WEIGHTS FILE FOR AREA zz ...\n"));
    assert!(log.contains("USING zz_targets.csv FILE WITH 2 TARGETS\n"));
    assert!(log.contains("AREA-OPTIMIZED_TARGET_MISSES= 0\n"));
}

#[test]
fn calculations_only_mode_writes_no_weights() {
    let (_dir, mut options) = setup(TARGETS);
    options.write_file = false;
    let area = AreaCode::parse("zz").unwrap();

    // stale outputs from an earlier run are removed
    fs::create_dir_all(&options.weights_dir).unwrap();
    let stale = options.weights_dir.join("zz_tmd_weights.csv.gz");
    fs::write(&stale, "old").unwrap();

    let result = create_area_weights(&area, &options, &config()).unwrap();
    assert!(result.yearly.is_none());
    assert!(!stale.exists());

    let log = fs::read_to_string(options.weights_dir.join("zz.log")).unwrap();
    assert!(log.starts_with("DOING JUST WEIGHTS FILE CALCS FOR AREA zz ...\n"));
}

#[test]
fn agi_cache_is_written_and_reused() {
    let (dir, mut options) = setup(TARGETS);
    let cache = dir.path().join("cache_agi.csv");
    options.write_file = false;
    options.write_agi_cache = Some(cache.clone());
    let area = AreaCode::parse("zz").unwrap();
    create_area_weights(&area, &options, &config()).unwrap();
    assert_eq!(areaweights::io::read_agi_cache(&cache).unwrap().to_vec(), vec![10.0, 20.0, 30.0, 40.0, 50.0]);

    options.write_agi_cache = None;
    options.agi_cache = Some(cache);
    let result = create_area_weights(&area, &options, &config()).unwrap();
    assert_eq!(result.calibration.calibration.misses, 0);
}

#[test]
fn invalid_target_codes_abort_without_weights() {
    let (_dir, options) = setup("\
varname,count,scope,agilo,agihi,fstatus,target
XTOT,0,0,-9e99,9e99,0,5
subset,0,3,-9e99,9e99,0,3
");
    let area = AreaCode::parse("zz").unwrap();
    let err = create_area_weights(&area, &options, &config()).unwrap_err();
    assert_eq!(err.to_string(), "scope value 3 not in [0,2] range on zz:L3");
    assert!(!options.weights_dir.join("zz_tmd_weights.csv.gz").exists());
}

#[test]
fn population_row_must_come_first() {
    let (_dir, options) = setup("\
varname,count,scope,agilo,agihi,fstatus,target
subset,0,0,-9e99,9e99,0,3
XTOT,0,0,-9e99,9e99,0,5
");
    let area = AreaCode::parse("zz").unwrap();
    let err = create_area_weights(&area, &options, &config()).unwrap_err();
    assert_eq!(err.to_string(), "zz:L2 does not contain the area population target");
}

#[test]
fn missing_target_file_is_a_user_error() {
    let (_dir, options) = setup(TARGETS);
    let area = AreaCode::parse("yy").unwrap();
    let err = create_area_weights(&area, &options, &config()).unwrap_err();
    assert!(err.to_string().starts_with("yy_targets.csv file not in "));
}

#[test]
fn forecast_gap_is_an_error() {
    let (_dir, options) = setup(TARGETS);
    let area = AreaCode::parse("zz").unwrap();
    let config = Config {
        horizon: HorizonConfig { first_year: 2021, last_year: 2024, weight_file_scale: 100.0 },
        ..Config::default()
    };
    assert!(create_area_weights(&area, &options, &config).is_err());
}
