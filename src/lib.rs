#![doc = "Area weight calibration for national tax microdata"]
mod common;

pub mod area;
pub mod calibrate;
pub mod config;
pub mod data;
pub mod extrapolate;
pub mod io;
pub mod pipeline;

#[doc(inline)]
pub use area::AreaCode;

#[doc(inline)]
pub use calibrate::{Calibration, TargetMatrix, WeightCalibrator};

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use extrapolate::YearlyWeights;

#[doc(inline)]
pub use pipeline::{RunOptions, calibrate_area, create_area_weights};
