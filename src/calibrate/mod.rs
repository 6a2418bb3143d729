mod calibrator;
mod matrix;
mod objective;
mod solver;
mod sparse;

pub mod diagnostics;

pub use calibrator::{Calibration, WeightCalibrator};
pub use matrix::TargetMatrix;
pub use objective::RegularizedObjective;
pub use solver::{Objective, ProjectedLbfgs, SolverConfig, SolverResult, Termination};
pub use sparse::CsrMatrix;
