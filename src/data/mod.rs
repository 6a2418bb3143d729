mod forecast;
mod microdata;
mod targets;

pub use forecast::PopulationForecast;
pub use microdata::{Microdata, columns};
pub use targets::{Scope, TargetRow, TargetSpec, UNBOUNDED_AGI};
