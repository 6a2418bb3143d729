//! CSV format reading and writing operations.

mod read;
mod write;

pub use read::{read_agi_cache, read_microdata, read_targets};
pub use write::{write_agi_cache, write_weights};
