mod apportionment;
mod code;

pub use apportionment::Seats;
pub use code::AreaCode;
