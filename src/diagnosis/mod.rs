pub mod mapping;
pub mod ranking;

pub use mapping::*;
pub use ranking::*;
