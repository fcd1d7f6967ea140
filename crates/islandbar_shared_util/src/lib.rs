pub mod signal;
pub mod wrappers;

pub use signal::*;
pub use wrappers::*;
