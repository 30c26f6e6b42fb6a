pub mod config;
pub mod error;
pub mod metrics;
pub mod plate_detection;
pub mod utils;

pub use error::{PlateError, Result};
