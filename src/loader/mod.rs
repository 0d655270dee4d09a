//! Source loading: per-group CSV time series and the combined growth
//! workbook, with explicit memoization of parsed files.

pub mod cache;
pub mod environment;
pub mod growth;

pub use environment::EnvironmentLoader;
pub use growth::GrowthLoader;
