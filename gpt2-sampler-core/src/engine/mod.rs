pub mod driver;
pub mod generator;
pub mod sequence;

pub use driver::{run, RunSummary};
