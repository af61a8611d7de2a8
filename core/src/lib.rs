pub mod cli;
pub mod config;
pub mod reconcile;
pub mod refs;
pub mod services;
pub mod sweep;
pub mod upload;

pub use refs::ImageRefs;
pub use sweep::{SweepOutcome, SweepReport, Sweeper};
