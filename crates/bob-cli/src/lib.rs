pub mod app;
pub mod cli;
pub mod logging;

pub use app::{run, run_with};
pub use logging::Logging;
