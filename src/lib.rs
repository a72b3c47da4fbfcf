pub mod attio;
pub mod clay;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod utils;

pub use config::Config;
pub use error::{PipelineError, Result};
