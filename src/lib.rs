//! Scrape an index's constituents, pull each one's financial statement
//! table, and clean the result into historical and current datasets.

pub mod batch;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod process;
pub mod write;

pub use config::{Config, CurrentColumn, FailurePolicy};
pub use error::PipelineError;
pub use pipeline::{RunOutput, Scraper};
