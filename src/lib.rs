pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::samplesheet::SampleSheetProvider;
pub use adapters::storage::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::PlannerConfig;
pub use core::planner::{PlanEngine, RunArtifacts, RunSettings};
pub use utils::error::{PlanError, Result};
