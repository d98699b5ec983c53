#[cfg(feature = "cli")]
pub mod cli;
pub mod protocol;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use protocol::PlannerConfig;
