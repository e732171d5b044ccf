//! CLI command implementations

pub mod provision;
pub mod rotate;
pub mod serve;
pub mod show_config;

pub use provision::ProvisionCommand;
pub use rotate::RotateCommand;
pub use serve::ServeCommand;
pub use show_config::ShowConfigCommand;
