pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;
pub use config::ProvisionConfig;

pub use adapters::{HttpDownloader, SystemRunner};
pub use core::{
    fallback::FallbackChain,
    local_run::{LocalRunner, RunOptions},
    platform::Platform,
    repo_bootstrap::{BootstrapOptions, RepoBootstrapper},
    runtime_installer::{ElevationMode, InstallOptions, RuntimeInstaller},
};
pub use utils::error::{ProvisionError, Result};
