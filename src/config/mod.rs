#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{Cli, Command, InitRepoArgs, InstallRuntimeArgs, RunLocalArgs};
pub use toml_config::{
    LocalRunConfig, ProvisionConfig, RepositoryConfig, RuntimeConfig, DEFAULT_CONFIG_FILE,
};
