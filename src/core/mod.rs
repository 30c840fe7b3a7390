pub mod fallback;
pub mod local_run;
pub mod platform;
pub mod repo_bootstrap;
pub mod resources;
pub mod runtime_installer;

pub use crate::domain::model::{CommandOutput, Creation, Invocation};
pub use crate::domain::ports::{CommandRunner, Downloader};
pub use crate::utils::error::Result;
