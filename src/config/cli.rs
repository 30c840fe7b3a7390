use crate::domain::model::Visibility;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "devstack")]
#[command(about = "Bootstrap the local environment: repository, container runtime and local run")]
pub struct Cli {
    /// Project root; defaults to the current directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to a TOML configuration file (default: <root>/devstack.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, global = true, help = "Print the stage report as JSON on stdout")]
    pub report_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// 提權後重新執行時要沿用的全域參數；路徑轉為絕對路徑，子行程的工作目錄可能不同
    pub fn forwarded_global_args(&self, root: &Path) -> Vec<String> {
        let absolute = |path: &Path| {
            std::path::absolute(path)
                .unwrap_or_else(|_| path.to_path_buf())
                .display()
                .to_string()
        };

        let mut args = vec!["--root".to_string(), absolute(root)];
        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(absolute(config));
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        if self.log_json {
            args.push("--log-json".to_string());
        }
        args
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Initialize the git repository, commit and push it to a remote
    InitRepo(InitRepoArgs),
    /// Make sure a container runtime is installed
    InstallRuntime(InstallRuntimeArgs),
    /// Build the application image and run it locally
    RunLocal(RunLocalArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InitRepoArgs {
    /// Repository name; defaults to the folder name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, value_enum)]
    pub visibility: Option<Visibility>,

    /// Do not use the GitHub CLI even when it is installed
    #[arg(long)]
    pub no_remote_tool: bool,

    /// Push to this remote instead of (or in addition to) the one created by gh
    #[arg(long)]
    pub remote_url: Option<String>,

    #[arg(long)]
    pub branch: Option<String>,

    /// Commit message for the initial commit
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct InstallRuntimeArgs {
    /// Skip the privilege check and run the installer steps as the current user
    #[arg(long)]
    pub no_elevate: bool,

    /// Set on the re-invoked elevated process so escalation happens only once
    #[arg(long, hide = true)]
    pub elevated: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RunLocalArgs {
    /// Run containers in the background
    #[arg(short, long)]
    pub detach: bool,

    /// Create placeholder model artifacts when they are missing
    #[arg(long)]
    pub with_dummy_artifacts: bool,
}
