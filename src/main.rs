use anyhow::Context;
use clap::Parser;
use devstack_bootstrap::config::{
    Cli, Command, InitRepoArgs, InstallRuntimeArgs, ProvisionConfig, RunLocalArgs,
    DEFAULT_CONFIG_FILE,
};
use devstack_bootstrap::domain::model::{
    BootstrapReport, InstallOutcome, InstallReport, RemoteOutcome, RunReport, RunStrategy,
};
use devstack_bootstrap::utils::logger;
use devstack_bootstrap::{
    BootstrapOptions, ElevationMode, HttpDownloader, InstallOptions, LocalRunner, ProvisionError,
    RepoBootstrapper, RunOptions, RuntimeInstaller, SystemRunner,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, cli.log_json);

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    tracing::debug!("Project root: {}", root.display());

    let mut config = match load_config(&cli, &root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 套用命令列覆蓋設定
    apply_overrides(&mut config, &cli.command);

    // 只檢查此子命令會用到的設定區段
    let validation = match &cli.command {
        Command::InitRepo(_) => config.validate_repository(),
        Command::InstallRuntime(_) => config.validate_runtime(),
        Command::RunLocal(_) => config.validate_local_run(),
    };
    if let Err(e) = validation {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let exit_code = match &cli.command {
        Command::InitRepo(_) => {
            let options = BootstrapOptions::from_config(
                root.clone(),
                &config.repository,
                &config.local_run.models_dir,
            );
            let bootstrapper = RepoBootstrapper::new(SystemRunner::new(), options);
            match bootstrapper.run().await {
                Ok(report) => {
                    emit(&report, cli.report_json, print_bootstrap_summary);
                    0
                }
                Err(e) => report_failure(&e),
            }
        }
        Command::InstallRuntime(args) => {
            let elevation = elevation_mode(args);
            let self_exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("devstack"));
            let downloader = match HttpDownloader::new(Duration::from_secs(
                config.runtime.download_timeout_secs,
            )) {
                Ok(downloader) => downloader,
                Err(e) => std::process::exit(report_failure(&e)),
            };
            let options = InstallOptions::new(config.runtime.clone(), elevation, self_exe)
                .with_forwarded_args(cli.forwarded_global_args(&root));
            let installer = RuntimeInstaller::new(SystemRunner::new(), downloader, options);
            match installer.run().await {
                Ok(report) => {
                    emit(&report, cli.report_json, print_install_summary);
                    report.exit_code()
                }
                Err(e) => report_failure(&e),
            }
        }
        Command::RunLocal(args) => {
            let options = RunOptions::new(
                root.clone(),
                config.local_run.clone(),
                args.detach,
                args.with_dummy_artifacts,
            );
            let runner = LocalRunner::new(SystemRunner::new(), options);
            match runner.run().await {
                Ok(report) => {
                    emit(&report, cli.report_json, print_run_summary);
                    0
                }
                Err(e) => report_failure(&e),
            }
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn load_config(cli: &Cli, root: &Path) -> anyhow::Result<ProvisionConfig> {
    match &cli.config {
        Some(path) => ProvisionConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display())),
        None => {
            let default_path = root.join(DEFAULT_CONFIG_FILE);
            ProvisionConfig::load_or_default(&default_path)
                .with_context(|| format!("Failed to load config file '{}'", default_path.display()))
        }
    }
}

fn apply_overrides(config: &mut ProvisionConfig, command: &Command) {
    match command {
        Command::InitRepo(InitRepoArgs {
            name,
            visibility,
            no_remote_tool,
            remote_url,
            branch,
            message,
        }) => {
            let repo = &mut config.repository;
            if let Some(name) = name {
                repo.name = Some(name.clone());
            }
            if let Some(visibility) = visibility {
                repo.visibility = *visibility;
            }
            if *no_remote_tool {
                repo.prefer_remote_tool = false;
                tracing::info!("🔧 GitHub CLI disabled for this run");
            }
            if let Some(url) = remote_url {
                repo.remote_url = Some(url.clone());
            }
            if let Some(branch) = branch {
                repo.branch = branch.clone();
            }
            if let Some(message) = message {
                repo.commit_message = message.clone();
            }
        }
        Command::InstallRuntime(_) | Command::RunLocal(RunLocalArgs { .. }) => {}
    }
}

fn elevation_mode(args: &InstallRuntimeArgs) -> ElevationMode {
    if args.elevated {
        ElevationMode::AlreadyElevated
    } else if args.no_elevate {
        ElevationMode::Skip
    } else {
        ElevationMode::Check
    }
}

fn emit<T: Serialize>(report: &T, as_json: bool, summary: fn(&T)) {
    if as_json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("❌ Could not serialize report: {}", e),
        }
    } else {
        summary(report);
    }
}

fn report_failure(e: &ProvisionError) -> i32 {
    tracing::error!(
        "❌ Provisioning failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    e.exit_code()
}

fn print_bootstrap_summary(report: &BootstrapReport) {
    println!("📋 Repository: {}", report.repository_name);
    println!("  Root: {}", report.root.display());
    println!("  Initialized now: {}", report.initialized);
    println!("  Committed: {}", report.committed);

    match &report.remote {
        RemoteOutcome::Created { tool } => println!("✅ Remote created and pushed with {}", tool),
        RemoteOutcome::Pushed { url } => println!("✅ Pushed to {}", url),
        RemoteOutcome::Manual { reason } => println!("ℹ️ Remote not created automatically ({})", reason),
    }

    if !report.manual_instructions.is_empty() {
        println!();
        println!("Run these commands to push manually:");
        for command in &report.manual_instructions {
            println!("  {}", command);
        }
    }
}

fn print_install_summary(report: &InstallReport) {
    match &report.outcome {
        InstallOutcome::Escalated { exit_code } => {
            println!("🔐 Continued in an elevated process (exit code {})", exit_code)
        }
        InstallOutcome::AlreadyInstalled { version } => println!("✅ Docker already installed: {}", version),
        InstallOutcome::PackageManager { tool, version } => {
            println!("✅ Installed with {}: {}", tool, version)
        }
        InstallOutcome::InstallerLaunched { installer } => {
            println!("🚀 Installer started: {}", installer.display());
            println!("   Finish the setup wizard, then start Docker Desktop once.");
        }
    }

    for warning in &report.warnings {
        println!("⚠️ {}", warning);
    }
    for note in &report.subsystem_notes {
        println!("ℹ️ {}", note);
    }
}

fn print_run_summary(report: &RunReport) {
    println!("🐳 Image: {}", report.image);
    match &report.strategy {
        RunStrategy::Compose { invocation } => println!("  Started with: {}", invocation),
        RunStrategy::Direct { image } => println!("  Started with: docker run {}", image),
    }
    if !report.dummy_artifacts.is_empty() {
        println!("  Placeholder artifacts:");
        for path in &report.dummy_artifacts {
            println!("    {}", path.display());
        }
    }
    if !report.run_succeeded {
        println!("⚠️ The application did not start cleanly; check the output above");
    }
    for url in &report.opened_endpoints {
        println!("🌐 {}", url);
    }
}
