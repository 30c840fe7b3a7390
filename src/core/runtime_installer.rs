use crate::config::RuntimeConfig;
use crate::core::fallback::{Attempt, FallbackChain, Strategy};
use crate::core::platform::Platform;
use crate::domain::model::{InstallOutcome, InstallReport, Invocation};
use crate::domain::ports::{CommandRunner, Downloader};
use crate::utils::error::{ProvisionError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationMode {
    /// 檢查權限，不足時重新以提權方式執行
    Check,
    /// 已由上層行程提權，不再檢查
    AlreadyElevated,
    /// 使用者明確要求略過
    Skip,
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub runtime: RuntimeConfig,
    pub platform: Platform,
    pub elevation: ElevationMode,
    pub self_exe: PathBuf,
    /// 提權後的子行程需要沿用的全域參數
    pub forwarded_args: Vec<String>,
    pub download_dir: PathBuf,
}

impl InstallOptions {
    pub fn new(runtime: RuntimeConfig, elevation: ElevationMode, self_exe: PathBuf) -> Self {
        Self {
            runtime,
            platform: Platform::current(),
            elevation,
            self_exe,
            forwarded_args: Vec::new(),
            download_dir: std::env::temp_dir(),
        }
    }

    pub fn with_forwarded_args(mut self, args: Vec<String>) -> Self {
        self.forwarded_args = args;
        self
    }

    pub fn installer_path(&self) -> PathBuf {
        self.download_dir.join(self.runtime.installer_file_name())
    }
}

pub struct InstallContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub downloader: &'a dyn Downloader,
    pub options: &'a InstallOptions,
}

async fn runtime_version(runner: &dyn CommandRunner, command: &str) -> String {
    match runner.run(&Invocation::new(command, ["--version"])).await {
        Ok(output) if output.is_success() => output.stdout.trim().to_string(),
        _ => "unknown version".to_string(),
    }
}

/// winget 靜默安裝，成功後等待片刻再重新探測 docker
pub struct PackageManagerInstall;

#[async_trait]
impl<'a> Strategy<InstallContext<'a>, InstallOutcome> for PackageManagerInstall {
    fn name(&self) -> &str {
        "package manager"
    }

    async fn attempt(&self, ctx: &InstallContext<'a>) -> Result<Attempt<InstallOutcome>> {
        let settings = &ctx.options.runtime;
        let tool = settings.package_manager.as_str();
        if !ctx.runner.is_available(tool) {
            return Ok(Attempt::Unavailable(format!("{} not found", tool)));
        }

        tracing::info!("📦 Installing {} with {}", settings.package_id, tool);
        let invocation = Invocation::new(
            tool,
            [
                "install",
                "-e",
                "--id",
                settings.package_id.as_str(),
                "--accept-source-agreements",
                "--accept-package-agreements",
            ],
        );

        let output = match ctx.runner.run(&invocation).await {
            Ok(output) => output,
            Err(e) => return Ok(Attempt::Failed(e.to_string())),
        };
        if !output.is_success() {
            return Ok(Attempt::Failed(output.describe_failure()));
        }

        tokio::time::sleep(Duration::from_secs(settings.post_install_wait_secs)).await;

        if !ctx.runner.is_available(&settings.runtime_command) {
            return Ok(Attempt::Failed(format!(
                "{} reported success but '{}' is still not on PATH; Docker Desktop may need a first manual launch or a reboot",
                tool, settings.runtime_command
            )));
        }

        let version = runtime_version(ctx.runner, &settings.runtime_command).await;
        Ok(Attempt::Succeeded(InstallOutcome::PackageManager {
            tool: tool.to_string(),
            version,
        }))
    }
}

/// 下載官方安裝程式並以提權方式啟動，剩下的由安裝精靈互動完成
pub struct DownloadInstall;

#[async_trait]
impl<'a> Strategy<InstallContext<'a>, InstallOutcome> for DownloadInstall {
    fn name(&self) -> &str {
        "vendor installer"
    }

    async fn attempt(&self, ctx: &InstallContext<'a>) -> Result<Attempt<InstallOutcome>> {
        let url = ctx.options.runtime.installer_url.as_str();
        let installer = ctx.options.installer_path();

        tracing::info!("⬇️ Downloading installer from {}", url);
        match ctx.downloader.download(url, &installer).await {
            Ok(bytes) => tracing::info!("✅ Downloaded {} bytes to {}", bytes, installer.display()),
            Err(e @ ProvisionError::DownloadFailed { .. }) => return Err(e),
            Err(e) => {
                return Err(ProvisionError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let launch = ctx.options.platform.installer_launch(&installer);
        tracing::info!("🚀 Launching installer: {}", launch.display());
        match ctx.runner.run(&launch).await {
            Ok(output) if output.is_success() => {
                Ok(Attempt::Succeeded(InstallOutcome::InstallerLaunched { installer }))
            }
            Ok(output) => Err(ProvisionError::InstallerLaunchFailed {
                reason: output.describe_failure(),
            }),
            Err(e) => Err(ProvisionError::InstallerLaunchFailed {
                reason: e.to_string(),
            }),
        }
    }
}

pub struct RuntimeInstaller<R: CommandRunner, D: Downloader> {
    runner: R,
    downloader: D,
    options: InstallOptions,
}

impl<R: CommandRunner, D: Downloader> RuntimeInstaller<R, D> {
    pub fn new(runner: R, downloader: D, options: InstallOptions) -> Self {
        Self {
            runner,
            downloader,
            options,
        }
    }

    pub async fn run(&self) -> Result<InstallReport> {
        let started_at = Utc::now();
        let settings = &self.options.runtime;

        if let Some(exit_code) = self.escalate_if_needed().await {
            return Ok(InstallReport {
                outcome: InstallOutcome::Escalated { exit_code },
                warnings: Vec::new(),
                subsystem_notes: Vec::new(),
                started_at,
                finished_at: Utc::now(),
            });
        }

        if self.runner.is_available(&settings.runtime_command) {
            let version = runtime_version(&self.runner, &settings.runtime_command).await;
            tracing::info!("✅ {} is already installed: {}", settings.runtime_command, version);
            return Ok(InstallReport {
                outcome: InstallOutcome::AlreadyInstalled { version },
                warnings: Vec::new(),
                subsystem_notes: Vec::new(),
                started_at,
                finished_at: Utc::now(),
            });
        }

        tracing::info!("🔍 {} not found, starting installation", settings.runtime_command);
        let context = InstallContext {
            runner: &self.runner,
            downloader: &self.downloader,
            options: &self.options,
        };
        let chain = FallbackChain::new("install")
            .then(PackageManagerInstall)
            .then(DownloadInstall);
        let result = chain.run(&context).await?;

        let warnings = result.failure_reasons();
        let outcome = match result.winner {
            Some((_, outcome)) => outcome,
            None => {
                return Err(ProvisionError::InstallerLaunchFailed {
                    reason: warnings.join("; "),
                })
            }
        };

        let subsystem_notes = self.subsystem_guidance().await;

        Ok(InstallReport {
            outcome,
            warnings,
            subsystem_notes,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// 單次提權：回傳 Some(退出碼) 表示已交給提權後的行程
    async fn escalate_if_needed(&self) -> Option<i32> {
        match self.options.elevation {
            ElevationMode::Skip => {
                tracing::debug!("Privilege check skipped");
                return None;
            }
            ElevationMode::AlreadyElevated => return None,
            ElevationMode::Check => {}
        }

        let platform = self.options.platform;
        let elevated = match self.runner.run(&platform.elevation_probe()).await {
            Ok(output) => output.is_success() && platform.is_elevated(&output.stdout),
            Err(_) => false,
        };
        if elevated {
            tracing::debug!("Already running with elevated privileges");
            return None;
        }

        let reinvoke = platform.elevated_reinvocation(&self.options.self_exe, &self.options.forwarded_args);
        tracing::info!("🔐 Administrator rights required, re-running: {}", reinvoke.display());
        match self.runner.run(&reinvoke).await {
            Ok(output) => Some(output.code.unwrap_or(1)),
            Err(e) => {
                tracing::warn!("⚠️ Could not re-run elevated ({}), continuing as current user", e);
                None
            }
        }
    }

    /// WSL 檢查失敗只會降級為提示訊息
    async fn subsystem_guidance(&self) -> Vec<String> {
        let wsl = self.options.runtime.subsystem_command.as_str();
        let mut notes = Vec::new();

        if !self.runner.is_available(wsl) {
            notes.push(format!(
                "'{}' not found. Docker Desktop needs WSL 2: run `wsl --install` from an elevated terminal and reboot.",
                wsl
            ));
            return notes;
        }

        match self.runner.run(&Invocation::new(wsl, ["-l", "-v"])).await {
            Ok(output) if output.is_success() => {
                // wsl.exe 以 UTF-16 輸出
                let listing = output.stdout.replace('\0', "");
                notes.push(format!("Installed WSL distributions:\n{}", listing.trim_end()));
            }
            Ok(output) => notes.push(format!(
                "Could not list WSL distributions ({}).",
                output.describe_failure()
            )),
            Err(e) => notes.push(format!("Could not list WSL distributions ({}).", e)),
        }
        notes.push(
            "Make sure the WSL 2 backend is enabled in Docker Desktop (Settings > General > Use the WSL 2 based engine)."
                .to_string(),
        );
        notes
    }
}
