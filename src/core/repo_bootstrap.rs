use crate::config::RepositoryConfig;
use crate::core::fallback::{Attempt, FallbackChain, Strategy};
use crate::core::resources::{self, DEFAULT_GITIGNORE};
use crate::domain::model::{BootstrapReport, Creation, Invocation, RemoteOutcome, Visibility};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{ProvisionError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub root: PathBuf,
    pub repository_name: Option<String>,
    pub visibility: Visibility,
    /// false 時完全不使用 gh，即使已安裝
    pub prefer_remote_tool: bool,
    pub remote_url: Option<String>,
    pub branch: String,
    pub commit_message: String,
    pub vcs_tool: String,
    pub remote_tool: String,
    pub manual_url_template: String,
    pub models_dir: String,
}

impl BootstrapOptions {
    pub fn from_config(root: impl Into<PathBuf>, config: &RepositoryConfig, models_dir: &str) -> Self {
        Self {
            root: root.into(),
            repository_name: config.name.clone(),
            visibility: config.visibility,
            prefer_remote_tool: config.prefer_remote_tool,
            remote_url: config.remote_url.clone(),
            branch: config.branch.clone(),
            commit_message: config.commit_message.clone(),
            vcs_tool: config.vcs_tool.clone(),
            remote_tool: config.remote_tool.clone(),
            manual_url_template: config.manual_url_template.clone(),
            models_dir: models_dir.to_string(),
        }
    }
}

/// 遠端建立策略共用的上下文
pub struct RemoteContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub options: &'a BootstrapOptions,
    pub repository_name: &'a str,
}

/// `gh repo create --source . --remote origin --push`
pub struct GhRepoCreate;

#[async_trait]
impl<'a> Strategy<RemoteContext<'a>, String> for GhRepoCreate {
    fn name(&self) -> &str {
        "gh repo create"
    }

    async fn attempt(&self, ctx: &RemoteContext<'a>) -> Result<Attempt<String>> {
        let tool = &ctx.options.remote_tool;
        if !ctx.options.prefer_remote_tool {
            return Ok(Attempt::Unavailable(format!("{} disabled by request", tool)));
        }
        if !ctx.runner.is_available(tool) {
            return Ok(Attempt::Unavailable(format!("{} not found on PATH", tool)));
        }

        let invocation = Invocation::new(
            tool,
            [
                "repo".to_string(),
                "create".to_string(),
                ctx.repository_name.to_string(),
                ctx.options.visibility.gh_flag().to_string(),
                "--source".to_string(),
                ctx.options.root.display().to_string(),
                "--remote".to_string(),
                "origin".to_string(),
                "--push".to_string(),
            ],
        )
        .in_dir(&ctx.options.root);

        tracing::info!("🌐 Creating {} remote repository '{}' with {}", ctx.options.visibility, ctx.repository_name, tool);
        match ctx.runner.run(&invocation).await {
            Ok(output) if output.is_success() => Ok(Attempt::Succeeded(tool.clone())),
            Ok(output) => Ok(Attempt::Failed(output.describe_failure())),
            Err(e) => Ok(Attempt::Failed(e.to_string())),
        }
    }
}

/// 產生可直接複製貼上的手動推送指令
pub fn manual_instructions(vcs_tool: &str, remote_url: &str, branch: &str) -> Vec<String> {
    vec![
        format!("{} remote add origin {}", vcs_tool, remote_url),
        format!("{} branch -M {}", vcs_tool, branch),
        format!("{} push -u origin {}", vcs_tool, branch),
    ]
}

pub struct RepoBootstrapper<R: CommandRunner> {
    runner: R,
    options: BootstrapOptions,
}

impl<R: CommandRunner> RepoBootstrapper<R> {
    pub fn new(runner: R, options: BootstrapOptions) -> Self {
        Self { runner, options }
    }

    pub async fn run(&self) -> Result<BootstrapReport> {
        let started_at = Utc::now();
        let opts = &self.options;

        // git 是唯一沒有後備方案的依賴
        if !self.runner.is_available(&opts.vcs_tool) {
            return Err(ProvisionError::MissingDependency {
                tool: opts.vcs_tool.clone(),
            });
        }

        let repository_name = self.repository_name()?;
        tracing::info!("📦 Bootstrapping repository '{}' in {}", repository_name, opts.root.display());

        let placeholder = self.ensure_models_placeholder()?;
        let initialized = self.ensure_repository().await?;
        let ignore_file = resources::ensure_file(&opts.root.join(".gitignore"), DEFAULT_GITIGNORE)?;
        let committed = self.commit_if_dirty().await;

        let remote_chain = {
            let context = RemoteContext {
                runner: &self.runner,
                options: opts,
                repository_name: &repository_name,
            };
            let chain = FallbackChain::new("remote").then(GhRepoCreate);
            let outcome = chain.run(&context).await?;
            outcome
        };

        // 使用者提供的 URL 一旦設定，由它的推送結果決定最終狀態
        let explicit_push = match &opts.remote_url {
            Some(url) => Some(self.push_explicit_remote(url).await),
            None => None,
        };

        let remote = match (&explicit_push, &remote_chain.winner, &opts.remote_url) {
            (Some(Ok(())), _, Some(url)) => RemoteOutcome::Pushed { url: url.clone() },
            (Some(Err(reason)), _, _) => RemoteOutcome::Manual {
                reason: reason.clone(),
            },
            (_, Some((_, tool)), _) => RemoteOutcome::Created { tool: tool.clone() },
            _ => RemoteOutcome::Manual {
                reason: remote_chain.failure_reasons().join("; "),
            },
        };

        // gh 沒有成功或明確 URL 推送失敗時印出手動指令；這是降級而非失敗
        let explicit_failed = matches!(explicit_push, Some(Err(_)));
        let manual = if remote_chain.succeeded() && !explicit_failed {
            Vec::new()
        } else {
            let url = opts
                .remote_url
                .clone()
                .unwrap_or_else(|| opts.manual_url_template.replace("{name}", &repository_name));
            tracing::info!("ℹ️ Automated remote setup incomplete; manual steps follow");
            manual_instructions(&opts.vcs_tool, &url, &opts.branch)
        };

        Ok(BootstrapReport {
            repository_name,
            root: opts.root.clone(),
            initialized,
            ignore_file,
            placeholder,
            committed,
            remote,
            manual_instructions: manual,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn repository_name(&self) -> Result<String> {
        if let Some(name) = &self.options.repository_name {
            return Ok(name.clone());
        }
        folder_name(&self.options.root).ok_or_else(|| ProvisionError::MissingConfigError {
            field: "repository.name".to_string(),
        })
    }

    /// 讓原本會被忽略的 models 目錄仍可被追蹤
    fn ensure_models_placeholder(&self) -> Result<Option<Creation>> {
        let models = self.options.root.join(&self.options.models_dir);
        if !models.is_dir() {
            tracing::debug!("No {} directory, skipping placeholder", models.display());
            return Ok(None);
        }
        resources::ensure_file(&models.join(".gitkeep"), "").map(Some)
    }

    /// 回傳是否執行了 `git init`；已是儲存庫根目錄時不重新初始化
    async fn ensure_repository(&self) -> Result<bool> {
        if self.options.root.join(".git").exists() {
            tracing::info!("📁 Existing git repository found, skipping init");
            return Ok(false);
        }

        let output = self.git(["init"]).await?;
        if !output.is_success() {
            return Err(ProvisionError::ToolInvocationFailure {
                tool: format!("{} init", self.options.vcs_tool),
                code: output.code,
                stderr: output.stderr,
            });
        }
        tracing::info!("✅ Initialized git repository");
        Ok(true)
    }

    /// 只有在 status 有輸出時才 commit，絕不建立空 commit
    async fn commit_if_dirty(&self) -> bool {
        match self.git(["add", "-A"]).await {
            Ok(output) if output.is_success() => {}
            Ok(output) => {
                tracing::warn!("⚠️ git add failed: {}", output.describe_failure());
                return false;
            }
            Err(e) => {
                tracing::warn!("⚠️ git add failed: {}", e);
                return false;
            }
        }

        let status = match self.git(["status", "--porcelain"]).await {
            Ok(output) if output.is_success() => output,
            Ok(output) => {
                tracing::warn!("⚠️ git status failed: {}", output.describe_failure());
                return false;
            }
            Err(e) => {
                tracing::warn!("⚠️ git status failed: {}", e);
                return false;
            }
        };

        if status.stdout.trim().is_empty() {
            tracing::info!("✨ Nothing to commit, working tree clean");
            return false;
        }

        let message = self.options.commit_message.clone();
        match self.git(["commit".to_string(), "-m".to_string(), message]).await {
            Ok(output) if output.is_success() => {
                tracing::info!("✅ Created commit");
                true
            }
            Ok(output) => {
                tracing::warn!("⚠️ git commit failed: {}", output.describe_failure());
                false
            }
            Err(e) => {
                tracing::warn!("⚠️ git commit failed: {}", e);
                false
            }
        }
    }

    /// 使用者提供的 URL 一律覆蓋 origin，無論 gh 是否成功；失敗時回傳原因
    async fn push_explicit_remote(&self, url: &str) -> std::result::Result<(), String> {
        let branch = self.options.branch.as_str();

        // origin 可能不存在，移除失敗可忽略
        let _ = self.git(["remote", "remove", "origin"]).await;

        let steps: [Vec<&str>; 3] = [
            vec!["remote", "add", "origin", url],
            vec!["branch", "-M", branch],
            vec!["push", "-u", "origin", branch],
        ];

        for args in steps {
            let label = format!("{} {}", self.options.vcs_tool, args.join(" "));
            let failure = match self.git(args).await {
                Ok(output) if output.is_success() => continue,
                Ok(output) => output.describe_failure(),
                Err(e) => e.to_string(),
            };
            tracing::warn!("⚠️ {} failed: {}", label, failure);
            return Err(format!("{} failed: {}", label, failure));
        }

        tracing::info!("🚀 Pushed {} to {}", branch, url);
        Ok(())
    }

    async fn git<I, S>(&self, args: I) -> Result<crate::domain::model::CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = Invocation::new(&self.options.vcs_tool, args).in_dir(&self.options.root);
        self.runner.run(&invocation).await
    }
}

fn folder_name(root: &Path) -> Option<String> {
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}
