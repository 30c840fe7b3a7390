use crate::config::LocalRunConfig;
use crate::core::fallback::{Attempt, FallbackChain, Strategy};
use crate::core::platform::Platform;
use crate::core::resources;
use crate::domain::model::{Creation, Invocation, RunReport, RunStrategy};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{ProvisionError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 以 python 產生佔位模型檔；參數為要寫入的路徑
const DUMMY_ARTIFACT_SCRIPT: &str = "\
import sys, pickle
try:
    from joblib import dump
except ImportError:
    def dump(obj, path):
        with open(path, 'wb') as fh:
            pickle.dump(obj, fh)
for path in sys.argv[1:]:
    dump({'placeholder': True, 'path': path}, path)
";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub settings: LocalRunConfig,
    pub detach: bool,
    pub with_dummy_artifacts: bool,
    pub platform: Platform,
}

impl RunOptions {
    pub fn new(root: impl Into<PathBuf>, settings: LocalRunConfig, detach: bool, with_dummy_artifacts: bool) -> Self {
        Self {
            root: root.into(),
            settings,
            detach,
            with_dummy_artifacts,
            platform: Platform::current(),
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join(&self.settings.models_dir)
    }

    pub fn compose_file(&self) -> PathBuf {
        self.root.join(&self.settings.compose_file)
    }

    pub fn api_docs_url(&self) -> String {
        format!("http://localhost:{}{}", self.settings.api_port, self.settings.docs_path)
    }

    pub fn ui_url(&self) -> String {
        format!("http://localhost:{}", self.settings.ui_port)
    }
}

pub struct ArtifactContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub missing: &'a [PathBuf],
    pub interpreters: &'a [String],
}

/// 透過可用的 python 直譯器寫入佔位模型
pub struct InterpreterArtifacts;

#[async_trait]
impl<'a> Strategy<ArtifactContext<'a>, Vec<PathBuf>> for InterpreterArtifacts {
    fn name(&self) -> &str {
        "python placeholders"
    }

    async fn attempt(&self, ctx: &ArtifactContext<'a>) -> Result<Attempt<Vec<PathBuf>>> {
        let Some(interpreter) = ctx.interpreters.iter().find(|i| ctx.runner.is_available(i)) else {
            return Ok(Attempt::Unavailable("no python interpreter found".to_string()));
        };

        let mut args = vec!["-c".to_string(), DUMMY_ARTIFACT_SCRIPT.to_string()];
        args.extend(ctx.missing.iter().map(|p| p.display().to_string()));

        match ctx.runner.run(&Invocation::new(interpreter, args)).await {
            Ok(output) if output.is_success() => {
                let still_missing: Vec<_> = ctx.missing.iter().filter(|p| !p.exists()).collect();
                if still_missing.is_empty() {
                    Ok(Attempt::Succeeded(ctx.missing.to_vec()))
                } else {
                    Ok(Attempt::Failed(format!(
                        "{} exited cleanly but {} file(s) were not written",
                        interpreter,
                        still_missing.len()
                    )))
                }
            }
            Ok(output) => Ok(Attempt::Failed(output.describe_failure())),
            Err(e) => Ok(Attempt::Failed(e.to_string())),
        }
    }
}

/// 最後一層：寫入純文字替代檔，保證檔名一定存在
pub struct PlainTextArtifacts;

#[async_trait]
impl<'a> Strategy<ArtifactContext<'a>, Vec<PathBuf>> for PlainTextArtifacts {
    fn name(&self) -> &str {
        "plain-text placeholders"
    }

    async fn attempt(&self, ctx: &ArtifactContext<'a>) -> Result<Attempt<Vec<PathBuf>>> {
        for path in ctx.missing {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            resources::ensure_file(
                path,
                &format!("placeholder for {} - replace with the trained artifact\n", name),
            )?;
        }
        Ok(Attempt::Succeeded(ctx.missing.to_vec()))
    }
}

pub struct LaunchContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub options: &'a RunOptions,
}

fn compose_args(options: &RunOptions) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        options.compose_file().display().to_string(),
        "up".to_string(),
    ];
    if options.detach {
        args.push("-d".to_string());
    }
    args
}

/// `docker compose` (v2 外掛)
pub struct ComposePlugin;

#[async_trait]
impl<'a> Strategy<LaunchContext<'a>, (RunStrategy, bool)> for ComposePlugin {
    fn name(&self) -> &str {
        "docker compose"
    }

    async fn attempt(&self, ctx: &LaunchContext<'a>) -> Result<Attempt<(RunStrategy, bool)>> {
        let options = ctx.options;
        if !options.compose_file().is_file() {
            return Ok(Attempt::Unavailable(format!("no {}", options.settings.compose_file)));
        }

        let engine = options.settings.engine.as_str();
        let probe = Invocation::new(engine, ["compose", "version"]);
        match ctx.runner.run(&probe).await {
            Ok(output) if output.is_success() => {}
            _ => return Ok(Attempt::Unavailable("compose plugin not installed".to_string())),
        }

        let mut args = vec!["compose".to_string()];
        args.extend(compose_args(options));
        let invocation = Invocation::new(engine, args).in_dir(&options.root).streaming();

        tracing::info!("🐳 {}", invocation.display());
        match ctx.runner.run(&invocation).await {
            Ok(output) => {
                let strategy = RunStrategy::Compose {
                    invocation: format!("{} compose", engine),
                };
                if !output.is_success() {
                    tracing::warn!("⚠️ compose up failed: {}", output.describe_failure());
                }
                Ok(Attempt::Succeeded((strategy, output.is_success())))
            }
            Err(e) => Ok(Attempt::Failed(e.to_string())),
        }
    }
}

/// 獨立的 `docker-compose` 執行檔
pub struct ComposeStandalone;

#[async_trait]
impl<'a> Strategy<LaunchContext<'a>, (RunStrategy, bool)> for ComposeStandalone {
    fn name(&self) -> &str {
        "docker-compose"
    }

    async fn attempt(&self, ctx: &LaunchContext<'a>) -> Result<Attempt<(RunStrategy, bool)>> {
        let options = ctx.options;
        if !options.compose_file().is_file() {
            return Ok(Attempt::Unavailable(format!("no {}", options.settings.compose_file)));
        }

        let tool = options.settings.compose_standalone.as_str();
        if !ctx.runner.is_available(tool) {
            return Ok(Attempt::Unavailable(format!("{} not found", tool)));
        }

        let invocation = Invocation::new(tool, compose_args(options))
            .in_dir(&options.root)
            .streaming();

        tracing::info!("🐳 {}", invocation.display());
        match ctx.runner.run(&invocation).await {
            Ok(output) => {
                if !output.is_success() {
                    tracing::warn!("⚠️ {} up failed: {}", tool, output.describe_failure());
                }
                Ok(Attempt::Succeeded((
                    RunStrategy::Compose {
                        invocation: tool.to_string(),
                    },
                    output.is_success(),
                )))
            }
            Err(e) => Ok(Attempt::Failed(e.to_string())),
        }
    }
}

/// 沒有 compose 時直接以固定的連接埠與掛載執行映像檔
pub struct DirectRun;

#[async_trait]
impl<'a> Strategy<LaunchContext<'a>, (RunStrategy, bool)> for DirectRun {
    fn name(&self) -> &str {
        "docker run"
    }

    async fn attempt(&self, ctx: &LaunchContext<'a>) -> Result<Attempt<(RunStrategy, bool)>> {
        let options = ctx.options;
        let settings = &options.settings;

        let mut args = vec!["run".to_string(), "--rm".to_string()];
        if options.detach {
            args.push("-d".to_string());
        }
        args.extend([
            "-p".to_string(),
            format!("{0}:{0}", settings.api_port),
            "-p".to_string(),
            format!("{0}:{0}", settings.ui_port),
            "-v".to_string(),
            format!("{}:{}", options.models_dir().display(), settings.container_models_dir),
            "--name".to_string(),
            settings.container_name.clone(),
            settings.image.clone(),
        ]);
        let invocation = Invocation::new(&settings.engine, args)
            .in_dir(&options.root)
            .streaming();

        tracing::info!("🐳 {}", invocation.display());
        match ctx.runner.run(&invocation).await {
            Ok(output) => {
                if !output.is_success() {
                    tracing::warn!("⚠️ docker run failed: {}", output.describe_failure());
                }
                Ok(Attempt::Succeeded((
                    RunStrategy::Direct {
                        image: settings.image.clone(),
                    },
                    output.is_success(),
                )))
            }
            Err(e) => Ok(Attempt::Failed(e.to_string())),
        }
    }
}

pub struct LocalRunner<R: CommandRunner> {
    runner: R,
    options: RunOptions,
}

impl<R: CommandRunner> LocalRunner<R> {
    pub fn new(runner: R, options: RunOptions) -> Self {
        Self { runner, options }
    }

    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let settings = &self.options.settings;

        if !self.runner.is_available(&settings.engine) {
            return Err(ProvisionError::MissingDependency {
                tool: settings.engine.clone(),
            });
        }
        self.check_daemon().await?;

        let models_dir = self.ensure_models_dir()?;
        let dummy_artifacts = if self.options.with_dummy_artifacts {
            self.ensure_dummy_artifacts().await?
        } else {
            Vec::new()
        };

        self.build_image().await?;

        // 建置之後的步驟都是盡力而為，不影響退出碼
        let (launch, opened_endpoints) = if self.options.detach {
            (self.launch().await?, Vec::new())
        } else {
            // 前景執行會阻塞到容器結束，瀏覽器需與其同時進行
            let (launch, opened) = tokio::join!(self.launch(), self.open_endpoints());
            (launch?, opened)
        };

        let (strategy, run_succeeded) = launch;
        Ok(RunReport {
            models_dir,
            dummy_artifacts,
            image: settings.image.clone(),
            strategy,
            detached: self.options.detach,
            run_succeeded,
            opened_endpoints,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn check_daemon(&self) -> Result<()> {
        let engine = &self.options.settings.engine;
        let not_ready = |detail: String| ProvisionError::EnvironmentNotReady {
            what: format!("{} daemon ({})", engine, detail),
        };

        match self.runner.run(&Invocation::new(engine, ["info"])).await {
            Ok(output) if output.is_success() => {
                tracing::info!("✅ {} daemon is running", engine);
                Ok(())
            }
            Ok(output) => Err(not_ready(output.describe_failure())),
            Err(e) => Err(not_ready(e.to_string())),
        }
    }

    fn ensure_models_dir(&self) -> Result<Creation> {
        let dir = self.options.models_dir();
        if dir.is_dir() {
            tracing::info!("📁 Found models directory at {}", dir.display());
            return Ok(Creation::AlreadyPresent);
        }

        let created = resources::ensure_dir(&dir)?;
        resources::ensure_file(
            &dir.join("README.md"),
            &resources::models_readme(&self.options.settings.artifact_files),
        )?;
        Ok(created)
    }

    async fn ensure_dummy_artifacts(&self) -> Result<Vec<PathBuf>> {
        let dir = self.options.models_dir();
        let missing: Vec<PathBuf> = artifact_paths(&dir, &self.options.settings.artifact_files)
            .into_iter()
            .filter(|path| !path.exists())
            .collect();

        if missing.is_empty() {
            tracing::info!("📄 Model artifacts already present, not creating placeholders");
            return Ok(Vec::new());
        }

        let context = ArtifactContext {
            runner: &self.runner,
            missing: &missing,
            interpreters: &self.options.settings.interpreters,
        };
        let chain = FallbackChain::new("artifacts")
            .then(InterpreterArtifacts)
            .then(PlainTextArtifacts);

        let outcome = chain.run(&context).await?;
        Ok(outcome.winner.map(|(_, created)| created).unwrap_or_default())
    }

    async fn build_image(&self) -> Result<()> {
        let settings = &self.options.settings;
        let invocation = Invocation::new(
            &settings.engine,
            [
                "build".to_string(),
                "-t".to_string(),
                settings.image.clone(),
                self.options.root.display().to_string(),
            ],
        )
        .in_dir(&self.options.root)
        .streaming();

        tracing::info!("🔨 Building image {}", settings.image);
        let output = self.runner.run(&invocation).await?;
        if !output.is_success() {
            return Err(ProvisionError::BuildFailed {
                code: output.code.unwrap_or(1),
            });
        }
        tracing::info!("✅ Image {} built", settings.image);
        Ok(())
    }

    async fn launch(&self) -> Result<(RunStrategy, bool)> {
        let context = LaunchContext {
            runner: &self.runner,
            options: &self.options,
        };
        let chain = FallbackChain::new("launch")
            .then(ComposePlugin)
            .then(ComposeStandalone)
            .then(DirectRun);

        let outcome = chain.run(&context).await?;
        match outcome.winner {
            Some((_, launched)) => Ok(launched),
            None => {
                // DirectRun 只有在無法啟動程式時才會失敗
                tracing::warn!("⚠️ Could not start the application: {}", outcome.failure_reasons().join("; "));
                Ok((
                    RunStrategy::Direct {
                        image: self.options.settings.image.clone(),
                    },
                    false,
                ))
            }
        }
    }

    /// 開啟瀏覽器失敗只記錄 debug，不影響結果
    async fn open_endpoints(&self) -> Vec<String> {
        tokio::time::sleep(Duration::from_secs(self.options.settings.browser_delay_secs)).await;

        let mut urls = vec![self.options.api_docs_url()];
        if self.options.root.join(&self.options.settings.ui_marker_file).exists() {
            urls.push(self.options.ui_url());
        }

        let mut opened = Vec::new();
        for url in urls {
            let invocation = self.options.platform.open_url(&url);
            match self.runner.run(&invocation).await {
                Ok(output) if output.is_success() => {
                    tracing::info!("🌐 Opened {}", url);
                    opened.push(url);
                }
                Ok(output) => tracing::debug!("Could not open {}: {}", url, output.describe_failure()),
                Err(e) => tracing::debug!("Could not open {}: {}", url, e),
            }
        }
        opened
    }
}

pub fn artifact_paths(models_dir: &Path, names: &[String]) -> Vec<PathBuf> {
    names.iter().map(|name| models_dir.join(name)).collect()
}
