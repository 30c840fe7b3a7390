use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 一次外部程式呼叫：程式名稱與明確的參數清單，不經過 shell 拼接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// true 時輸出直接接到終端機 (建置、前景容器)，不擷取
    pub streaming: bool,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            streaming: false,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// `program arg1 arg2`，只用於日誌與手動指令輸出
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 外部程式的執行結果；退出碼是管線唯一的分支依據
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn describe_failure(&self) -> String {
        let detail = self.stderr.trim();
        match (self.code, detail.is_empty()) {
            (Some(code), true) => format!("exit code {}", code),
            (Some(code), false) => format!("exit code {}: {}", code, detail),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {}", detail),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn gh_flag(self) -> &'static str {
        match self {
            Visibility::Public => "--public",
            Visibility::Private => "--private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// 冪等建立的結果；已存在不是錯誤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Creation {
    Created,
    AlreadyPresent,
}

impl Creation {
    pub fn was_created(self) -> bool {
        self == Creation::Created
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// 以 gh 自動建立並推送
    Created { tool: String },
    /// 使用者提供的 URL 已推送
    Pushed { url: String },
    /// 自動化不可用或失敗，改印出手動指令
    Manual { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub repository_name: String,
    pub root: PathBuf,
    pub initialized: bool,
    pub ignore_file: Creation,
    pub placeholder: Option<Creation>,
    pub committed: bool,
    pub remote: RemoteOutcome,
    pub manual_instructions: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    /// 已轉交給提權後的行程，本行程以其退出碼結束
    Escalated { exit_code: i32 },
    AlreadyInstalled { version: String },
    PackageManager { tool: String, version: String },
    InstallerLaunched { installer: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    pub outcome: InstallOutcome,
    pub warnings: Vec<String>,
    pub subsystem_notes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl InstallReport {
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            InstallOutcome::Escalated { exit_code } => exit_code,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStrategy {
    Compose { invocation: String },
    Direct { image: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub models_dir: Creation,
    pub dummy_artifacts: Vec<PathBuf>,
    pub image: String,
    pub strategy: RunStrategy,
    pub detached: bool,
    pub run_succeeded: bool,
    pub opened_endpoints: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
