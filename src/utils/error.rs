use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Required tool not found: {tool}")]
    MissingDependency { tool: String },

    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    ToolInvocationFailure {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Environment not ready: {what}")]
    EnvironmentNotReady { what: String },

    #[error("Image build failed with exit code {code}")]
    BuildFailed { code: i32 },

    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Installer launch failed: {reason}")]
    InstallerLaunchFailed { reason: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Dependency,
    Environment,
    Tooling,
    Network,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ProvisionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingDependency { .. } => ErrorCategory::Dependency,
            Self::EnvironmentNotReady { .. } => ErrorCategory::Environment,
            Self::ToolInvocationFailure { .. }
            | Self::BuildFailed { .. }
            | Self::InstallerLaunchFailed { .. } => ErrorCategory::Tooling,
            Self::DownloadFailed { .. } | Self::HttpError(_) => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ToolInvocationFailure { .. } => ErrorSeverity::Medium,
            Self::MissingDependency { .. }
            | Self::EnvironmentNotReady { .. }
            | Self::BuildFailed { .. }
            | Self::DownloadFailed { .. }
            | Self::InstallerLaunchFailed { .. }
            | Self::HttpError(_) => ErrorSeverity::High,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
            Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 呼叫端可依退出碼區分失敗原因：1 = 缺少工具，2 = 服務未就緒，建置失敗則原樣傳遞
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EnvironmentNotReady { .. } => 2,
            Self::BuildFailed { code } => *code,
            _ => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::MissingDependency { tool } => {
                format!("Install '{}' and make sure it is on your PATH", tool)
            }
            Self::EnvironmentNotReady { .. } => {
                "Start Docker Desktop (or the docker daemon) and wait until it reports running"
                    .to_string()
            }
            Self::BuildFailed { .. } => {
                "Check the Dockerfile and the build output above".to_string()
            }
            Self::ToolInvocationFailure { tool, .. } => {
                format!("Re-run '{}' manually to see the full output", tool)
            }
            Self::DownloadFailed { .. } => {
                "Download and install Docker Desktop manually from https://www.docker.com/products/docker-desktop/".to_string()
            }
            Self::InstallerLaunchFailed { .. } => {
                "Run the downloaded installer manually with administrator rights".to_string()
            }
            Self::HttpError(_) => "Check your network connection and proxy settings".to_string(),
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Fix the configuration file or command line flags and try again".to_string()
            }
            Self::IoError(_) => "Check file permissions in the working directory".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingDependency { tool } => format!("'{}' is not installed", tool),
            Self::EnvironmentNotReady { what } => format!("{} is not responding", what),
            Self::BuildFailed { code } => format!("docker build failed (exit code {})", code),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
