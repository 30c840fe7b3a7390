use crate::domain::model::Visibility;
use crate::utils::error::{ProvisionError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "devstack.toml";

/// `devstack.toml`：所有欄位都有預設值，檔案不存在時直接使用預設
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub repository: RepositoryConfig,
    pub runtime: RuntimeConfig,
    pub local_run: LocalRunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub vcs_tool: String,
    pub remote_tool: String,
    pub name: Option<String>,
    pub visibility: Visibility,
    pub prefer_remote_tool: bool,
    pub remote_url: Option<String>,
    pub branch: String,
    pub commit_message: String,
    /// 手動指令中的遠端 URL，`{name}` 會替換成儲存庫名稱
    pub manual_url_template: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            vcs_tool: "git".to_string(),
            remote_tool: "gh".to_string(),
            name: None,
            visibility: Visibility::Private,
            prefer_remote_tool: true,
            remote_url: None,
            branch: "main".to_string(),
            commit_message: "Initial commit".to_string(),
            manual_url_template: "https://github.com/<your-username>/{name}.git".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub runtime_command: String,
    pub package_manager: String,
    pub package_id: String,
    pub installer_url: String,
    pub installer_file_name: Option<String>,
    pub post_install_wait_secs: u64,
    pub download_timeout_secs: u64,
    pub subsystem_command: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_command: "docker".to_string(),
            package_manager: "winget".to_string(),
            package_id: "Docker.DockerDesktop".to_string(),
            installer_url:
                "https://desktop.docker.com/win/main/amd64/Docker%20Desktop%20Installer.exe"
                    .to_string(),
            installer_file_name: None,
            post_install_wait_secs: 10,
            download_timeout_secs: 900,
            subsystem_command: "wsl".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// 未指定檔名時取 URL 最後一段並解碼，取不到則用固定名稱
    pub fn installer_file_name(&self) -> String {
        if let Some(name) = &self.installer_file_name {
            return name.clone();
        }
        url::Url::parse(&self.installer_url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.replace("%20", " "))
            .unwrap_or_else(|| "DockerDesktopInstaller.exe".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalRunConfig {
    pub engine: String,
    pub compose_standalone: String,
    pub compose_file: String,
    pub image: String,
    pub container_name: String,
    pub models_dir: String,
    pub container_models_dir: String,
    pub artifact_files: Vec<String>,
    pub interpreters: Vec<String>,
    pub api_port: u16,
    pub ui_port: u16,
    pub docs_path: String,
    pub ui_marker_file: String,
    pub browser_delay_secs: u64,
}

impl Default for LocalRunConfig {
    fn default() -> Self {
        Self {
            engine: "docker".to_string(),
            compose_standalone: "docker-compose".to_string(),
            compose_file: "docker-compose.yml".to_string(),
            image: "disease-predictor".to_string(),
            container_name: "disease-predictor".to_string(),
            models_dir: "models".to_string(),
            container_models_dir: "/app/models".to_string(),
            artifact_files: vec!["disease_xgb.pkl".to_string(), "label_encoder.pkl".to_string()],
            interpreters: vec!["python".to_string(), "python3".to_string()],
            api_port: 8000,
            ui_port: 8501,
            docs_path: "/docs".to_string(),
            ui_marker_file: "streamlit_app.py".to_string(),
            browser_delay_secs: 5,
        }
    }
}

impl ProvisionConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProvisionError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案存在才載入，否則回傳預設值
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().is_file() {
            tracing::debug!("Loading configuration from {}", path.as_ref().display());
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ProvisionError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GITHUB_USER})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProvisionError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl ProvisionConfig {
    /// `init-repo` 只需要 [repository]
    pub fn validate_repository(&self) -> Result<()> {
        let repo = &self.repository;
        validation::validate_non_empty_string("repository.vcs_tool", &repo.vcs_tool)?;
        validation::validate_non_empty_string("repository.branch", &repo.branch)?;
        validation::validate_non_empty_string("repository.commit_message", &repo.commit_message)?;
        if let Some(name) = &repo.name {
            validation::validate_repository_name("repository.name", name)?;
        }
        if let Some(remote) = &repo.remote_url {
            validation::validate_remote_url("repository.remote_url", remote)?;
        }
        Ok(())
    }

    /// `install-runtime` 只需要 [runtime]
    pub fn validate_runtime(&self) -> Result<()> {
        let runtime = &self.runtime;
        validation::validate_non_empty_string("runtime.runtime_command", &runtime.runtime_command)?;
        validation::validate_url("runtime.installer_url", &runtime.installer_url)?;
        validation::validate_range("runtime.post_install_wait_secs", runtime.post_install_wait_secs, 0, 600)?;
        Ok(())
    }

    /// `run-local` 只需要 [local_run]
    pub fn validate_local_run(&self) -> Result<()> {
        let run = &self.local_run;
        validation::validate_non_empty_string("local_run.engine", &run.engine)?;
        validation::validate_non_empty_string("local_run.image", &run.image)?;
        validation::validate_path("local_run.models_dir", &run.models_dir)?;
        validation::validate_path("local_run.compose_file", &run.compose_file)?;
        validation::validate_range("local_run.api_port", run.api_port, 1, u16::MAX)?;
        validation::validate_range("local_run.ui_port", run.ui_port, 1, u16::MAX)?;
        validation::validate_range("local_run.browser_delay_secs", run.browser_delay_secs, 0, 120)?;
        for file in &run.artifact_files {
            validation::validate_path("local_run.artifact_files", file)?;
        }
        Ok(())
    }
}

impl Validate for ProvisionConfig {
    fn validate(&self) -> Result<()> {
        self.validate_repository()?;
        self.validate_runtime()?;
        self.validate_local_run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ProvisionConfig::from_toml_str("").unwrap();
        assert_eq!(config.repository.branch, "main");
        assert_eq!(config.runtime.package_id, "Docker.DockerDesktop");
        assert_eq!(config.local_run.api_port, 8000);
        assert_eq!(
            config.local_run.artifact_files,
            vec!["disease_xgb.pkl", "label_encoder.pkl"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_override_defaults() {
        let config = ProvisionConfig::from_toml_str(
            r#"
[repository]
visibility = "public"
branch = "trunk"

[local_run]
image = "predictor-dev"
ui_port = 9501
"#,
        )
        .unwrap();

        assert_eq!(config.repository.visibility, Visibility::Public);
        assert_eq!(config.repository.branch, "trunk");
        assert_eq!(config.repository.vcs_tool, "git");
        assert_eq!(config.local_run.image, "predictor-dev");
        assert_eq!(config.local_run.ui_port, 9501);
        assert_eq!(config.local_run.api_port, 8000);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DEVSTACK_TEST_REMOTE_OWNER", "octo");
        let config = ProvisionConfig::from_toml_str(
            r#"
[repository]
remote_url = "https://github.com/${DEVSTACK_TEST_REMOTE_OWNER}/app.git"
manual_url_template = "https://github.com/${DEVSTACK_TEST_UNSET_VAR}/{name}.git"
"#,
        )
        .unwrap();

        assert_eq!(
            config.repository.remote_url.as_deref(),
            Some("https://github.com/octo/app.git")
        );
        assert_eq!(
            config.repository.manual_url_template,
            "https://github.com/${DEVSTACK_TEST_UNSET_VAR}/{name}.git"
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = ProvisionConfig::default();
        config.runtime.installer_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        let mut config = ProvisionConfig::default();
        config.repository.name = Some("bad name".to_string());
        assert!(config.validate().is_err());

        let mut config = ProvisionConfig::default();
        config.local_run.api_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sections_validate_independently() {
        let mut config = ProvisionConfig::default();
        config.runtime.installer_url = "not-a-url".to_string();

        assert!(config.validate_repository().is_ok());
        assert!(config.validate_local_run().is_ok());
        assert!(config.validate_runtime().is_err());

        let mut config = ProvisionConfig::default();
        config.repository.branch = " ".to_string();
        assert!(config.validate_runtime().is_ok());
        assert!(config.validate_repository().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ProvisionConfig::from_toml_str("[repository\nbranch = ").unwrap_err();
        assert!(matches!(err, ProvisionError::ConfigError { .. }));
    }

    #[test]
    fn test_installer_file_name_from_url() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.installer_file_name(), "Docker Desktop Installer.exe");

        let custom = RuntimeConfig {
            installer_file_name: Some("setup.exe".to_string()),
            ..RuntimeConfig::default()
        };
        assert_eq!(custom.installer_file_name(), "setup.exe");
    }
}
