use crate::domain::model::{CommandOutput, Invocation};
use crate::domain::ports::CommandRunner;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// 以 tokio 子行程執行真正的外部工具
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        find_in_path(program, &path_var, &executable_extensions())
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        tracing::debug!("▶️ {}", invocation.display());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        if invocation.streaming {
            let status = command.status().await?;
            return Ok(CommandOutput {
                code: status.code(),
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        let output = command.output().await?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!("◀️ {} -> {:?}", invocation.program, result.code);
        Ok(result)
    }
}

fn executable_extensions() -> Vec<String> {
    if cfg!(windows) {
        std::env::var("PATHEXT")
            .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_string())
            .collect()
    } else {
        Vec::new()
    }
}

/// 依 PATH 順序尋找第一個符合的可執行檔
pub fn find_in_path(program: &str, path_var: &OsString, extensions: &[String]) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    for dir in std::env::split_paths(path_var) {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        for ext in extensions {
            let with_ext = dir.join(format!("{}{}", program, ext.to_lowercase()));
            if is_executable(&with_ext) {
                return Some(with_ext);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_find_in_path_respects_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_executable(&second.path().join("docker"));
        make_executable(&first.path().join("docker"));

        let path_var = std::env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_in_path("docker", &path_var, &[]).unwrap();
        assert_eq!(found, first.path().join("docker"));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_in_path_skips_non_executable_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gh"), "not a program").unwrap();

        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_in_path("gh", &path_var, &[]).is_none());
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_in_path("definitely-not-installed", &path_var, &[]).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_exit_code_and_output() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&Invocation::new("sh", ["-c", "echo hello; echo oops >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let runner = SystemRunner::new();
        let result = runner
            .run(&Invocation::new("definitely-not-installed-xyz", Vec::<String>::new()))
            .await;
        assert!(result.is_err());
    }
}
