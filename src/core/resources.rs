use crate::domain::model::Creation;
use crate::utils::error::Result;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// 僅在檔案不存在時寫入；既有檔案一律不覆寫
pub fn ensure_file(path: &Path, contents: &str) -> Result<Creation> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // create_new 讓「檢查後寫入」成為單一步驟
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(contents.as_bytes())?;
            tracing::info!("📝 Created {}", path.display());
            Ok(Creation::Created)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::info!("📄 {} already exists, leaving it untouched", path.display());
            Ok(Creation::AlreadyPresent)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn ensure_dir(path: &Path) -> Result<Creation> {
    if path.is_dir() {
        tracing::info!("📁 Found existing directory {}", path.display());
        return Ok(Creation::AlreadyPresent);
    }
    std::fs::create_dir_all(path)?;
    tracing::info!("📁 Created directory {}", path.display());
    Ok(Creation::Created)
}

pub const DEFAULT_GITIGNORE: &str = "\
# Python
__pycache__/
*.py[cod]
*.egg-info/
.pytest_cache/

# Virtual environments
.venv/
venv/
env/

# Build and run outputs
build/
dist/
outputs/
logs/
*.log

# Model binaries (keep the folder itself)
models/*.pkl
!models/.gitkeep

# Editors and OS files
.vscode/
.idea/
.DS_Store
Thumbs.db

# Local secrets
.env
";

pub fn models_readme(artifact_files: &[String]) -> String {
    let mut readme = String::from(
        "# Models\n\nPlace the trained model artifacts in this folder before running the API.\n\nExpected files:\n\n",
    );
    for name in artifact_files {
        readme.push_str(&format!("- `{}`\n", name));
    }
    readme.push_str(
        "\nThe container mounts this folder at `/app/models`; run `devstack run-local --with-dummy-artifacts` to create placeholders for a smoke test.\n",
    );
    readme
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_file_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".gitignore");

        assert_eq!(ensure_file(&path, "first").unwrap(), Creation::Created);
        assert_eq!(ensure_file(&path, "second").unwrap(), Creation::AlreadyPresent);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn test_ensure_file_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("models").join(".gitkeep");

        assert!(ensure_file(&path, "").unwrap().was_created());
        assert!(path.is_file());
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("models");

        assert_eq!(ensure_dir(&path).unwrap(), Creation::Created);
        assert_eq!(ensure_dir(&path).unwrap(), Creation::AlreadyPresent);
    }

    #[test]
    fn test_models_readme_lists_artifacts() {
        let readme = models_readme(&["a.pkl".to_string(), "b.pkl".to_string()]);
        assert!(readme.contains("- `a.pkl`"));
        assert!(readme.contains("- `b.pkl`"));
    }
}
