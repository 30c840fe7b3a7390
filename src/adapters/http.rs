use crate::domain::ports::Downloader;
use crate::utils::error::{ProvisionError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        tracing::debug!("Downloading {} -> {}", url, dest.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisionError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProvisionError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP status {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProvisionError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        mark_executable(dest).await?;

        tracing::debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.len() as u64)
    }
}

/// 安裝程式下載後會被直接執行，unix 上需要執行權限
#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/installer.exe");
            then.status(200).body("MZ-installer-bytes");
        });

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("nested").join("installer.exe");
        let downloader = HttpDownloader::new(Duration::from_secs(5)).unwrap();

        let written = downloader
            .download(&server.url("/installer.exe"), &dest)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(written, 18);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "MZ-installer-bytes");
    }

    #[tokio::test]
    async fn test_http_error_status_is_download_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.exe");
            then.status(404);
        });

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("missing.exe");
        let downloader = HttpDownloader::new(Duration::from_secs(5)).unwrap();

        let err = downloader
            .download(&server.url("/missing.exe"), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::DownloadFailed { .. }));
        assert!(!dest.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_downloaded_installer_can_be_launched() {
        use crate::adapters::process::SystemRunner;
        use crate::core::platform::Platform;
        use crate::domain::ports::CommandRunner;

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/installer.sh");
            then.status(200).body("#!/bin/sh\nexit 0\n");
        });

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("installer.sh");
        let downloader = HttpDownloader::new(Duration::from_secs(5)).unwrap();
        downloader
            .download(&server.url("/installer.sh"), &dest)
            .await
            .unwrap();

        let output = SystemRunner::new()
            .run(&Platform::Linux.installer_launch(&dest))
            .await
            .unwrap();
        assert!(output.is_success());
    }
}
