use crate::utils::error::{ProvisionError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ProvisionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ProvisionError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ProvisionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

/// git 遠端可以是 https、ssh (`ssh://`) 或 scp 風格 (`git@host:owner/repo.git`)
pub fn validate_remote_url(field_name: &str, remote: &str) -> Result<()> {
    validate_non_empty_string(field_name, remote)?;

    if let Ok(url) = Url::parse(remote) {
        return match url.scheme() {
            "http" | "https" | "ssh" | "git" | "file" => Ok(()),
            scheme => Err(ProvisionError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: remote.to_string(),
                reason: format!("Unsupported remote scheme: {}", scheme),
            }),
        };
    }

    let scp_like = remote
        .split_once(':')
        .map(|(host, path)| host.contains('@') && !path.is_empty())
        .unwrap_or(false);
    if scp_like {
        return Ok(());
    }

    Err(ProvisionError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: remote.to_string(),
        reason: "Expected an https, ssh or user@host:path remote".to_string(),
    })
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ProvisionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ProvisionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_repository_name(field_name: &str, name: &str) -> Result<()> {
    validate_non_empty_string(field_name, name)?;

    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(ProvisionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Only ASCII letters, digits, '-', '_' and '.' are allowed".to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProvisionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ProvisionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
