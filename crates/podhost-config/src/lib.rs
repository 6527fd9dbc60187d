#![deny(unsafe_code)]

//! Configuration loading and validation for podhost.
//!
//! Loads TOML configuration files and validates them. Every field has a
//! default, so an empty file (or no file at all) yields a working
//! [`AppConfig`].

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sandbox runtime configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Docker backend configuration.
    #[serde(default)]
    pub docker: DockerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sandbox runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// State directory. Each sandbox gets `<root_dir>/sandboxes/<id>/`.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Backend: "auto", "noop", or "docker".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Container platform convention: "auto", "posix", or "windows".
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Hostname for namespaced sandboxes that request none:
    /// "sandbox-id" (short sandbox id) or "host" (the node's hostname).
    #[serde(default = "default_unset_hostname")]
    pub unset_hostname: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            backend: default_backend(),
            platform: default_platform(),
            unset_hostname: default_unset_hostname(),
        }
    }
}

fn default_root_dir() -> String {
    "/var/lib/podhost".to_string()
}

fn default_backend() -> String {
    "auto".to_string()
}

fn default_platform() -> String {
    "auto".to_string()
}

fn default_unset_hostname() -> String {
    "sandbox-id".to_string()
}

/// Docker backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Docker CLI binary name or path.
    #[serde(default = "default_docker_binary")]
    pub binary: String,

    /// Image used for containers that do not name one.
    #[serde(default = "default_docker_image")]
    pub image: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            image: default_docker_image(),
        }
    }
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_docker_image() -> String {
    "busybox:latest".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.root_dir.is_empty() {
            return Err(ConfigError::Validation(
                "runtime.root_dir must not be empty".to_string(),
            ));
        }
        let valid_backends = ["auto", "noop", "docker"];
        if !valid_backends.contains(&self.runtime.backend.as_str()) {
            return Err(ConfigError::Validation(format!(
                "runtime.backend must be one of {:?}, got {:?}",
                valid_backends, self.runtime.backend
            )));
        }
        let valid_platforms = ["auto", "posix", "linux", "windows"];
        let platform = self.runtime.platform.to_ascii_lowercase();
        if !valid_platforms.contains(&platform.as_str()) {
            return Err(ConfigError::Validation(format!(
                "runtime.platform must be one of {:?}, got {:?}",
                valid_platforms, self.runtime.platform
            )));
        }
        let valid_policies = ["sandbox-id", "host"];
        if !valid_policies.contains(&self.runtime.unset_hostname.as_str()) {
            return Err(ConfigError::Validation(format!(
                "runtime.unset_hostname must be one of {:?}, got {:?}",
                valid_policies, self.runtime.unset_hostname
            )));
        }
        if self.docker.binary.is_empty() {
            return Err(ConfigError::Validation(
                "docker.binary must not be empty".to_string(),
            ));
        }
        if self.docker.image.is_empty() {
            return Err(ConfigError::Validation(
                "docker.image must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.runtime.root_dir, "/var/lib/podhost");
        assert_eq!(config.runtime.backend, "auto");
        assert_eq!(config.runtime.platform, "auto");
        assert_eq!(config.runtime.unset_hostname, "sandbox-id");
        assert_eq!(config.docker.binary, "docker");
        assert_eq!(config.docker.image, "busybox:latest");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.runtime.backend, "auto");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [runtime]
            root_dir = "/srv/podhost"
            backend = "docker"
            platform = "windows"
            unset_hostname = "host"

            [docker]
            binary = "/usr/local/bin/docker"
            image = "alpine:3.20"

            [logging]
            level = "debug"
        "#;

        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.runtime.root_dir, "/srv/podhost");
        assert_eq!(config.runtime.backend, "docker");
        assert_eq!(config.runtime.platform, "windows");
        assert_eq!(config.runtime.unset_hostname, "host");
        assert_eq!(config.docker.binary, "/usr/local/bin/docker");
        assert_eq!(config.docker.image, "alpine:3.20");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_unknown_backend() {
        let toml = r#"
            [runtime]
            backend = "firecracker"
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("runtime.backend"));
    }

    #[test]
    fn test_validation_rejects_unknown_platform() {
        let toml = r#"
            [runtime]
            platform = "plan9"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_platform_names_are_case_insensitive() {
        let toml = r#"
            [runtime]
            platform = "Linux"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.runtime.platform, "Linux");
    }

    #[test]
    fn test_validation_rejects_unknown_unset_policy() {
        let toml = r#"
            [runtime]
            unset_hostname = "random"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_root_dir() {
        let toml = r#"
            [runtime]
            root_dir = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_docker_image() {
        let toml = r#"
            [docker]
            image = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        let err = AppConfig::parse("[runtime\nbackend = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_to_json_contains_sections() {
        let json = AppConfig::default().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["runtime"]["unset_hostname"], "sandbox-id");
        assert_eq!(value["docker"]["image"], "busybox:latest");
    }

    #[test_log::test(tokio::test)]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("podhost.toml");
        std::fs::write(
            &path,
            r#"
                [runtime]
                backend = "noop"
            "#,
        )
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.runtime.backend, "noop");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = AppConfig::load(&tmp.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
