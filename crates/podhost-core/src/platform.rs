//! Platform hostname conventions.
//!
//! Each container platform exposes its hostname differently. All of the
//! per-platform knowledge (environment key, casing, hostname file) lives on
//! [`Platform`] so callers never branch on the platform themselves.
//!
//! | Platform | Env key | Value | Hostname file |
//! |----------|---------|-------|---------------|
//! | POSIX | `HOSTNAME` | as-is | `/etc/hostname` (`<name>\n`) |
//! | Windows | `COMPUTERNAME` | upper-cased | none |

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::hostname::EffectiveHostname;

/// Container platform, selecting the hostname convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Posix,
    Windows,
}

/// A single environment variable for a container's initial process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvEntry {
    pub key: String,
    pub value: String,
}

impl EnvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for EnvEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl Platform {
    /// The platform of the host this binary was built for.
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    /// Environment variable that carries the hostname.
    pub fn hostname_env_key(self) -> &'static str {
        match self {
            Platform::Posix => "HOSTNAME",
            Platform::Windows => "COMPUTERNAME",
        }
    }

    /// Build the hostname environment entry for this platform.
    pub fn format(self, hostname: &EffectiveHostname) -> EnvEntry {
        let value = match self {
            Platform::Posix => hostname.as_str().to_string(),
            Platform::Windows => hostname.as_str().to_uppercase(),
        };
        EnvEntry::new(self.hostname_env_key(), value)
    }

    /// Whether two environment keys name the same variable.
    ///
    /// Windows environment names are case-insensitive.
    pub fn env_key_eq(self, a: &str, b: &str) -> bool {
        match self {
            Platform::Posix => a == b,
            Platform::Windows => a.eq_ignore_ascii_case(b),
        }
    }

    /// Path of the hostname file inside the container, if the platform has one.
    pub fn hostname_file_path(self) -> Option<&'static str> {
        match self {
            Platform::Posix => Some("/etc/hostname"),
            Platform::Windows => None,
        }
    }

    /// Content of the hostname file: the hostname and a single trailing newline.
    pub fn render_hostname_file(self, hostname: &EffectiveHostname) -> Option<String> {
        self.hostname_file_path()
            .map(|_| format!("{}\n", hostname.as_str()))
    }

    /// Default `PATH` for a freshly created container.
    pub fn default_path(self) -> Option<&'static str> {
        match self {
            Platform::Posix => {
                Some("/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin")
            }
            Platform::Windows => None,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Posix => write!(f, "posix"),
            Platform::Windows => write!(f, "windows"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "posix" | "linux" => Ok(Platform::Posix),
            "windows" => Ok(Platform::Windows),
            "auto" => Ok(Platform::detect()),
            other => Err(format!(
                "unknown platform {other:?}, expected \"posix\", \"windows\", or \"auto\""
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hostname::{NetworkMode, resolve};

    fn effective(name: &str) -> EffectiveHostname {
        resolve(Some(name), NetworkMode::Namespaced, "host", "fallback").unwrap()
    }

    #[test]
    fn test_posix_format_preserves_case() {
        let entry = Platform::Posix.format(&effective("Test-Hostname"));
        assert_eq!(entry, EnvEntry::new("HOSTNAME", "Test-Hostname"));
        assert_eq!(entry.to_string(), "HOSTNAME=Test-Hostname");
    }

    #[test]
    fn test_windows_format_upper_cases() {
        let entry = Platform::Windows.format(&effective("test-hostname"));
        assert_eq!(entry, EnvEntry::new("COMPUTERNAME", "TEST-HOSTNAME"));
    }

    #[test]
    fn test_hostname_file_rendering() {
        let h = effective("test-hostname");
        assert_eq!(
            Platform::Posix.render_hostname_file(&h).as_deref(),
            Some("test-hostname\n")
        );
        assert_eq!(Platform::Posix.hostname_file_path(), Some("/etc/hostname"));
        assert!(Platform::Windows.render_hostname_file(&h).is_none());
    }

    #[test]
    fn test_env_key_comparison() {
        assert!(Platform::Posix.env_key_eq("HOSTNAME", "HOSTNAME"));
        assert!(!Platform::Posix.env_key_eq("HOSTNAME", "hostname"));
        assert!(Platform::Windows.env_key_eq("COMPUTERNAME", "ComputerName"));
    }

    #[test]
    fn test_platform_parse_and_display() {
        assert_eq!("posix".parse::<Platform>().unwrap(), Platform::Posix);
        assert_eq!("Linux".parse::<Platform>().unwrap(), Platform::Posix);
        assert_eq!("windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!("auto".parse::<Platform>().unwrap(), Platform::detect());
        assert!("plan9".parse::<Platform>().is_err());
        assert_eq!(Platform::Posix.to_string(), "posix");
        assert_eq!(Platform::Windows.to_string(), "windows");
    }

    #[test]
    fn test_detect_matches_target() {
        if cfg!(windows) {
            assert_eq!(Platform::detect(), Platform::Windows);
        } else {
            assert_eq!(Platform::detect(), Platform::Posix);
        }
    }
}
