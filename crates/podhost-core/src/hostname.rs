//! Effective hostname resolution for pod sandboxes.
//!
//! A sandbox either gets its own network (and UTS) namespace or shares the
//! host's. The hostname a sandbox ends up with follows from that choice:
//!
//! | Network mode | Requested hostname | Effective hostname |
//! |--------------|--------------------|--------------------|
//! | `Namespaced` | `Some(h)` | `h` |
//! | `Namespaced` | unset / empty | fallback (see [`UnsetHostnamePolicy`]) |
//! | `HostNetwork` | unset / empty | host machine hostname |
//! | `HostNetwork` | `Some(h)` | [`HostnameError::IncompatibleHostnameConfig`] |
//!
//! [`resolve`] is pure: the host hostname and the fallback are passed in, so
//! identical inputs always yield identical output.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Errors from hostname resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostnameError {
    #[error(
        "hostname {hostname:?} cannot be set for a sandbox in host network mode; \
         the hostname is shared with the host"
    )]
    IncompatibleHostnameConfig { hostname: String },
}

/// How a sandbox's network namespace relates to the host's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkMode {
    /// The sandbox gets its own network namespace (and hostname).
    #[default]
    Namespaced,
    /// The sandbox shares the host's network namespace.
    HostNetwork,
}

impl NetworkMode {
    /// Whether the sandbox shares the host network namespace.
    pub fn is_host(self) -> bool {
        matches!(self, NetworkMode::HostNetwork)
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkMode::Namespaced => write!(f, "namespaced"),
            NetworkMode::HostNetwork => write!(f, "host"),
        }
    }
}

/// The hostname actually applied to a sandbox and its containers.
///
/// Constructed only by [`resolve`]; there is no way to mutate it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EffectiveHostname(String);

impl EffectiveHostname {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EffectiveHostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectiveHostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a namespaced sandbox without a requested hostname falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsetHostnamePolicy {
    /// Use a runtime-assigned identifier derived from the sandbox id.
    #[default]
    SandboxId,
    /// Use the host machine's hostname, as an unconfigured UTS namespace would.
    Host,
}

impl FromStr for UnsetHostnamePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sandbox-id" => Ok(UnsetHostnamePolicy::SandboxId),
            "host" => Ok(UnsetHostnamePolicy::Host),
            other => Err(format!(
                "unknown unset hostname policy {other:?}, expected \"sandbox-id\" or \"host\""
            )),
        }
    }
}

impl fmt::Display for UnsetHostnamePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsetHostnamePolicy::SandboxId => write!(f, "sandbox-id"),
            UnsetHostnamePolicy::Host => write!(f, "host"),
        }
    }
}

/// Resolve the effective hostname for a sandbox.
///
/// An empty `requested` string is treated the same as `None`.
pub fn resolve(
    requested: Option<&str>,
    mode: NetworkMode,
    host_hostname: &str,
    fallback: &str,
) -> Result<EffectiveHostname, HostnameError> {
    let requested = requested.filter(|h| !h.is_empty());
    match (mode, requested) {
        (NetworkMode::HostNetwork, Some(h)) => Err(HostnameError::IncompatibleHostnameConfig {
            hostname: h.to_string(),
        }),
        (NetworkMode::HostNetwork, None) => Ok(EffectiveHostname(host_hostname.to_string())),
        (NetworkMode::Namespaced, Some(h)) => Ok(EffectiveHostname(h.to_string())),
        (NetworkMode::Namespaced, None) => Ok(EffectiveHostname(fallback.to_string())),
    }
}

/// Source of the host machine's current hostname.
pub trait HostInfo: Send + Sync {
    fn hostname(&self) -> std::io::Result<String>;
}

/// Reads the hostname of the machine this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    fn hostname(&self) -> std::io::Result<String> {
        host_hostname()
    }
}

/// A fixed host hostname, for tests and for callers that already know it.
#[derive(Debug, Clone)]
pub struct StaticHost(pub String);

impl StaticHost {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self(hostname.into())
    }
}

impl HostInfo for StaticHost {
    fn hostname(&self) -> std::io::Result<String> {
        Ok(self.0.clone())
    }
}

/// The current hostname of this machine.
pub fn host_hostname() -> std::io::Result<String> {
    let name = hostname::get()?;
    name.into_string().map_err(|raw| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("host hostname is not valid UTF-8: {raw:?}"),
        )
    })
}
