//! Container materialization inside a pod sandbox.
//!
//! [`inject`] turns a [`ContainerConfig`] into a [`ContainerSpec`] by
//! layering the container environment and adding the hostname file:
//!
//! 1. runtime defaults (`PATH` on POSIX)
//! 2. the sandbox hostname entry (`HOSTNAME` / `COMPUTERNAME`)
//! 3. user-specified variables, which win over both of the above
//!
//! The hostname comes from the sandbox and is the same for every container
//! created in it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::hostname::{EffectiveHostname, NetworkMode};
use crate::platform::{EnvEntry, Platform};
use crate::sandbox::{PodSandbox, SandboxId};

/// How a host path is exposed to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountAccess {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for MountAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountAccess::ReadOnly => write!(f, "ro"),
            MountAccess::ReadWrite => write!(f, "rw"),
        }
    }
}

/// A host path bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: PathBuf,
    pub access: MountAccess,
}

impl Mount {
    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host.into(),
            container_path: container.into(),
            access: MountAccess::ReadOnly,
        }
    }

    pub fn read_write(host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host.into(),
            container_path: container.into(),
            access: MountAccess::ReadWrite,
        }
    }
}

/// Unique container identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-container request.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    /// User environment, in declaration order. Later duplicates win.
    pub env: Vec<EnvEntry>,
    pub mounts: Vec<Mount>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Overrides the runtime's platform for this container.
    pub platform: Option<Platform>,
}

impl ContainerConfig {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            args: Vec::new(),
            env: Vec::new(),
            mounts: Vec::new(),
            working_dir: None,
            timeout: None,
            platform: None,
        }
    }

    /// Builder: set the command (entrypoint) argv.
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the arguments appended to the command.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvEntry::new(key, value));
        self
    }

    /// Builder: add a mount.
    pub fn with_mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    /// Builder: set the working directory.
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Builder: set an execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builder: force a platform convention.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Full argv: command followed by args.
    pub fn argv(&self) -> Vec<String> {
        self.command.iter().chain(&self.args).cloned().collect()
    }
}

/// A container materialized inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub id: ContainerId,
    pub sandbox_id: SandboxId,
    pub name: String,
    pub image: String,
    pub argv: Vec<String>,
    pub env: Vec<EnvEntry>,
    pub mounts: Vec<Mount>,
    pub working_dir: Option<PathBuf>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
    pub platform: Platform,
    pub network_mode: NetworkMode,
    pub hostname: EffectiveHostname,
    /// Rendered hostname file, for platforms that have one.
    pub hostname_file: Option<String>,
}

impl ContainerSpec {
    /// Look up an environment variable by key (platform key semantics).
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|e| self.platform.env_key_eq(&e.key, key))
            .map(|e| e.value.as_str())
    }

    /// Environment rendered as `KEY=VALUE` strings.
    pub fn env_strings(&self) -> Vec<String> {
        self.env.iter().map(ToString::to_string).collect()
    }
}

/// Materialize a container in `sandbox` for the given platform.
pub fn inject(sandbox: &PodSandbox, config: &ContainerConfig, platform: Platform) -> ContainerSpec {
    let hostname = sandbox.hostname();

    let mut env: Vec<EnvEntry> = Vec::new();
    if let Some(path) = platform.default_path() {
        set_env(&mut env, platform, EnvEntry::new("PATH", path));
    }
    set_env(&mut env, platform, platform.format(hostname));
    for entry in &config.env {
        set_env(&mut env, platform, entry.clone());
    }

    let mut mounts = config.mounts.clone();
    let hostname_file = platform.render_hostname_file(hostname);
    if let Some(guest) = platform.hostname_file_path() {
        let user_mounted = mounts
            .iter()
            .any(|m| m.container_path.as_path() == std::path::Path::new(guest));
        if !user_mounted {
            mounts.push(Mount::read_only(sandbox.hostname_file(), guest));
        }
    }

    tracing::debug!(
        sandbox_id = %sandbox.id(),
        container = %config.name,
        platform = %platform,
        hostname = %hostname,
        "Injected container hostname"
    );

    ContainerSpec {
        id: ContainerId::generate(),
        sandbox_id: sandbox.id().clone(),
        name: config.name.clone(),
        image: config.image.clone(),
        argv: config.argv(),
        env,
        mounts,
        working_dir: config.working_dir.clone(),
        timeout: config.timeout,
        platform,
        network_mode: sandbox.network_mode(),
        hostname: hostname.clone(),
        hostname_file,
    }
}

/// Insert or replace `entry`, keeping the position of an existing key.
fn set_env(env: &mut Vec<EnvEntry>, platform: Platform, entry: EnvEntry) {
    match env
        .iter_mut()
        .find(|e| platform.env_key_eq(&e.key, &entry.key))
    {
        Some(existing) => existing.value = entry.value,
        None => env.push(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hostname::{StaticHost, UnsetHostnamePolicy};
    use crate::sandbox::PodSandboxConfig;
    use pretty_assertions::assert_eq;

    fn sandbox(config: PodSandboxConfig) -> PodSandbox {
        let spec = config
            .build(&StaticHost::new("node-01"), UnsetHostnamePolicy::default())
            .unwrap();
        let root = PathBuf::from("/var/lib/podhost/sandboxes").join(spec.id().as_str());
        let file = root.join("hostname");
        PodSandbox::new(spec, root, file)
    }

    #[test]
    fn test_posix_injection() {
        let sb = sandbox(PodSandboxConfig::new("sandbox").with_hostname("test-hostname"));
        let config = ContainerConfig::new("test-container", "busybox")
            .with_command(["sh", "-c"])
            .with_args(["hostname && env"]);

        let spec = inject(&sb, &config, Platform::Posix);

        assert_eq!(spec.env_value("HOSTNAME"), Some("test-hostname"));
        assert!(spec.env_value("PATH").is_some());
        assert_eq!(spec.hostname_file.as_deref(), Some("test-hostname\n"));
        assert_eq!(
            spec.mounts,
            vec![Mount::read_only(sb.hostname_file(), "/etc/hostname")]
        );
        assert_eq!(spec.argv, vec!["sh", "-c", "hostname && env"]);
        assert_eq!(spec.sandbox_id, *sb.id());
    }

    #[test]
    fn test_windows_injection() {
        let sb = sandbox(PodSandboxConfig::new("sandbox").with_hostname("test-hostname"));
        let config = ContainerConfig::new("test-container", "nanoserver");

        let spec = inject(&sb, &config, Platform::Windows);

        assert_eq!(spec.env_value("COMPUTERNAME"), Some("TEST-HOSTNAME"));
        assert!(spec.env_value("HOSTNAME").is_none());
        assert!(spec.hostname_file.is_none());
        assert!(spec.mounts.is_empty());
    }

    #[test]
    fn test_host_network_injection() {
        let sb = sandbox(PodSandboxConfig::new("sandbox").with_host_network());
        let spec = inject(&sb, &ContainerConfig::new("c", "busybox"), Platform::Posix);
        assert_eq!(spec.env_value("HOSTNAME"), Some("node-01"));
        assert_eq!(spec.network_mode, NetworkMode::HostNetwork);
        assert_eq!(spec.hostname_file.as_deref(), Some("node-01\n"));
    }

    #[test]
    fn test_user_env_takes_precedence() {
        let sb = sandbox(PodSandboxConfig::new("sandbox").with_hostname("test-hostname"));
        let config = ContainerConfig::new("c", "busybox")
            .with_env("HOSTNAME", "user-value")
            .with_env("FOO", "bar");

        let spec = inject(&sb, &config, Platform::Posix);

        assert_eq!(spec.env_value("HOSTNAME"), Some("user-value"));
        assert_eq!(
            spec.env.iter().filter(|e| e.key == "HOSTNAME").count(),
            1,
            "hostname key must appear once"
        );
        assert_eq!(spec.env_value("FOO"), Some("bar"));
    }

    #[test]
    fn test_user_env_precedence_is_case_insensitive_on_windows() {
        let sb = sandbox(PodSandboxConfig::new("sandbox").with_hostname("test-hostname"));
        let config = ContainerConfig::new("c", "nanoserver").with_env("ComputerName", "mine");

        let spec = inject(&sb, &config, Platform::Windows);

        assert_eq!(spec.env.len(), 1);
        assert_eq!(spec.env_value("COMPUTERNAME"), Some("mine"));
    }

    #[test]
    fn test_user_hostname_mount_is_kept() {
        let sb = sandbox(PodSandboxConfig::new("sandbox").with_hostname("test-hostname"));
        let config = ContainerConfig::new("c", "busybox")
            .with_mount(Mount::read_only("/srv/custom-hostname", "/etc/hostname"));

        let spec = inject(&sb, &config, Platform::Posix);

        assert_eq!(spec.mounts.len(), 1);
        assert_eq!(spec.mounts[0].host_path, PathBuf::from("/srv/custom-hostname"));
    }

    #[test]
    fn test_every_container_sees_same_hostname() {
        let sb = sandbox(PodSandboxConfig::new("sandbox"));
        let a = inject(&sb, &ContainerConfig::new("a", "busybox"), Platform::Posix);
        let b = inject(&sb, &ContainerConfig::new("b", "busybox"), Platform::Posix);
        assert_eq!(a.env_value("HOSTNAME"), b.env_value("HOSTNAME"));
        assert_eq!(a.hostname_file, b.hostname_file);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_mount_access_display() {
        assert_eq!(MountAccess::ReadOnly.to_string(), "ro");
        assert_eq!(MountAccess::ReadWrite.to_string(), "rw");
    }
}
