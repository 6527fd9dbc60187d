//! Pod sandbox configuration and validated sandbox state.
//!
//! A [`PodSandboxConfig`] is the declarative request. Calling
//! [`PodSandboxConfig::build`] validates it and resolves the effective
//! hostname, producing a [`ValidatedSandbox`]. That type has no public
//! constructor, so anything that allocates sandbox resources and takes a
//! `ValidatedSandbox` cannot run before validation has succeeded.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use serde::Serialize;
use tracing::debug;

use crate::backend::BackendError;
use crate::hostname::{
    self, EffectiveHostname, HostInfo, HostnameError, NetworkMode, UnsetHostnamePolicy,
};

/// Length of the short sandbox id used as a generated hostname.
const SHORT_ID_LEN: usize = 12;

/// Errors from sandbox creation and management.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error(transparent)]
    Hostname(#[from] HostnameError),

    #[error("invalid sandbox config: {0}")]
    InvalidConfig(String),

    #[error("failed to look up host hostname: {0}")]
    HostLookup(#[source] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("sandbox {0} is not ready")]
    NotReady(String),

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SandboxError {
    /// Whether this error is the hostname/network-mode contradiction.
    pub fn is_incompatible_hostname(&self) -> bool {
        matches!(
            self,
            SandboxError::Hostname(HostnameError::IncompatibleHostnameConfig { .. })
        )
    }
}

/// Unique sandbox identifier (32 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SandboxId(String);

impl SandboxId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first 12 characters, as used for generated hostnames.
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .nth(SHORT_ID_LEN)
            .map_or(&self.0[..], |(i, _)| &self.0[..i])
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SandboxId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Pod identity attached to a sandbox request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxMetadata {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub attempt: u32,
}

/// Declarative pod sandbox request.
#[derive(Debug, Clone)]
pub struct PodSandboxConfig {
    pub metadata: SandboxMetadata,
    /// Requested hostname. Empty is treated as unset.
    pub hostname: Option<String>,
    pub network_mode: NetworkMode,
    pub labels: BTreeMap<String, String>,
}

impl PodSandboxConfig {
    /// Create a sandbox request with the given pod name, in the `default`
    /// namespace, with its own network namespace.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            metadata: SandboxMetadata {
                uid: format!("{name}-uid"),
                name,
                namespace: "default".to_string(),
                attempt: 0,
            },
            hostname: None,
            network_mode: NetworkMode::Namespaced,
            labels: BTreeMap::new(),
        }
    }

    /// Builder: set the pod namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = namespace.into();
        self
    }

    /// Builder: set the pod uid.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.metadata.uid = uid.into();
        self
    }

    /// Builder: set the creation attempt counter.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.metadata.attempt = attempt;
        self
    }

    /// Builder: request a hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Builder: share the host's network namespace.
    pub fn with_host_network(mut self) -> Self {
        self.network_mode = NetworkMode::HostNetwork;
        self
    }

    /// Builder: set the network mode.
    pub fn with_network_mode(mut self, mode: NetworkMode) -> Self {
        self.network_mode = mode;
        self
    }

    /// Builder: add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Validate the request and resolve its effective hostname.
    ///
    /// The host's hostname is read from `host` only when the result depends
    /// on it. Nothing is allocated here, so a failure leaves no state behind.
    pub fn build(
        self,
        host: &dyn HostInfo,
        policy: UnsetHostnamePolicy,
    ) -> Result<ValidatedSandbox, SandboxError> {
        if self.metadata.name.is_empty() {
            return Err(SandboxError::InvalidConfig(
                "sandbox name must not be empty".to_string(),
            ));
        }
        if self.metadata.namespace.is_empty() {
            return Err(SandboxError::InvalidConfig(
                "sandbox namespace must not be empty".to_string(),
            ));
        }

        let id = SandboxId::generate();
        let requested = self.hostname.as_deref().filter(|h| !h.is_empty());
        let needs_host = match (self.network_mode, requested) {
            (NetworkMode::HostNetwork, None) => true,
            (NetworkMode::Namespaced, None) => policy == UnsetHostnamePolicy::Host,
            (_, Some(_)) => false,
        };
        let host_hostname = if needs_host {
            host.hostname().map_err(SandboxError::HostLookup)?
        } else {
            String::new()
        };
        let fallback = match policy {
            UnsetHostnamePolicy::SandboxId => id.short().to_string(),
            UnsetHostnamePolicy::Host => host_hostname.clone(),
        };

        let hostname = hostname::resolve(
            requested,
            self.network_mode,
            &host_hostname,
            &fallback,
        )?;

        debug!(
            sandbox_id = %id,
            pod = %self.metadata.name,
            network = %self.network_mode,
            hostname = %hostname,
            "Sandbox config validated"
        );

        Ok(ValidatedSandbox {
            id,
            metadata: self.metadata,
            network_mode: self.network_mode,
            labels: self.labels,
            hostname,
        })
    }
}

/// A sandbox request that passed validation, with its effective hostname.
#[derive(Debug, Clone)]
pub struct ValidatedSandbox {
    id: SandboxId,
    metadata: SandboxMetadata,
    network_mode: NetworkMode,
    labels: BTreeMap<String, String>,
    hostname: EffectiveHostname,
}

impl ValidatedSandbox {
    pub fn id(&self) -> &SandboxId {
        &self.id
    }

    pub fn metadata(&self) -> &SandboxMetadata {
        &self.metadata
    }

    pub fn network_mode(&self) -> NetworkMode {
        self.network_mode
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn hostname(&self) -> &EffectiveHostname {
        &self.hostname
    }
}

/// Sandbox readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxState {
    Ready,
    NotReady,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxState::Ready => write!(f, "ready"),
            SandboxState::NotReady => write!(f, "not-ready"),
        }
    }
}

/// A created pod sandbox.
///
/// Shared as `Arc<PodSandbox>`. Everything except the readiness state is
/// fixed at creation time.
#[derive(Debug)]
pub struct PodSandbox {
    spec: ValidatedSandbox,
    root_dir: PathBuf,
    hostname_file: PathBuf,
    created_at: SystemTime,
    state: RwLock<SandboxState>,
}

impl PodSandbox {
    pub(crate) fn new(spec: ValidatedSandbox, root_dir: PathBuf, hostname_file: PathBuf) -> Self {
        Self {
            spec,
            root_dir,
            hostname_file,
            created_at: SystemTime::now(),
            state: RwLock::new(SandboxState::Ready),
        }
    }

    pub fn id(&self) -> &SandboxId {
        self.spec.id()
    }

    pub fn metadata(&self) -> &SandboxMetadata {
        self.spec.metadata()
    }

    pub fn network_mode(&self) -> NetworkMode {
        self.spec.network_mode()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        self.spec.labels()
    }

    /// The sandbox's effective hostname.
    pub fn hostname(&self) -> &EffectiveHostname {
        self.spec.hostname()
    }

    /// Per-sandbox state directory on the host.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Host path of the rendered hostname file.
    pub fn hostname_file(&self) -> &Path {
        &self.hostname_file
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn state(&self) -> SandboxState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(SandboxState::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SandboxState::Ready
    }

    pub(crate) fn set_state(&self, state: SandboxState) {
        if let Ok(mut s) = self.state.write() {
            *s = state;
        }
    }

    /// Move from `from` to `to` atomically. Returns `false` if the sandbox
    /// was not in `from`.
    pub(crate) fn transition(&self, from: SandboxState, to: SandboxState) -> bool {
        match self.state.write() {
            Ok(mut s) if *s == from => {
                *s = to;
                true
            }
            _ => false,
        }
    }
}
