//! Sandbox backends: network namespace setup and container execution.
//!
//! The hostname logic in this crate decides *what* a sandbox and its
//! containers should see. A [`SandboxBackend`] is the boundary to the
//! machinery that makes it so:
//!
//! ```text
//! PodSandboxConfig ──build()──▶ ValidatedSandbox
//!                                    │
//!                     RuntimeService::run_pod_sandbox
//!                                    │ NamespacePlan
//!                                    ▼
//!                     SandboxBackend::setup_namespace
//!                                    │
//!       container::inject ──▶ ContainerSpec
//!                                    │
//!                                    ▼
//!                     SandboxBackend::run_container
//! ```

mod docker;
mod noop;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::BoxFuture;
use crate::container::ContainerSpec;
use crate::hostname::{EffectiveHostname, NetworkMode};
use crate::sandbox::{SandboxId, ValidatedSandbox};

pub use docker::DockerBackend;
pub use noop::NoopBackend;

/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("namespace setup failed: {0}")]
    Namespace(String),

    #[error("container execution failed: {0}")]
    Execution(String),

    #[error("container timeout after {0:?}")]
    Timeout(Duration),
}

/// Instructions for setting up a sandbox's network namespace.
///
/// `hostname` is only present for namespaced sandboxes. A host-network
/// sandbox shares the host's UTS namespace, so there is nothing to set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePlan {
    pub sandbox_id: SandboxId,
    pub network_mode: NetworkMode,
    pub hostname: Option<EffectiveHostname>,
}

impl NamespacePlan {
    /// Derive the plan for a validated sandbox.
    pub fn for_sandbox(sandbox: &ValidatedSandbox) -> Self {
        let hostname = match sandbox.network_mode() {
            NetworkMode::Namespaced => Some(sandbox.hostname().clone()),
            NetworkMode::HostNetwork => None,
        };
        Self {
            sandbox_id: sandbox.id().clone(),
            network_mode: sandbox.network_mode(),
            hostname,
        }
    }
}

/// Outcome of running a container.
#[derive(Debug, Clone)]
pub struct ContainerResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ContainerResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Platform-specific sandbox backend.
pub trait SandboxBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "noop", "docker").
    fn name(&self) -> &str;

    /// Whether this backend can be used on the current machine.
    fn available(&self) -> bool;

    /// Create the sandbox's network namespace according to `plan`.
    fn setup_namespace(&self, plan: &NamespacePlan) -> BoxFuture<'_, Result<(), BackendError>>;

    /// Release whatever [`setup_namespace`](Self::setup_namespace) created.
    fn teardown_namespace(
        &self,
        sandbox_id: &SandboxId,
    ) -> BoxFuture<'_, Result<(), BackendError>>;

    /// Run a materialized container to completion.
    fn run_container(
        &self,
        spec: &ContainerSpec,
    ) -> BoxFuture<'_, Result<ContainerResult, BackendError>>;
}

/// Backend preference from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Docker if its CLI responds, otherwise noop.
    #[default]
    Auto,
    Docker,
    Noop,
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPreference::Auto => write!(f, "auto"),
            BackendPreference::Docker => write!(f, "docker"),
            BackendPreference::Noop => write!(f, "noop"),
        }
    }
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(BackendPreference::Auto),
            "docker" => Ok(BackendPreference::Docker),
            "noop" => Ok(BackendPreference::Noop),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

/// Pick a backend for the given preference.
pub fn select_backend(
    preference: BackendPreference,
    docker: &podhost_config::DockerConfig,
) -> Box<dyn SandboxBackend> {
    match preference {
        BackendPreference::Docker => Box::new(DockerBackend::from_config(docker)),
        BackendPreference::Noop => Box::new(NoopBackend),
        BackendPreference::Auto => {
            let backend = DockerBackend::from_config(docker);
            if backend.available() {
                Box::new(backend)
            } else {
                tracing::warn!("Docker not available, falling back to noop backend");
                Box::new(NoopBackend)
            }
        }
    }
}
