//! Runtime service: pod sandbox and container lifecycle around hostnames.
//!
//! Sandbox creation is strictly ordered:
//!
//! 1. validate the request and resolve the hostname ([`PodSandboxConfig::build`])
//! 2. allocate: sandbox directory, hostname file, network namespace
//! 3. publish the sandbox in the store
//!
//! A failure in step 1 returns before anything exists on disk or in the
//! backend. A failure in step 2 rolls back what was already allocated.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use podhost_config::AppConfig;

use crate::backend::{ContainerResult, NamespacePlan, SandboxBackend};
use crate::container::{ContainerConfig, ContainerId, ContainerSpec, inject};
use crate::hostname::{HostInfo, SystemHost, UnsetHostnamePolicy};
use crate::platform::Platform;
use crate::sandbox::{
    PodSandbox, PodSandboxConfig, SandboxError, SandboxId, SandboxState, ValidatedSandbox,
};

/// Name of the rendered hostname file inside each sandbox directory.
pub const HOSTNAME_FILE: &str = "hostname";

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// State directory; sandboxes live under `<root_dir>/sandboxes/<id>/`.
    pub root_dir: PathBuf,
    pub platform: Platform,
    pub unset_hostname: UnsetHostnamePolicy,
}

impl RuntimeOptions {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            platform: Platform::detect(),
            unset_hostname: UnsetHostnamePolicy::default(),
        }
    }

    /// Builder: set the container platform convention.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Builder: set the fallback for namespaced sandboxes without a hostname.
    pub fn with_unset_hostname(mut self, policy: UnsetHostnamePolicy) -> Self {
        self.unset_hostname = policy;
        self
    }

    /// Derive runtime options from a validated application config.
    pub fn from_config(config: &AppConfig) -> Result<Self, SandboxError> {
        let platform = config
            .runtime
            .platform
            .parse::<Platform>()
            .map_err(SandboxError::InvalidConfig)?;
        let unset_hostname = config
            .runtime
            .unset_hostname
            .parse::<UnsetHostnamePolicy>()
            .map_err(SandboxError::InvalidConfig)?;
        Ok(Self {
            root_dir: PathBuf::from(&config.runtime.root_dir),
            platform,
            unset_hostname,
        })
    }

    fn sandboxes_dir(&self) -> PathBuf {
        self.root_dir.join("sandboxes")
    }
}

struct ContainerRecord {
    spec: ContainerSpec,
}

/// The sandbox creation service.
pub struct RuntimeService {
    options: RuntimeOptions,
    backend: Box<dyn SandboxBackend>,
    host: Arc<dyn HostInfo>,
    sandboxes: RwLock<HashMap<SandboxId, Arc<PodSandbox>>>,
    containers: RwLock<HashMap<ContainerId, ContainerRecord>>,
}

impl RuntimeService {
    /// Create a runtime that reads the host hostname from the system.
    pub fn new(options: RuntimeOptions, backend: Box<dyn SandboxBackend>) -> Self {
        Self {
            options,
            backend,
            host: Arc::new(SystemHost),
            sandboxes: RwLock::new(HashMap::new()),
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// Builder: replace the host hostname source.
    pub fn with_host_info(mut self, host: Arc<dyn HostInfo>) -> Self {
        self.host = host;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Validate, allocate, and publish a new pod sandbox.
    pub async fn run_pod_sandbox(
        &self,
        config: PodSandboxConfig,
    ) -> Result<SandboxId, SandboxError> {
        let pod = config.metadata.name.clone();
        let validated = match config.build(self.host.as_ref(), self.options.unset_hostname) {
            Ok(v) => v,
            Err(e) => {
                warn!(pod = %pod, error = %e, "Rejected sandbox request");
                return Err(e);
            }
        };
        let sandbox = self.allocate(validated).await?;
        let id = sandbox.id().clone();

        info!(
            sandbox_id = %id,
            pod = %sandbox.metadata().name,
            network = %sandbox.network_mode(),
            hostname = %sandbox.hostname(),
            backend = self.backend.name(),
            "Pod sandbox created"
        );

        self.sandboxes.write().await.insert(id.clone(), sandbox);
        Ok(id)
    }

    /// Allocate on-disk and backend state for a validated sandbox.
    async fn allocate(
        &self,
        validated: ValidatedSandbox,
    ) -> Result<Arc<PodSandbox>, SandboxError> {
        let root = self.options.sandboxes_dir().join(validated.id().as_str());
        tokio::fs::create_dir_all(&root).await?;

        let hostname_file = root.join(HOSTNAME_FILE);
        let plan = NamespacePlan::for_sandbox(&validated);

        let result = async {
            tokio::fs::write(&hostname_file, format!("{}\n", validated.hostname())).await?;
            self.backend.setup_namespace(&plan).await?;
            Ok::<_, SandboxError>(())
        }
        .await;

        if let Err(e) = result {
            warn!(
                sandbox_id = %validated.id(),
                error = %e,
                "Sandbox allocation failed, rolling back"
            );
            if let Err(cleanup) = tokio::fs::remove_dir_all(&root).await {
                warn!(
                    path = %root.display(),
                    error = %cleanup,
                    "Failed to remove sandbox directory"
                );
            }
            return Err(e);
        }

        Ok(Arc::new(PodSandbox::new(validated, root, hostname_file)))
    }

    /// Look up a sandbox.
    pub async fn pod_sandbox(&self, id: &SandboxId) -> Option<Arc<PodSandbox>> {
        self.sandboxes.read().await.get(id).cloned()
    }

    /// All sandboxes, oldest first.
    pub async fn list_pod_sandboxes(&self) -> Vec<Arc<PodSandbox>> {
        let mut all: Vec<_> = self.sandboxes.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.created_at());
        all
    }

    /// Materialize a container inside a ready sandbox.
    pub async fn create_container(
        &self,
        sandbox_id: &SandboxId,
        config: ContainerConfig,
    ) -> Result<ContainerSpec, SandboxError> {
        let sandbox = self
            .pod_sandbox(sandbox_id)
            .await
            .ok_or_else(|| SandboxError::NotFound(format!("sandbox {sandbox_id}")))?;
        if !sandbox.is_ready() {
            return Err(SandboxError::NotReady(sandbox_id.to_string()));
        }

        let platform = config.platform.unwrap_or(self.options.platform);
        let spec = inject(&sandbox, &config, platform);

        // Holding the container map across the re-check orders this insert
        // against the eviction in `remove_pod_sandbox`.
        let mut containers = self.containers.write().await;
        let still_ready = self
            .sandboxes
            .read()
            .await
            .get(sandbox_id)
            .is_some_and(|s| s.is_ready());
        if !still_ready {
            return Err(SandboxError::NotReady(sandbox_id.to_string()));
        }
        containers.insert(spec.id.clone(), ContainerRecord { spec: spec.clone() });
        drop(containers);

        info!(
            sandbox_id = %sandbox_id,
            container_id = %spec.id,
            container = %spec.name,
            "Container created"
        );
        Ok(spec)
    }

    /// Look up a created container.
    pub async fn container(&self, id: &ContainerId) -> Option<ContainerSpec> {
        self.containers.read().await.get(id).map(|r| r.spec.clone())
    }

    /// Run a created container to completion through the backend.
    pub async fn start_container(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerResult, SandboxError> {
        let spec = self
            .container(id)
            .await
            .ok_or_else(|| SandboxError::NotFound(format!("container {id}")))?;
        let sandbox = self
            .pod_sandbox(&spec.sandbox_id)
            .await
            .ok_or_else(|| SandboxError::NotFound(format!("sandbox {}", spec.sandbox_id)))?;
        if !sandbox.is_ready() {
            return Err(SandboxError::NotReady(spec.sandbox_id.to_string()));
        }

        let result = self.backend.run_container(&spec).await?;
        info!(
            container_id = %id,
            exit_code = result.exit_code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Container exited"
        );
        Ok(result)
    }

    /// Stop a sandbox and tear down its namespace. Stopping twice is a no-op.
    pub async fn stop_pod_sandbox(&self, id: &SandboxId) -> Result<(), SandboxError> {
        let Some(sandbox) = self.pod_sandbox(id).await else {
            return Err(SandboxError::NotFound(format!("sandbox {id}")));
        };
        if !sandbox.transition(SandboxState::Ready, SandboxState::NotReady) {
            return Ok(());
        }
        if let Err(e) = self.backend.teardown_namespace(id).await {
            sandbox.set_state(SandboxState::Ready);
            return Err(e.into());
        }
        info!(sandbox_id = %id, "Pod sandbox stopped");
        Ok(())
    }

    /// Remove a sandbox, its containers, and its directory.
    ///
    /// Removing an unknown sandbox succeeds.
    pub async fn remove_pod_sandbox(&self, id: &SandboxId) -> Result<(), SandboxError> {
        let Some(sandbox) = self.pod_sandbox(id).await else {
            return Ok(());
        };
        if sandbox.is_ready() {
            self.stop_pod_sandbox(id).await?;
        }

        self.containers
            .write()
            .await
            .retain(|_, record| record.spec.sandbox_id != *id);

        match tokio::fs::remove_dir_all(sandbox.root_dir()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.sandboxes.write().await.remove(id);
        info!(sandbox_id = %id, "Pod sandbox removed");
        Ok(())
    }
}
