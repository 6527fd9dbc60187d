//! A backend that records what it is asked to do.
//!
//! [`RecordingBackend`] never creates namespaces or runs processes. Clones
//! share the same log, so a test can hand one clone to the runtime and keep
//! another to inspect afterwards.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use podhost_core::BoxFuture;
use podhost_core::backend::{BackendError, ContainerResult, NamespacePlan, SandboxBackend};
use podhost_core::container::ContainerSpec;
use podhost_core::sandbox::SandboxId;

#[derive(Default)]
struct Log {
    plans: Vec<NamespacePlan>,
    teardowns: Vec<SandboxId>,
    containers: Vec<ContainerSpec>,
    fail_setup: Option<String>,
}

/// Records namespace plans, teardowns, and container specs.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    log: Arc<Mutex<Log>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `setup_namespace` call fail with `message`.
    pub fn fail_setup(&self, message: &str) {
        self.lock().fail_setup = Some(message.to_string());
    }

    /// Namespace plans received, in call order.
    pub fn plans(&self) -> Vec<NamespacePlan> {
        self.lock().plans.clone()
    }

    /// Sandboxes torn down, in call order.
    pub fn teardowns(&self) -> Vec<SandboxId> {
        self.lock().teardowns.clone()
    }

    /// Container specs run, in call order.
    pub fn containers(&self) -> Vec<ContainerSpec> {
        self.lock().containers.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Log> {
        // A panicking test thread must not hide the log from the others.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SandboxBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn available(&self) -> bool {
        true
    }

    fn setup_namespace(&self, plan: &NamespacePlan) -> BoxFuture<'_, Result<(), BackendError>> {
        let plan = plan.clone();
        Box::pin(async move {
            let mut log = self.lock();
            if let Some(message) = &log.fail_setup {
                return Err(BackendError::Namespace(message.clone()));
            }
            tracing::debug!(sandbox_id = %plan.sandbox_id, "Recorded namespace plan");
            log.plans.push(plan);
            Ok(())
        })
    }

    fn teardown_namespace(
        &self,
        sandbox_id: &SandboxId,
    ) -> BoxFuture<'_, Result<(), BackendError>> {
        let sandbox_id = sandbox_id.clone();
        Box::pin(async move {
            self.lock().teardowns.push(sandbox_id);
            Ok(())
        })
    }

    fn run_container(
        &self,
        spec: &ContainerSpec,
    ) -> BoxFuture<'_, Result<ContainerResult, BackendError>> {
        let spec = spec.clone();
        Box::pin(async move {
            let stdout = spec
                .env_strings()
                .into_iter()
                .map(|line| line + "\n")
                .collect::<String>();
            self.lock().containers.push(spec);
            Ok(ContainerResult {
                exit_code: 0,
                stdout,
                stderr: String::new(),
                elapsed: Duration::ZERO,
            })
        })
    }
}
