//! No-op (development) backend.
//!
//! Creates no namespaces and runs container commands directly on the host,
//! with a clean environment built from the container spec. Bind mounts are
//! not possible here, so the hostname file's host path is handed to the
//! process in `PODHOST_HOSTNAME_FILE` instead. **Never use in production.**

use std::path::Path;

use crate::BoxFuture;
use crate::container::ContainerSpec;
use crate::sandbox::SandboxId;

use super::{BackendError, ContainerResult, NamespacePlan, SandboxBackend};

/// Environment variable pointing at the hostname file on the host.
pub const HOSTNAME_FILE_ENV: &str = "PODHOST_HOSTNAME_FILE";

/// No-op backend for development and testing.
pub struct NoopBackend;

impl SandboxBackend for NoopBackend {
    fn name(&self) -> &str {
        "noop"
    }

    fn available(&self) -> bool {
        true
    }

    fn setup_namespace(&self, plan: &NamespacePlan) -> BoxFuture<'_, Result<(), BackendError>> {
        let plan = plan.clone();
        Box::pin(async move {
            tracing::warn!(
                backend = "noop",
                sandbox_id = %plan.sandbox_id,
                network = %plan.network_mode,
                hostname = ?plan.hostname.as_ref().map(|h| h.as_str()),
                "Skipping namespace setup (development mode)"
            );
            Ok(())
        })
    }

    fn teardown_namespace(
        &self,
        sandbox_id: &SandboxId,
    ) -> BoxFuture<'_, Result<(), BackendError>> {
        let sandbox_id = sandbox_id.clone();
        Box::pin(async move {
            tracing::debug!(backend = "noop", sandbox_id = %sandbox_id, "Nothing to tear down");
            Ok(())
        })
    }

    fn run_container(
        &self,
        spec: &ContainerSpec,
    ) -> BoxFuture<'_, Result<ContainerResult, BackendError>> {
        let spec = spec.clone();

        Box::pin(async move {
            tracing::warn!(
                backend = "noop",
                container = %spec.name,
                sandbox_id = %spec.sandbox_id,
                "Running container WITHOUT isolation (development mode)"
            );

            let Some((program, args)) = spec.argv.split_first() else {
                return Err(BackendError::Execution(
                    "command must not be empty".to_string(),
                ));
            };

            let start = std::time::Instant::now();

            let mut proc = tokio::process::Command::new(program);
            proc.args(args)
                .env_clear()
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true);

            if let Some(dir) = &spec.working_dir {
                proc.current_dir(dir);
            }
            for entry in &spec.env {
                proc.env(&entry.key, &entry.value);
            }
            if let Some(guest) = spec.platform.hostname_file_path() {
                if let Some(mount) = spec
                    .mounts
                    .iter()
                    .find(|m| m.container_path.as_path() == Path::new(guest))
                {
                    proc.env(HOSTNAME_FILE_ENV, &mount.host_path);
                }
            }

            let child = proc
                .spawn()
                .map_err(|e| BackendError::Execution(format!("spawn failed: {e}")))?;

            let output = match spec.timeout {
                Some(dur) => match tokio::time::timeout(dur, child.wait_with_output()).await {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        return Err(BackendError::Execution(format!("wait failed: {e}")));
                    }
                    Err(_) => {
                        return Err(BackendError::Timeout(dur));
                    }
                },
                None => child
                    .wait_with_output()
                    .await
                    .map_err(|e| BackendError::Execution(format!("wait failed: {e}")))?,
            };

            Ok(ContainerResult {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                elapsed: start.elapsed(),
            })
        })
    }
}
