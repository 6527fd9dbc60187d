//! Docker container backend.
//!
//! Translates a [`ContainerSpec`] into a `docker run` invocation. Docker
//! creates one network namespace per container, so sandbox namespace setup
//! is recorded and applied when each container starts:
//!
//! | Network mode | Docker flags |
//! |--------------|--------------|
//! | `Namespaced` | `--network none --hostname <h>` |
//! | `HostNetwork` | `--network host` (no `--hostname`) |
//!
//! The merged environment goes in as `-e KEY=VALUE` and the hostname file as
//! a read-only `-v` bind mount.

use std::path::PathBuf;

use crate::BoxFuture;
use crate::container::{ContainerSpec, MountAccess};
use crate::hostname::NetworkMode;
use crate::sandbox::SandboxId;

use super::{BackendError, ContainerResult, NamespacePlan, SandboxBackend};

/// Docker CLI backend.
pub struct DockerBackend {
    /// Docker CLI binary path.
    docker_bin: PathBuf,
    /// Image used when a container spec leaves the image empty.
    default_image: String,
}

impl DockerBackend {
    pub fn new(docker_bin: impl Into<PathBuf>, default_image: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            default_image: default_image.into(),
        }
    }

    pub fn from_config(config: &podhost_config::DockerConfig) -> Self {
        Self::new(&config.binary, &config.image)
    }

    /// Build the `docker run` argument list for a container spec.
    fn build_args(&self, spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];

        match spec.network_mode {
            NetworkMode::Namespaced => {
                args.extend(["--network".to_string(), "none".to_string()]);
                args.extend(["--hostname".to_string(), spec.hostname.to_string()]);
            }
            NetworkMode::HostNetwork => {
                args.extend(["--network".to_string(), "host".to_string()]);
            }
        }

        if let Some(dir) = &spec.working_dir {
            args.extend(["--workdir".to_string(), dir.to_string_lossy().to_string()]);
        }

        for entry in &spec.env {
            args.extend(["-e".to_string(), entry.to_string()]);
        }

        for mount in &spec.mounts {
            let ro_flag = match mount.access {
                MountAccess::ReadOnly => ":ro",
                MountAccess::ReadWrite => "",
            };
            args.extend([
                "-v".to_string(),
                format!(
                    "{}:{}{}",
                    mount.host_path.display(),
                    mount.container_path.display(),
                    ro_flag
                ),
            ]);
        }

        args.extend([
            "--label".to_string(),
            format!("podhost.sandbox={}", spec.sandbox_id),
        ]);
        args.extend([
            "--label".to_string(),
            format!("podhost.container={}", spec.name),
        ]);

        let image = if spec.image.is_empty() {
            self.default_image.clone()
        } else {
            spec.image.clone()
        };
        args.push(image);

        args.extend(spec.argv.iter().cloned());

        args
    }
}

impl Default for DockerBackend {
    fn default() -> Self {
        Self::from_config(&podhost_config::DockerConfig::default())
    }
}

impl SandboxBackend for DockerBackend {
    fn name(&self) -> &str {
        "docker"
    }

    fn available(&self) -> bool {
        std::process::Command::new(&self.docker_bin)
            .arg("version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn setup_namespace(&self, plan: &NamespacePlan) -> BoxFuture<'_, Result<(), BackendError>> {
        let plan = plan.clone();
        Box::pin(async move {
            tracing::info!(
                backend = "docker",
                sandbox_id = %plan.sandbox_id,
                network = %plan.network_mode,
                hostname = ?plan.hostname.as_ref().map(|h| h.as_str()),
                "Network namespace deferred to container start"
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
            tracing::debug!(
                backend = "docker",
                sandbox_id = %sandbox_id,
                "Containers run with --rm"
            );
            Ok(())
        })
    }

    fn run_container(
        &self,
        spec: &ContainerSpec,
    ) -> BoxFuture<'_, Result<ContainerResult, BackendError>> {
        let args = self.build_args(spec);
        let timeout = spec.timeout;
        let name = spec.name.clone();
        let docker_bin = self.docker_bin.clone();

        Box::pin(async move {
            tracing::info!(
                backend = "docker",
                container = %name,
                args = ?args,
                "Starting Docker container"
            );

            let start = std::time::Instant::now();

            let child = tokio::process::Command::new(&docker_bin)
                .args(&args)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| BackendError::Execution(format!("failed to spawn docker: {e}")))?;

            let output = match timeout {
                Some(dur) => match tokio::time::timeout(dur, child.wait_with_output()).await {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        return Err(BackendError::Execution(format!("docker wait failed: {e}")));
                    }
                    Err(_) => {
                        return Err(BackendError::Timeout(dur));
                    }
                },
                None => child
                    .wait_with_output()
                    .await
                    .map_err(|e| BackendError::Execution(format!("docker wait failed: {e}")))?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ContainerConfig, inject};
    use crate::hostname::{StaticHost, UnsetHostnamePolicy};
    use crate::platform::Platform;
    use crate::sandbox::{PodSandbox, PodSandboxConfig};

    fn spec_for(config: PodSandboxConfig, container: ContainerConfig) -> ContainerSpec {
        let validated = config
            .build(&StaticHost::new("node-01"), UnsetHostnamePolicy::default())
            .unwrap();
        let root = PathBuf::from("/var/lib/podhost/sandboxes").join(validated.id().as_str());
        let file = root.join("hostname");
        let sandbox = PodSandbox::new(validated, root, file);
        inject(&sandbox, &container, Platform::Posix)
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let idx = args.iter().position(|a| a == flag)?;
        args.get(idx + 1).map(String::as_str)
    }

    #[test]
    fn test_docker_backend_name() {
        let backend = DockerBackend::default();
        assert_eq!(backend.name(), "docker");
        assert_eq!(backend.default_image, "busybox:latest");
    }

    #[test]
    fn test_build_args_namespaced() {
        let backend = DockerBackend::default();
        let spec = spec_for(
            PodSandboxConfig::new("sandbox").with_hostname("test-hostname"),
            ContainerConfig::new("test-container", "busybox")
                .with_command(["sh", "-c", "hostname"]),
        );

        let args = backend.build_args(&spec);

        assert_eq!(flag_value(&args, "--network"), Some("none"));
        assert_eq!(flag_value(&args, "--hostname"), Some("test-hostname"));
        assert!(args.contains(&"HOSTNAME=test-hostname".to_string()));
        assert!(
            args.iter()
                .any(|a| a.ends_with("/hostname:/etc/hostname:ro"))
        );
        assert_eq!(&args[args.len() - 4..], ["busybox", "sh", "-c", "hostname"]);
    }

    #[test]
    fn test_build_args_host_network_skips_hostname_flag() {
        let backend = DockerBackend::default();
        let spec = spec_for(
            PodSandboxConfig::new("sandbox").with_host_network(),
            ContainerConfig::new("test-container", "busybox").with_command(["env"]),
        );

        let args = backend.build_args(&spec);

        assert_eq!(flag_value(&args, "--network"), Some("host"));
        assert!(!args.contains(&"--hostname".to_string()));
        assert!(args.contains(&"HOSTNAME=node-01".to_string()));
    }

    #[test]
    fn test_build_args_labels_and_default_image() {
        let backend = DockerBackend::new("docker", "alpine:3.20");
        let spec = spec_for(
            PodSandboxConfig::new("sandbox"),
            ContainerConfig::new("worker", "").with_working_dir("/work"),
        );

        let args = backend.build_args(&spec);

        assert!(
            args.iter()
                .any(|a| *a == format!("podhost.sandbox={}", spec.sandbox_id))
        );
        assert!(args.iter().any(|a| a == "podhost.container=worker"));
        assert_eq!(flag_value(&args, "--workdir"), Some("/work"));
        assert_eq!(args.last().map(String::as_str), Some("alpine:3.20"));
    }

    #[test]
    fn test_build_args_user_mounts() {
        use crate::container::Mount;

        let backend = DockerBackend::default();
        let spec = spec_for(
            PodSandboxConfig::new("sandbox"),
            ContainerConfig::new("c", "busybox")
                .with_mount(Mount::read_write("/srv/data", "/data"))
                .with_mount(Mount::read_only("/srv/cfg", "/etc/app")),
        );

        let args = backend.build_args(&spec);

        assert!(args.contains(&"/srv/data:/data".to_string()));
        assert!(args.contains(&"/srv/cfg:/etc/app:ro".to_string()));
    }

    #[test]
    fn test_unavailable_docker_binary() {
        let backend = DockerBackend::new("/nonexistent/docker", "busybox");
        assert!(!backend.available());
    }
}
