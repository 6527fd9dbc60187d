//! Runtime fixtures.
//!
//! [`TestRuntime`] wires a [`RuntimeService`] to a [`RecordingBackend`], a
//! temporary state directory, and a fixed host hostname.

use std::path::Path;
use std::sync::Arc;

use podhost_config::AppConfig;
use podhost_core::hostname::StaticHost;
use podhost_core::platform::Platform;
use podhost_core::runtime::{RuntimeOptions, RuntimeService};
use tempfile::TempDir;

use crate::backend::RecordingBackend;

/// Host hostname reported to every [`TestRuntime`].
pub const TEST_HOST_HOSTNAME: &str = "node-01";

/// A test-scoped runtime with an owned temp directory.
///
/// The directory is removed when this value is dropped.
pub struct TestRuntime {
    pub runtime: RuntimeService,
    pub backend: RecordingBackend,
    temp_dir: TempDir,
}

impl TestRuntime {
    /// POSIX runtime reporting [`TEST_HOST_HOSTNAME`] as the host hostname.
    pub fn new() -> Self {
        Self::with_platform(Platform::Posix)
    }

    pub fn with_platform(platform: Platform) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let options = RuntimeOptions::new(temp_dir.path()).with_platform(platform);
        Self::build(options, temp_dir)
    }

    /// Runtime configured from `config`, with its root moved into a temp dir.
    pub fn with_config(config: &AppConfig) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let mut options = RuntimeOptions::from_config(config).expect("invalid runtime config");
        options.root_dir = temp_dir.path().to_path_buf();
        Self::build(options, temp_dir)
    }

    fn build(options: RuntimeOptions, temp_dir: TempDir) -> Self {
        let backend = RecordingBackend::new();
        let runtime = RuntimeService::new(options, Box::new(backend.clone()))
            .with_host_info(Arc::new(StaticHost::new(TEST_HOST_HOSTNAME)));
        Self {
            runtime,
            backend,
            temp_dir,
        }
    }

    /// Root of the runtime's state directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory holding per-sandbox state.
    pub fn sandboxes_dir(&self) -> std::path::PathBuf {
        self.root().join("sandboxes")
    }
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}
