//! Configuration builders for tests.

use podhost_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .backend("noop")
///     .platform("windows")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn root_dir(mut self, dir: &str) -> Self {
        self.config.runtime.root_dir = dir.to_string();
        self
    }

    pub fn backend(mut self, backend: &str) -> Self {
        self.config.runtime.backend = backend.to_string();
        self
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.config.runtime.platform = platform.to_string();
        self
    }

    pub fn unset_hostname(mut self, policy: &str) -> Self {
        self.config.runtime.unset_hostname = policy.to_string();
        self
    }

    pub fn docker_image(mut self, image: &str) -> Self {
        self.config.docker.image = image.to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
