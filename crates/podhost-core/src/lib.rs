#![deny(unsafe_code)]

//! Pod sandbox runtime core.
//!
//! Decides which hostname a pod sandbox and its containers observe, rejects
//! contradictory requests before any resources are allocated, and carries
//! the chosen hostname into every container's environment and
//! `/etc/hostname`.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future for async methods on
/// object-safe traits such as [`SandboxBackend`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Namespace and container execution backends.
pub mod backend;
/// Container environment and mount injection.
pub mod container;
/// Hostname resolution rules.
pub mod hostname;
/// Per-platform hostname conventions.
pub mod platform;
/// Sandbox lifecycle service.
pub mod runtime;
/// Sandbox configuration, validation, and state.
pub mod sandbox;

pub use backend::{BackendPreference, ContainerResult, SandboxBackend, select_backend};
pub use container::{ContainerConfig, ContainerSpec};
pub use hostname::{EffectiveHostname, HostInfo, HostnameError, NetworkMode, UnsetHostnamePolicy};
pub use platform::{EnvEntry, Platform};
pub use runtime::{RuntimeOptions, RuntimeService};
pub use sandbox::{PodSandbox, PodSandboxConfig, SandboxError, SandboxId, ValidatedSandbox};
