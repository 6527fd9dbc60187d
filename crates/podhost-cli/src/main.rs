#![deny(unsafe_code)]

//! podhost CLI: resolve hostnames and run containers in pod sandboxes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use podhost_config::AppConfig;
use podhost_core::backend::{BackendPreference, select_backend};
use podhost_core::container::{ContainerConfig, Mount};
use podhost_core::hostname::{SystemHost, UnsetHostnamePolicy};
use podhost_core::platform::Platform;
use podhost_core::runtime::{RuntimeOptions, RuntimeService};
use podhost_core::sandbox::PodSandboxConfig;

/// podhost: pod sandbox hostname runtime.
#[derive(Parser)]
#[command(name = "podhost", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "podhost.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the hostname a sandbox would get, without creating it.
    Resolve {
        /// Requested sandbox hostname.
        #[arg(long)]
        hostname: Option<String>,

        /// Share the host's network namespace.
        #[arg(long)]
        host_network: bool,

        /// Container platform ("posix" or "windows"); defaults to config.
        #[arg(long)]
        platform: Option<String>,
    },

    /// Create a sandbox, run one container in it, then remove the sandbox.
    Run {
        /// Sandbox name.
        #[arg(long, default_value = "podhost")]
        name: String,

        /// Requested sandbox hostname.
        #[arg(long)]
        hostname: Option<String>,

        /// Share the host's network namespace.
        #[arg(long)]
        host_network: bool,

        /// Extra container environment (KEY=VALUE), repeatable.
        #[arg(short, long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,

        /// Bind mount (HOST:CONTAINER[:ro|:rw]), repeatable.
        #[arg(short, long = "mount", value_parser = parse_mount)]
        mount: Vec<Mount>,

        /// Container image (docker backend).
        #[arg(long, default_value = "")]
        image: String,

        /// Command and arguments to run.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,

        /// Print as JSON instead of TOML.
        #[arg(long, requires = "show")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Resolve {
            hostname,
            host_network,
            platform,
        } => cmd_resolve(&config, hostname, host_network, platform.as_deref())?,
        Commands::Run {
            name,
            hostname,
            host_network,
            env,
            mount,
            image,
            command,
        } => {
            let mut sandbox = PodSandboxConfig::new(name);
            if let Some(h) = hostname {
                sandbox = sandbox.with_hostname(h);
            }
            if host_network {
                sandbox = sandbox.with_host_network();
            }
            let mut container = ContainerConfig::new("main", image).with_command(command);
            for (key, value) in env {
                container = container.with_env(key, value);
            }
            for m in mount {
                container = container.with_mount(m);
            }
            cmd_run(&config, sandbox, container).await?
        }
        Commands::Config { show, json } => cmd_config(&cli.config, &config, show, json)?,
    }

    Ok(())
}

fn cmd_resolve(
    config: &AppConfig,
    hostname: Option<String>,
    host_network: bool,
    platform: Option<&str>,
) -> Result<()> {
    let platform: Platform = platform
        .unwrap_or(&config.runtime.platform)
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let policy: UnsetHostnamePolicy = config
        .runtime
        .unset_hostname
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut request = PodSandboxConfig::new("resolve");
    if let Some(h) = hostname {
        request = request.with_hostname(h);
    }
    if host_network {
        request = request.with_host_network();
    }

    let sandbox = request.build(&SystemHost, policy)?;
    let entry = platform.format(sandbox.hostname());

    println!("network:  {}", sandbox.network_mode());
    println!("hostname: {}", sandbox.hostname());
    println!("env:      {entry}");
    match (
        platform.hostname_file_path(),
        platform.render_hostname_file(sandbox.hostname()),
    ) {
        (Some(path), Some(content)) => println!("file:     {path} = {content:?}"),
        _ => println!("file:     (none on {platform})"),
    }
    Ok(())
}

async fn cmd_run(
    config: &AppConfig,
    sandbox: PodSandboxConfig,
    container: ContainerConfig,
) -> Result<()> {
    let options = RuntimeOptions::from_config(config)?;
    let preference: BackendPreference = config
        .runtime
        .backend
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let runtime = RuntimeService::new(options, select_backend(preference, &config.docker));
    info!(backend = runtime.backend_name(), "Runtime ready");

    let id = runtime.run_pod_sandbox(sandbox).await?;
    let outcome = async {
        let spec = runtime.create_container(&id, container).await?;
        runtime.start_container(&spec.id).await
    }
    .await;

    if let Err(e) = runtime.remove_pod_sandbox(&id).await {
        tracing::warn!(sandbox_id = %id, error = %e, "Failed to remove sandbox");
    }

    let result = outcome?;
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    if !result.success() {
        anyhow::bail!("container exited with code {}", result.exit_code);
    }
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool, json: bool) -> Result<()> {
    if show && json {
        println!("{}", config.to_json()?);
    } else if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        AppConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}

/// Parse a `KEY=VALUE` pair; the value may itself contain `=`.
fn parse_env(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

/// Parse `HOST:CONTAINER[:ro|:rw]`; mounts are read-write unless `:ro`.
fn parse_mount(s: &str) -> Result<Mount, String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [host, guest] if !host.is_empty() && !guest.is_empty() => {
            Ok(Mount::read_write(*host, *guest))
        }
        [host, guest, "ro"] if !host.is_empty() && !guest.is_empty() => {
            Ok(Mount::read_only(*host, *guest))
        }
        [host, guest, "rw"] if !host.is_empty() && !guest.is_empty() => {
            Ok(Mount::read_write(*host, *guest))
        }
        _ => Err(format!("expected HOST:CONTAINER[:ro|:rw], got {s:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_env() {
        assert_eq!(
            parse_env("HOSTNAME=override").unwrap(),
            ("HOSTNAME".to_string(), "override".to_string())
        );
        assert_eq!(
            parse_env("OPTS=a=b").unwrap(),
            ("OPTS".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_env("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
        assert!(parse_env("novalue").is_err());
        assert!(parse_env("=value").is_err());
    }

    #[test]
    fn test_parse_mount() {
        use podhost_core::container::MountAccess;

        let m = parse_mount("/srv/data:/data").unwrap();
        assert_eq!(m.host_path, PathBuf::from("/srv/data"));
        assert_eq!(m.container_path, PathBuf::from("/data"));
        assert_eq!(m.access, MountAccess::ReadWrite);

        let m = parse_mount("/srv/cfg:/etc/app:ro").unwrap();
        assert_eq!(m.access, MountAccess::ReadOnly);
        assert_eq!(parse_mount("/a:/b:rw").unwrap().access, MountAccess::ReadWrite);

        assert!(parse_mount("/only-host").is_err());
        assert!(parse_mount(":/data").is_err());
        assert!(parse_mount("/a:/b:rx").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "podhost",
            "run",
            "--hostname",
            "test-hostname",
            "-e",
            "FOO=bar",
            "-m",
            "/srv/data:/data:ro",
            "--",
            "sh",
            "-c",
            "hostname",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                hostname,
                host_network,
                env,
                mount,
                command,
                ..
            } => {
                assert_eq!(hostname.as_deref(), Some("test-hostname"));
                assert!(!host_network);
                assert_eq!(env, vec![("FOO".to_string(), "bar".to_string())]);
                assert_eq!(mount, vec![Mount::read_only("/srv/data", "/data")]);
                assert_eq!(command, vec!["sh", "-c", "hostname"]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_run_requires_command() {
        assert!(Cli::try_parse_from(["podhost", "run"]).is_err());
    }

    #[test]
    fn test_resolve_rejects_host_network_with_hostname() {
        let err = cmd_resolve(
            &AppConfig::default(),
            Some("test-hostname".to_string()),
            true,
            Some("posix"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("host network mode"));
    }

    #[test]
    fn test_resolve_namespaced_hostname() {
        cmd_resolve(
            &AppConfig::default(),
            Some("test-hostname".to_string()),
            false,
            Some("windows"),
        )
        .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.runtime.backend, "auto");
    }

    #[tokio::test]
    async fn test_load_config_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("podhost.toml");
        std::fs::write(&path, "[runtime]\nbackend = \"noop\"\n").unwrap();
        let config = load_config(&path).await.unwrap();
        assert_eq!(config.runtime.backend, "noop");
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("podhost.toml");
        std::fs::write(&path, "[runtime]\nbackend = \"vz\"\n").unwrap();
        assert!(load_config(&path).await.is_err());
    }
}
