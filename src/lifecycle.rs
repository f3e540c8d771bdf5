//! Service lifecycle management
//!
//! Install, uninstall, and query tipster as a systemd system service so the
//! appliance starts at boot without anyone logging in. Installing needs root.

use std::path::PathBuf;

use crate::{Error, Result};

/// Unit name used with systemctl
pub const SERVICE_NAME: &str = "tipster";

/// Directory for locally installed system units
const UNIT_DIR: &str = "/etc/systemd/system";

/// Service status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Service is running
    Running,
    /// Service is installed but not running
    Stopped,
    /// Service is not installed
    NotInstalled,
    /// Status could not be determined
    Unknown(String),
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::NotInstalled => write!(f, "not installed"),
            Self::Unknown(msg) => write!(f, "unknown ({msg})"),
        }
    }
}

/// Service configuration
pub struct ServiceConfig {
    /// Path to the tipster binary
    pub binary_path: PathBuf,
    /// Config file passed with `--config`
    pub config_path: Option<PathBuf>,
    /// Account to run as instead of root
    pub user: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("tipster"),
            config_path: None,
            user: None,
        }
    }
}

/// Render the systemd unit for `config`
#[must_use]
pub fn render_unit(config: &ServiceConfig) -> String {
    let mut exec = config.binary_path.display().to_string();
    if let Some(path) = &config.config_path {
        exec.push_str(&format!(" --config {}", path.display()));
    }

    // GPIO and ALSA devices are group-owned on Raspberry Pi OS
    let account = config
        .user
        .as_deref()
        .map(|user| format!("User={user}\nSupplementaryGroups=gpio audio\n"))
        .unwrap_or_default();

    format!(
        r"[Unit]
Description=Tipster button appliance
After=sound.target network-online.target
Wants=network-online.target

[Service]
Type=simple
{account}ExecStart={exec}
Restart=on-failure
RestartSec=5
Environment=RUST_LOG=info

[Install]
WantedBy=multi-user.target
"
    )
}

/// Install tipster as a system service
///
/// # Errors
///
/// Returns error if service installation fails
pub fn install_service(config: &ServiceConfig) -> Result<()> {
    #[cfg(target_os = "linux")]
    return install_systemd(config);

    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        Err(Error::Config(
            "service installation not supported on this platform".to_string(),
        ))
    }
}

/// Uninstall the tipster system service
///
/// # Errors
///
/// Returns error if service removal fails
pub fn uninstall_service() -> Result<()> {
    #[cfg(target_os = "linux")]
    return uninstall_systemd();

    #[cfg(not(target_os = "linux"))]
    Err(Error::Config(
        "service management not supported on this platform".to_string(),
    ))
}

/// Query tipster service status
///
/// # Errors
///
/// Returns error if status cannot be determined
pub fn service_status() -> Result<ServiceStatus> {
    #[cfg(target_os = "linux")]
    return systemd_status();

    #[cfg(not(target_os = "linux"))]
    Ok(ServiceStatus::Unknown("platform not supported".to_string()))
}

/// Path of the installed unit file
#[must_use]
pub fn service_file_path() -> PathBuf {
    PathBuf::from(UNIT_DIR).join(format!("{SERVICE_NAME}.service"))
}

#[cfg(target_os = "linux")]
fn install_systemd(config: &ServiceConfig) -> Result<()> {
    let path = service_file_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&path, render_unit(config)).map_err(|e| {
        Error::Config(format!(
            "cannot write {} (run install as root): {e}",
            path.display()
        ))
    })?;

    run_systemctl(&["daemon-reload"])?;
    run_systemctl(&["enable", "--now", SERVICE_NAME])?;

    tracing::info!(path = %path.display(), "installed systemd service");
    Ok(())
}

#[cfg(target_os = "linux")]
fn uninstall_systemd() -> Result<()> {
    if let Err(e) = run_systemctl(&["disable", "--now", SERVICE_NAME]) {
        tracing::debug!(error = %e, "disable failed, removing unit anyway");
    }

    let path = service_file_path();
    if path.exists() {
        std::fs::remove_file(&path)?;
        let _ = run_systemctl(&["daemon-reload"]);
        tracing::info!("uninstalled systemd service");
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn systemd_status() -> Result<ServiceStatus> {
    if !service_file_path().exists() {
        return Ok(ServiceStatus::NotInstalled);
    }

    let output = std::process::Command::new("systemctl")
        .args(["is-active", SERVICE_NAME])
        .output()
        .map_err(|e| Error::Config(format!("failed to run systemctl: {e}")))?;

    Ok(parse_is_active(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_is_active(stdout: &str) -> ServiceStatus {
    match stdout.trim() {
        "active" | "activating" | "reloading" => ServiceStatus::Running,
        "inactive" | "failed" | "deactivating" => ServiceStatus::Stopped,
        other => ServiceStatus::Unknown(other.to_string()),
    }
}

#[cfg(target_os = "linux")]
fn run_systemctl(args: &[&str]) -> Result<()> {
    let output = std::process::Command::new("systemctl")
        .args(args)
        .output()
        .map_err(|e| Error::Config(format!("failed to run systemctl: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Config(format!(
            "systemctl {} failed: {stderr}",
            args.join(" ")
        )));
    }

    Ok(())
}
