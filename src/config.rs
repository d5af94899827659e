//! Deployment settings.
//!
//! This module contains the type-safe settings structure for a compile
//! run (region, VM sizing, disk type, jump-box image, deployment
//! expiry) and its YAML loader. Every field has a default matching the
//! values the deployment engine was tuned against, so a settings file
//! is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Validation errors for deployment settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Invalid(String),
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Settings applied to every emitted module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Cloud region deployments land in
    #[serde(default = "default_region")]
    pub region: String,
    /// VM size for Windows machines (DCs, workstations, CAs)
    #[serde(default = "default_windows_vm_size")]
    pub windows_vm_size: String,
    /// VM size for the jump box
    #[serde(default = "default_jumpbox_vm_size")]
    pub jumpbox_vm_size: String,
    /// OS disk type for all machines
    #[serde(default = "default_os_disk_type")]
    pub os_disk_type: String,
    /// Marketplace image SKU for the jump box
    #[serde(default = "default_jumpbox_image_sku")]
    pub jumpbox_image_sku: String,
    /// Local admin username for the jump box
    #[serde(default = "default_jumpbox_admin_username")]
    pub jumpbox_admin_username: String,
    /// How long a deployment lives before the cleanup sweep reclaims it
    #[serde(with = "humantime_serde", default = "default_deployment_timeout")]
    pub deployment_timeout: Duration,
    /// Prefix for generated deployment identifiers
    #[serde(default = "default_build_prefix")]
    pub build_prefix: String,
}

fn default_region() -> String {
    "eastus".to_string()
}

fn default_windows_vm_size() -> String {
    "Standard_B1ms".to_string()
}

fn default_jumpbox_vm_size() -> String {
    "Standard_B2s".to_string()
}

fn default_os_disk_type() -> String {
    "Standard_LRS".to_string()
}

fn default_jumpbox_image_sku() -> String {
    "kali-2025-2".to_string()
}

fn default_jumpbox_admin_username() -> String {
    "redteamer".to_string()
}

fn default_deployment_timeout() -> Duration {
    Duration::from_secs(2 * 3600)
}

fn default_build_prefix() -> String {
    "BuildLab-".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            region: default_region(),
            windows_vm_size: default_windows_vm_size(),
            jumpbox_vm_size: default_jumpbox_vm_size(),
            os_disk_type: default_os_disk_type(),
            jumpbox_image_sku: default_jumpbox_image_sku(),
            jumpbox_admin_username: default_jumpbox_admin_username(),
            deployment_timeout: default_deployment_timeout(),
            build_prefix: default_build_prefix(),
        }
    }
}

impl Settings {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.region.is_empty() {
            return Err(SettingsError::Invalid("region cannot be empty".to_string()));
        }
        if self.windows_vm_size.is_empty() || self.jumpbox_vm_size.is_empty() {
            return Err(SettingsError::Invalid(
                "VM sizes cannot be empty".to_string(),
            ));
        }
        if self.deployment_timeout.as_secs() == 0 {
            return Err(SettingsError::Invalid(
                "deployment_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from a YAML file, falling back to defaults for any
/// omitted field.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_yaml::from_str(&content)?;
    settings.validate()?;
    log::info!(
        "Loaded settings from {:?} (region: {}, timeout: {:?})",
        path,
        settings.region,
        settings.deployment_timeout
    );
    Ok(settings)
}
