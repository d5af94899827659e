//! Deployment record types.
//!
//! This module contains the manifest written alongside the compiled
//! module list. The manifest is what downstream tooling (status
//! polling, the cleanup sweep) reads to learn a deployment's identity,
//! expiry, and shape; it never contains credentials.

use crate::compiler::{ModulePlan, TemplateKind};
use crate::config::Settings;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Summary record for one compiled deployment.
#[derive(Debug, Serialize)]
pub struct DeploymentManifest {
    #[serde(rename = "deploymentID")]
    pub deployment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub created: DateTime<Utc>,
    /// When the cleanup sweep may reclaim the deployment
    pub expires: DateTime<Utc>,
    pub location: String,
    #[serde(rename = "callerIPAddress")]
    pub caller_ip: String,
    #[serde(rename = "enterpriseAdminUsername")]
    pub admin_username: String,
    #[serde(rename = "moduleCount")]
    pub module_count: usize,
    #[serde(rename = "machineCount")]
    pub machine_count: usize,
}

impl DeploymentManifest {
    /// Build the manifest for a compiled plan.
    ///
    /// `expires_in_secs` overrides the configured deployment timeout
    /// when given (the `--expires-in` flag).
    pub fn new(
        deployment_id: String,
        scenario: Option<String>,
        plan: &ModulePlan,
        settings: &Settings,
        admin_username: &str,
        caller_ip: &str,
        expires_in_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> Self {
        let lifetime = expires_in_secs.unwrap_or(settings.deployment_timeout.as_secs());
        let machine_count = plan.modules.len() - plan.count_of(TemplateKind::VirtualNetwork);

        DeploymentManifest {
            deployment_id,
            scenario,
            created: now,
            expires: now + Duration::seconds(lifetime as i64),
            location: settings.region.clone(),
            caller_ip: caller_ip.to_string(),
            admin_username: admin_username.to_string(),
            module_count: plan.modules.len(),
            machine_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_expiry() {
        let plan = ModulePlan {
            modules: Vec::new(),
        };
        let settings = Settings::default();
        let now = Utc::now();

        let manifest = DeploymentManifest::new(
            "BuildLab-AB12C".to_string(),
            None,
            &plan,
            &settings,
            "labadmin",
            "",
            None,
            now,
        );
        assert_eq!(manifest.expires - manifest.created, Duration::hours(2));

        let manifest = DeploymentManifest::new(
            "BuildLab-AB12C".to_string(),
            None,
            &plan,
            &settings,
            "labadmin",
            "",
            Some(600),
            now,
        );
        assert_eq!(manifest.expires - manifest.created, Duration::minutes(10));
    }

    #[test]
    fn test_manifest_never_serializes_a_password() {
        let plan = ModulePlan {
            modules: Vec::new(),
        };
        let settings = Settings::default();

        let manifest = DeploymentManifest::new(
            "BuildLab-AB12C".to_string(),
            Some("Build-AB12C".to_string()),
            &plan,
            &settings,
            "labadmin",
            "198.51.100.7",
            None,
            Utc::now(),
        );
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"deploymentID\":\"BuildLab-AB12C\""));
        assert!(!json.to_lowercase().contains("password"));
    }
}
