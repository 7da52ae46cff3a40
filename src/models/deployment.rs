use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::target::Environment;

/// A deployment record as returned by `GET /1.1/engine/groups/{group}/deployments`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default)]
    pub group_name: String,
    /// 1 for the production environment, 0 for staging.
    #[serde(default)]
    pub prod: u8,
    /// Rows without a status never match, the rest of the payload is kept.
    #[serde(default)]
    pub status: DeploymentStatus,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deployed_by: Option<Deployer>,
}

impl Deployment {
    pub fn environment(&self) -> Environment {
        if self.prod == 0 {
            Environment::Staging
        } else {
            Environment::Production
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Success,
    Failure,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Version {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployer {
    pub username: String,
    #[serde(default)]
    pub email_hash: String,
}

/// What a deployed version string points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRef {
    GitCommit(String),
    OpaqueArtifact(String),
}

impl VersionRef {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix("git:") {
            Some(sha) if !sha.is_empty() => VersionRef::GitCommit(sha.to_string()),
            _ => VersionRef::OpaqueArtifact(raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_ref() {
        assert_eq!(VersionRef::parse("git:abc123"), VersionRef::GitCommit("abc123".into()));
        assert_eq!(
            VersionRef::parse("file:xyz"),
            VersionRef::OpaqueArtifact("file:xyz".into())
        );
        // A bare prefix carries no sha to look up.
        assert_eq!(VersionRef::parse("git:"), VersionRef::OpaqueArtifact("git:".into()));
    }

    #[test]
    fn test_deserialize_deployment() {
        let raw = r#"{
            "groupName": "web",
            "prod": 1,
            "status": "success",
            "version": { "version": "git:0123abcd" },
            "deployedAt": "2021-03-04T05:06:07.000Z",
            "deployedBy": { "username": "leeyeh", "emailHash": "e3b0c442" }
        }"#;
        let deployment: Deployment = serde_json::from_str(raw).unwrap();
        assert_eq!(deployment.environment(), Environment::Production);
        assert_eq!(deployment.status, DeploymentStatus::Success);
        assert_eq!(deployment.version.unwrap().version, "git:0123abcd");
        assert_eq!(deployment.deployed_by.unwrap().email_hash, "e3b0c442");
    }

    #[test]
    fn test_unknown_status_and_missing_fields() {
        let raw = r#"{ "groupName": "web", "prod": 0, "status": "queued" }"#;
        let deployment: Deployment = serde_json::from_str(raw).unwrap();
        assert_eq!(deployment.status, DeploymentStatus::Unknown);
        assert_eq!(deployment.environment(), Environment::Staging);
        assert!(deployment.version.is_none());
        assert!(deployment.deployed_at.is_none());
    }

    #[test]
    fn test_row_without_status_keeps_payload() {
        let raw = r#"[
            { "groupName": "web", "prod": 1, "version": { "version": "git:broken" } },
            { "groupName": "web", "prod": 1, "status": "success", "version": { "version": "git:abc123" } }
        ]"#;
        let deployments: Vec<Deployment> = serde_json::from_str(raw).unwrap();
        assert_eq!(deployments.len(), 2);
        assert_eq!(deployments[0].status, DeploymentStatus::Unknown);
        assert_eq!(deployments[1].status, DeploymentStatus::Success);
    }
}
